use std::sync::Arc;

use tracing::{error, info, warn};

use super::delivery::{
    LeadWebhook, MailAttachment, MailError, Mailer, OutgoingMail, WebhookError, WebhookPayload,
};
use super::document::{
    AppealRenderer, PdfGenerationError, PdfMaterializer, RenderError, TemplateData,
};
use super::domain::{AppealId, AppealRecord, AppealSubmission};
use super::repository::{AppealRepository, RepositoryError};
use super::validation::{validate_submission, ValidationErrors};

/// Any failure inside the render-and-mail stage. Logged, never surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Pdf(#[from] PdfGenerationError),
    #[error("unable to read rendered pdf: {0}")]
    Attachment(#[from] std::io::Error),
    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Failures that reject the submission itself.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Persistence(#[from] RepositoryError),
}

/// What the render-and-mail stage delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReceipt {
    pub pdf_file_name: String,
    pub attachment_name: String,
    pub recipients: usize,
    pub bytes: usize,
}

/// Outcome of one submission: the persisted record plus the result of each
/// best-effort stage, kept for logging and inspection.
#[derive(Debug)]
pub struct SubmissionReport {
    pub record: AppealRecord,
    pub document: Result<DocumentReceipt, DocumentError>,
    pub webhook: Result<(), WebhookError>,
}

impl SubmissionReport {
    pub fn document_delivered(&self) -> bool {
        self.document.is_ok()
    }

    pub fn webhook_forwarded(&self) -> bool {
        self.webhook.is_ok()
    }
}

/// Fixed recipients of every rendered appeal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionList(pub Vec<String>);

/// Sequences persistence, the render-and-mail stage and the webhook stage for a
/// submission. Only validation and persistence failures reach the caller.
pub struct AppealIntakeService<R, M, W> {
    repository: Arc<R>,
    renderer: Arc<AppealRenderer>,
    materializer: Arc<PdfMaterializer>,
    mailer: Arc<M>,
    webhook: Arc<W>,
    distribution: DistributionList,
}

impl<R, M, W> AppealIntakeService<R, M, W>
where
    R: AppealRepository + 'static,
    M: Mailer + 'static,
    W: LeadWebhook + 'static,
{
    pub fn new(
        repository: Arc<R>,
        renderer: Arc<AppealRenderer>,
        materializer: Arc<PdfMaterializer>,
        mailer: Arc<M>,
        webhook: Arc<W>,
        distribution: DistributionList,
    ) -> Self {
        Self {
            repository,
            renderer,
            materializer,
            mailer,
            webhook,
            distribution,
        }
    }

    /// Validate and persist a submission, then run both delivery stages in order.
    pub async fn submit(
        &self,
        submission: AppealSubmission,
    ) -> Result<SubmissionReport, SubmissionError> {
        let appeal = validate_submission(submission)?;
        let record = self
            .on_store(move |repository| repository.insert(appeal))
            .await?;
        info!(appeal_id = %record.id, "disability appeal persisted");

        let document = self.deliver_document(&record).await;
        match &document {
            Ok(receipt) => info!(
                appeal_id = %record.id,
                attachment = %receipt.attachment_name,
                recipients = receipt.recipients,
                "appeal pdf emailed"
            ),
            Err(err) => error!(
                appeal_id = %record.id,
                error = %err,
                "error generating pdf or sending email"
            ),
        }

        let webhook = self.forward_lead(&record).await;
        match &webhook {
            Ok(()) => info!(appeal_id = %record.id, "appeal forwarded to lead webhook"),
            Err(WebhookError::NotConfigured) => {
                warn!(appeal_id = %record.id, "lead webhook not configured; skipped")
            }
            Err(err) => error!(
                appeal_id = %record.id,
                error = %err,
                "error sending appeal to lead webhook"
            ),
        }

        Ok(SubmissionReport {
            record,
            document,
            webhook,
        })
    }

    /// Fetch a persisted appeal.
    pub async fn get(&self, id: &AppealId) -> Result<Option<AppealRecord>, RepositoryError> {
        let id = id.clone();
        self.on_store(move |repository| repository.fetch(&id)).await
    }

    /// Repository calls block on disk and a connection lock, so they run on the
    /// blocking pool instead of an async worker.
    async fn on_store<T, F>(&self, operation: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&R) -> Result<T, RepositoryError> + Send + 'static,
    {
        let repository = Arc::clone(&self.repository);
        tokio::task::spawn_blocking(move || operation(&repository))
            .await
            .map_err(|err| RepositoryError::Unavailable(format!("storage task failed: {err}")))?
    }

    async fn deliver_document(
        &self,
        record: &AppealRecord,
    ) -> Result<DocumentReceipt, DocumentError> {
        let data = TemplateData::from_record(record);
        let html = self.renderer.render(&data).await?;
        // Dropping `pdf` removes the file on every path out of this function.
        let pdf = self.materializer.materialize(&html).await?;
        let content = pdf.read().await?;
        let bytes = content.len();

        let message = OutgoingMail {
            to: self.distribution.0.clone(),
            subject: format!("Disability Appeal Form Submission - {}", record.name),
            text: format!(
                "Dear Team,\n\nA new disability appeal form has been submitted by {}. \
                 Please find attached the PDF containing the submitted information.\n\n\
                 Best regards,\nSystem",
                record.name
            ),
            attachments: vec![MailAttachment {
                filename: record.attachment_name(),
                content,
            }],
        };
        self.mailer.send(&message).await?;

        Ok(DocumentReceipt {
            pdf_file_name: pdf.file_name(),
            attachment_name: record.attachment_name(),
            recipients: message.to.len(),
            bytes,
        })
    }

    async fn forward_lead(&self, record: &AppealRecord) -> Result<(), WebhookError> {
        let payload = WebhookPayload::from(record);
        self.webhook.forward(&payload).await
    }
}
