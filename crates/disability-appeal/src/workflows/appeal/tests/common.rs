use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::workflows::appeal::delivery::{
    LeadWebhook, MailError, Mailer, OutgoingMail, WebhookError, WebhookPayload,
};
use crate::workflows::appeal::document::{
    AppealRenderer, PageLayout, PdfGenerationError, PdfMaterializer, RenderSurface,
};
use crate::workflows::appeal::domain::{AppealId, AppealRecord, AppealSubmission, NewAppeal};
use crate::workflows::appeal::repository::{
    AppealRepository, InMemoryAppealRepository, RepositoryError,
};
use crate::workflows::appeal::service::{AppealIntakeService, DistributionList};

pub(super) const TEMPLATE: &str = "<html><body>\
<h1>{{name}}</h1><p>SSN: {{ssn}}</p>\
{{#each medicalAppointments}}{{#if (gt @index 0)}}<hr>{{/if}}\
<p>{{doctorName}} last seen {{formatDate dateOfLastAppointment}} new {{boolToYesNo isNewDoctor}}</p>\
{{/each}}\
<p>Changes: {{boolToYesNo conditionChanges.hasChanges}}</p>\
<p>Contact: {{emergencyContact.name}}</p>\
</body></html>";

pub(super) fn submission_json() -> Value {
    json!({
        "name": "Jordan Reyes",
        "ssn": "1234",
        "medicalAppointments": [{
            "doctorName": "Dr. Alvarez",
            "officeName": "Riverside Clinic",
            "dateOfLastAppointment": "2025-03-04",
            "isNewDoctor": false
        }],
        "conditionChanges": { "hasChanges": false },
        "activityLimitations": { "hasLimitations": false },
        "emergencyContact": {
            "name": "Sam Reyes",
            "phone": "555-0100",
            "relationship": "Sibling"
        }
    })
}

pub(super) fn submission() -> AppealSubmission {
    serde_json::from_value(submission_json()).expect("fixture decodes")
}

#[derive(Default)]
pub(super) struct MemoryMailer {
    sent: Arc<Mutex<Vec<OutgoingMail>>>,
    fail: bool,
}

impl MemoryMailer {
    pub(super) fn failing() -> Self {
        Self {
            sent: Arc::default(),
            fail: true,
        }
    }

    pub(super) fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &OutgoingMail) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::RequestFailed("smtp relay refused".to_string()));
        }
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryWebhook {
    forwarded: Arc<Mutex<Vec<WebhookPayload>>>,
    fail: bool,
}

impl MemoryWebhook {
    pub(super) fn failing() -> Self {
        Self {
            forwarded: Arc::default(),
            fail: true,
        }
    }

    pub(super) fn forwarded(&self) -> Vec<WebhookPayload> {
        self.forwarded
            .lock()
            .expect("webhook mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl LeadWebhook for MemoryWebhook {
    async fn forward(&self, payload: &WebhookPayload) -> Result<(), WebhookError> {
        // Recorded even when failing so tests can see the attempt.
        self.forwarded
            .lock()
            .expect("webhook mutex poisoned")
            .push(payload.clone());
        if self.fail {
            return Err(WebhookError::Status(502));
        }
        Ok(())
    }
}

/// Writes the markup itself as the "pdf" so tests can inspect what was rendered.
pub(super) struct EchoSurface;

#[async_trait]
impl RenderSurface for EchoSurface {
    async fn print_to_pdf(
        &self,
        html: &str,
        output: &Path,
        _layout: &PageLayout,
    ) -> Result<(), PdfGenerationError> {
        tokio::fs::write(output, html).await?;
        Ok(())
    }
}

/// Leaves a partial file behind and then fails.
pub(super) struct BrokenSurface;

#[async_trait]
impl RenderSurface for BrokenSurface {
    async fn print_to_pdf(
        &self,
        _html: &str,
        output: &Path,
        _layout: &PageLayout,
    ) -> Result<(), PdfGenerationError> {
        tokio::fs::write(output, b"%PDF-partial").await?;
        Err(PdfGenerationError::ConverterFailed {
            status: "exit status: 1".to_string(),
            stderr: "renderer crashed".to_string(),
        })
    }
}

pub(super) struct UnavailableRepository;

impl AppealRepository for UnavailableRepository {
    fn insert(&self, _appeal: NewAppeal) -> Result<AppealRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &AppealId) -> Result<Option<AppealRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn count(&self) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Delegates to memory storage and notes which thread served each call.
#[derive(Default)]
pub(super) struct ThreadRecordingRepository {
    inner: InMemoryAppealRepository,
    threads: Mutex<Vec<ThreadId>>,
}

impl ThreadRecordingRepository {
    pub(super) fn threads(&self) -> Vec<ThreadId> {
        self.threads.lock().expect("thread mutex poisoned").clone()
    }

    fn note_thread(&self) {
        self.threads
            .lock()
            .expect("thread mutex poisoned")
            .push(std::thread::current().id());
    }
}

impl AppealRepository for ThreadRecordingRepository {
    fn insert(&self, appeal: NewAppeal) -> Result<AppealRecord, RepositoryError> {
        self.note_thread();
        self.inner.insert(appeal)
    }

    fn fetch(&self, id: &AppealId) -> Result<Option<AppealRecord>, RepositoryError> {
        self.note_thread();
        self.inner.fetch(id)
    }

    fn count(&self) -> Result<usize, RepositoryError> {
        self.inner.count()
    }
}

/// Scratch directories backing one service instance.
pub(super) struct Workspace {
    pub(super) root: TempDir,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(root.path().join("pdf")).expect("pdf dir");
        std::fs::write(root.path().join("template.html"), TEMPLATE).expect("template");
        Self { root }
    }

    pub(super) fn template_path(&self) -> PathBuf {
        self.root.path().join("template.html")
    }

    pub(super) fn pdf_dir(&self) -> PathBuf {
        self.root.path().join("pdf")
    }

    pub(super) fn debug_html_path(&self) -> PathBuf {
        self.root.path().join("debug.html")
    }

    pub(super) fn pdf_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.pdf_dir())
            .expect("read pdf dir")
            .map(|entry| entry.expect("dir entry").path())
            .collect()
    }

    pub(super) fn renderer(&self) -> Arc<AppealRenderer> {
        Arc::new(AppealRenderer::new(
            self.template_path(),
            Some(self.debug_html_path()),
        ))
    }

    pub(super) fn materializer(&self, surface: Arc<dyn RenderSurface>) -> Arc<PdfMaterializer> {
        Arc::new(PdfMaterializer::new(
            surface,
            self.pdf_dir(),
            Duration::from_secs(5),
        ))
    }
}

pub(super) fn distribution() -> DistributionList {
    DistributionList(vec![
        "intake@example.org".to_string(),
        "review@example.org".to_string(),
    ])
}

pub(super) type TestService =
    AppealIntakeService<InMemoryAppealRepository, MemoryMailer, MemoryWebhook>;

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) repository: Arc<InMemoryAppealRepository>,
    pub(super) mailer: Arc<MemoryMailer>,
    pub(super) webhook: Arc<MemoryWebhook>,
    pub(super) workspace: Workspace,
}

pub(super) fn build_harness_with(
    surface: Arc<dyn RenderSurface>,
    mailer: MemoryMailer,
    webhook: MemoryWebhook,
) -> Harness {
    let workspace = Workspace::new();
    let repository = Arc::new(InMemoryAppealRepository::default());
    let mailer = Arc::new(mailer);
    let webhook = Arc::new(webhook);
    let service = Arc::new(AppealIntakeService::new(
        repository.clone(),
        workspace.renderer(),
        workspace.materializer(surface),
        mailer.clone(),
        webhook.clone(),
        distribution(),
    ));

    Harness {
        service,
        repository,
        mailer,
        webhook,
        workspace,
    }
}

pub(super) fn build_harness() -> Harness {
    build_harness_with(
        Arc::new(EchoSurface),
        MemoryMailer::default(),
        MemoryWebhook::default(),
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
