use disability_appeal::config::{AppConfig, DocumentConfig};
use disability_appeal::error::AppError;
use disability_appeal::workflows::appeal::{
    AppealIntakeService, AppealRenderer, BrevoMailer, DistributionList, HttpLeadWebhook,
    PdfMaterializer, SqliteAppealRepository, WkhtmltopdfSurface,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::warn;

pub(crate) type AppealService =
    AppealIntakeService<SqliteAppealRepository, BrevoMailer, HttpLeadWebhook>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn build_renderer(config: &DocumentConfig) -> AppealRenderer {
    AppealRenderer::new(&config.template_path, config.debug_html_path.clone())
}

pub(crate) fn build_materializer(config: &DocumentConfig) -> PdfMaterializer {
    PdfMaterializer::new(
        Arc::new(WkhtmltopdfSurface::new(&config.converter)),
        &config.output_dir,
        config.render_timeout,
    )
}

/// Wires the production adapters. Missing mail or webhook settings only degrade the
/// corresponding delivery stage.
pub(crate) fn build_appeal_service(config: &AppConfig) -> Result<AppealService, AppError> {
    let repository = SqliteAppealRepository::from_location(&config.storage.database_path)?;

    let mail = &config.mail;
    if mail.api_key.is_none() || mail.sender_email.is_none() {
        warn!("EMAIL_API_KEY or EMAIL_USER unset; appeal pdfs will not be emailed");
    }
    if mail.recipients.is_empty() {
        warn!("APPEAL_MAIL_RECIPIENTS unset; appeal pdfs will not be emailed");
    }
    if config.webhook.url.is_none() {
        warn!("APPEAL_WEBHOOK_URL unset; appeals will not be forwarded");
    }

    let mailer = BrevoMailer::new(
        mail.endpoint.clone(),
        mail.api_key.clone(),
        mail.sender_email.clone(),
        mail.sender_name.clone(),
    )
    .with_timeout(mail.timeout);
    let webhook =
        HttpLeadWebhook::new(config.webhook.url.clone()).with_timeout(config.webhook.timeout);

    Ok(AppealIntakeService::new(
        Arc::new(repository),
        Arc::new(build_renderer(&config.document)),
        Arc::new(build_materializer(&config.document)),
        Arc::new(mailer),
        Arc::new(webhook),
        DistributionList(mail.recipients.clone()),
    ))
}
