//! Disability appeal intake: validation, persistence, document rendering and the
//! best-effort mail and webhook fan-out that follows every stored submission.

pub mod delivery;
pub mod document;
pub mod domain;
pub mod repository;
pub mod router;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use delivery::{
    BrevoMailer, HttpLeadWebhook, LeadWebhook, MailAttachment, MailError, Mailer, OutgoingMail,
    WebhookError, WebhookPayload,
};
pub use document::{
    AppealRenderer, PdfGenerationError, PdfMaterializer, RenderError, RenderSurface,
    TemplateData, TransientPdf, WkhtmltopdfSurface,
};
pub use domain::{
    ActivityLimitations, ActivityLimitationsInput, AppealId, AppealRecord, AppealSubmission,
    ConditionChanges, ConditionChangesInput, EmergencyContact, EmergencyContactInput,
    MedicalAppointment, NewAppeal, record_timestamp,
};
pub use repository::{
    AppealRepository, InMemoryAppealRepository, RepositoryError, SqliteAppealRepository,
};
pub use router::appeal_router;
pub use service::{
    AppealIntakeService, DistributionList, DocumentError, DocumentReceipt, SubmissionError,
    SubmissionReport,
};
pub use validation::{validate_submission, FieldViolation, ValidationErrors};
