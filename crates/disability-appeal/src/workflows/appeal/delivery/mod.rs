pub mod mailer;
pub mod webhook;

pub use mailer::{BrevoMailer, MailAttachment, MailError, Mailer, OutgoingMail};
pub use webhook::{HttpLeadWebhook, LeadWebhook, WebhookError, WebhookPayload};
