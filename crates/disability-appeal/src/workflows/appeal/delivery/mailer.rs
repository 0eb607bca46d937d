use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::Serialize;

/// An outbound message with optional binary attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub attachments: Vec<MailAttachment>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub filename: String,
    pub content: Vec<u8>,
}

impl std::fmt::Debug for MailAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailAttachment")
            .field("filename", &self.filename)
            .field("bytes", &self.content.len())
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport is missing {0}")]
    NotConfigured(&'static str),
    #[error("message has no recipients")]
    NoRecipients,
    #[error("mail request failed: {0}")]
    RequestFailed(String),
    #[error("mail API rejected message ({status}): {body}")]
    Api { status: u16, body: String },
}

/// Outbound mail capability. Constructed once at startup and shared by reference.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &OutgoingMail) -> Result<(), MailError>;
}

#[derive(Serialize)]
struct BrevoSender<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct BrevoRecipient<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct BrevoAttachment<'a> {
    name: &'a str,
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoPayload<'a> {
    sender: BrevoSender<'a>,
    to: Vec<BrevoRecipient<'a>>,
    subject: &'a str,
    text_content: &'a str,
    #[serde(rename = "attachment", skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<BrevoAttachment<'a>>,
}

/// Transactional mail over the Brevo v3 HTTP API.
pub struct BrevoMailer {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    sender_email: Option<String>,
    sender_name: String,
    timeout: Duration,
}

impl BrevoMailer {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        sender_email: Option<String>,
        sender_name: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key,
            sender_email,
            sender_name: sender_name.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Bounds each request; a stalled API surfaces as `RequestFailed`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn payload<'a>(
        &'a self,
        sender_email: &'a str,
        message: &'a OutgoingMail,
    ) -> Result<BrevoPayload<'a>, MailError> {
        if message.to.is_empty() {
            return Err(MailError::NoRecipients);
        }

        Ok(BrevoPayload {
            sender: BrevoSender {
                name: &self.sender_name,
                email: sender_email,
            },
            to: message
                .to
                .iter()
                .map(|email| BrevoRecipient { email })
                .collect(),
            subject: &message.subject,
            text_content: &message.text,
            attachments: message
                .attachments
                .iter()
                .map(|attachment| BrevoAttachment {
                    name: &attachment.filename,
                    content: STANDARD.encode(&attachment.content),
                })
                .collect(),
        })
    }
}

impl std::fmt::Debug for BrevoMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrevoMailer")
            .field("endpoint", &self.endpoint)
            .field("sender_email", &self.sender_email)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    async fn send(&self, message: &OutgoingMail) -> Result<(), MailError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(MailError::NotConfigured("EMAIL_API_KEY"))?;
        let sender_email = self
            .sender_email
            .as_deref()
            .ok_or(MailError::NotConfigured("EMAIL_USER"))?;
        let payload = self.payload(sender_email, message)?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", api_key)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|err| MailError::RequestFailed(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "(no body)".to_string());
            return Err(MailError::Api { status, body });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message() -> OutgoingMail {
        OutgoingMail {
            to: vec!["intake@example.org".to_string(), "review@example.org".to_string()],
            subject: "Disability Appeal Form Submission - Jordan Reyes".to_string(),
            text: "Dear Team".to_string(),
            attachments: vec![MailAttachment {
                filename: "disability_appeal_abc.pdf".to_string(),
                content: b"%PDF".to_vec(),
            }],
        }
    }

    fn mailer(api_key: Option<&str>) -> BrevoMailer {
        BrevoMailer::new(
            "http://127.0.0.1:9/v3/smtp/email",
            api_key.map(str::to_string),
            Some("forms@example.org".to_string()),
            "Appeal Intake",
        )
    }

    #[test]
    fn payload_encodes_recipients_and_attachment() {
        let mailer = mailer(Some("key"));
        let message = message();
        let payload = mailer
            .payload("forms@example.org", &message)
            .expect("payload builds");

        assert_eq!(
            serde_json::to_value(&payload).expect("serializes"),
            json!({
                "sender": { "name": "Appeal Intake", "email": "forms@example.org" },
                "to": [{ "email": "intake@example.org" }, { "email": "review@example.org" }],
                "subject": "Disability Appeal Form Submission - Jordan Reyes",
                "textContent": "Dear Team",
                "attachment": [{ "name": "disability_appeal_abc.pdf", "content": "JVBERg==" }],
            })
        );
    }

    #[tokio::test]
    async fn send_requires_credentials() {
        let result = mailer(None).send(&message()).await;
        assert!(matches!(result, Err(MailError::NotConfigured("EMAIL_API_KEY"))));
    }

    #[tokio::test]
    async fn send_rejects_empty_distribution_list() {
        let mut message = message();
        message.to.clear();
        let result = mailer(Some("key")).send(&message).await;
        assert!(matches!(result, Err(MailError::NoRecipients)));
    }

    #[tokio::test]
    async fn stalled_api_times_out() {
        // Bound but never accepted: the kernel completes the handshake and nothing answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind listener");
        let endpoint = format!("http://{}/v3/smtp/email", listener.local_addr().unwrap());
        let mailer = BrevoMailer::new(
            endpoint,
            Some("key".to_string()),
            Some("forms@example.org".to_string()),
            "Appeal Intake",
        )
        .with_timeout(Duration::from_millis(200));

        let result = tokio::time::timeout(Duration::from_secs(5), mailer.send(&message()))
            .await
            .expect("send gives up on its own");

        assert!(matches!(result, Err(MailError::RequestFailed(_))));
        drop(listener);
    }
}
