use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;

use crate::workflows::appeal::domain::{
    ActivityLimitations, AppealRecord, ConditionChanges, EmergencyContact, MedicalAppointment,
};

/// Body posted to the lead-management system for every persisted appeal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub name: String,
    pub ssn: String,
    pub medical_appointments: Vec<MedicalAppointment>,
    pub condition_changes: ConditionChanges,
    pub activity_limitations: ActivityLimitations,
    pub emergency_contact: EmergencyContact,
    pub timestamp: DateTime<Utc>,
}

impl From<&AppealRecord> for WebhookPayload {
    fn from(record: &AppealRecord) -> Self {
        Self {
            name: record.name.clone(),
            ssn: record.ssn.clone(),
            medical_appointments: record.medical_appointments.clone(),
            condition_changes: record.condition_changes.clone(),
            activity_limitations: record.activity_limitations.clone(),
            emergency_contact: record.emergency_contact.clone(),
            timestamp: record.timestamp,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook url is not configured")]
    NotConfigured,
    #[error("webhook request failed: {0}")]
    Transport(String),
    #[error("webhook responded with status {0}")]
    Status(u16),
}

/// Outbound notification to the external lead-management system.
#[async_trait]
pub trait LeadWebhook: Send + Sync {
    async fn forward(&self, payload: &WebhookPayload) -> Result<(), WebhookError>;
}

/// Posts the payload as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpLeadWebhook {
    client: Client,
    url: Option<String>,
    timeout: Duration,
}

impl HttpLeadWebhook {
    pub fn new(url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl LeadWebhook for HttpLeadWebhook {
    async fn forward(&self, payload: &WebhookPayload) -> Result<(), WebhookError> {
        let url = self.url.as_deref().ok_or(WebhookError::NotConfigured)?;

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|err| WebhookError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebhookError::Status(status.as_u16()));
        }

        Ok(())
    }
}
