use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::services::result_service::AttemptOutcome;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExamEvent {
    AttemptStarted {
        attempt_id: Uuid,
        user_id: Uuid,
        exam_id: Uuid,
        exam_title: String,
        duration_minutes: i32,
    },
    AnswerSubmitted {
        attempt_id: Uuid,
        user_id: Uuid,
        question_id: Uuid,
    },
    AttemptCompleted {
        attempt_id: Uuid,
        user_id: Uuid,
        exam_id: Uuid,
        exam_title: String,
        results: AttemptOutcome,
    },
    CertificateIssued {
        certificate_id: Uuid,
        certificate_number: String,
        user_id: Uuid,
        exam_id: Uuid,
        attempt_id: Uuid,
    },
}

impl ExamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ExamEvent::AttemptStarted { .. } => "attempt_started",
            ExamEvent::AnswerSubmitted { .. } => "answer_submitted",
            ExamEvent::AttemptCompleted { .. } => "attempt_completed",
            ExamEvent::CertificateIssued { .. } => "certificate_issued",
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            ExamEvent::AttemptStarted { user_id, .. }
            | ExamEvent::AnswerSubmitted { user_id, .. }
            | ExamEvent::AttemptCompleted { user_id, .. }
            | ExamEvent::CertificateIssued { user_id, .. } => *user_id,
        }
    }
}

/// Outbound side channel for lifecycle events. Delivery is best-effort.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &ExamEvent) -> Result<()>;
}

/// Sends `event` and swallows any failure after logging it.
pub async fn notify_best_effort(notifier: &dyn Notifier, event: ExamEvent) {
    if let Err(e) = notifier.notify(&event).await {
        tracing::warn!(
            event = event.name(),
            user_id = %event.user_id(),
            error = %e,
            "Failed to dispatch notification"
        );
    }
}

/// Records events in the service log only.
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &ExamEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        tracing::info!(event = event.name(), user_id = %event.user_id(), %payload, "Exam event");
        Ok(())
    }
}

/// Posts events as JSON to the real-time fan-out service.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    target_url: String,
    secret: Option<String>,
}

impl WebhookNotifier {
    pub fn new(target_url: String, secret: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            target_url,
            secret,
        })
    }

    fn sign(secret: &str, body: &[u8]) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| Error::Internal(format!("Invalid webhook secret: {}", e)))?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &ExamEvent) -> Result<()> {
        let body = serde_json::to_vec(event)?;
        let mut request = self
            .client
            .post(&self.target_url)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Event", event.name());
        if let Some(secret) = &self.secret {
            request = request
                .header("X-Webhook-Secret", secret)
                .header("X-Webhook-Signature", format!("sha256={}", Self::sign(secret, &body)?));
        }

        let resp = request.body(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Internal(format!(
                "Webhook responded with {}: {}",
                status, text
            )));
        }
        tracing::debug!(event = event.name(), "Webhook delivered");
        Ok(())
    }
}
