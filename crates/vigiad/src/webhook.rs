//! Relay of recognition results to the external automation webhook.

use crate::recognition::{Detection, RecognitionStatus};
use serde::Serialize;
use std::time::Duration;

/// JSON body posted to the webhook.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub filename: String,
    #[serde(rename = "detecciones")]
    pub detections: Vec<Detection>,
    pub status: RecognitionStatus,
    #[serde(rename = "imagen_b64")]
    pub image_b64: String,
    #[serde(rename = "numero_a_notificar", skip_serializing_if = "Option::is_none")]
    pub notify_number: Option<String>,
}

/// Delivery outcome, echoed to the API caller as `n8n_status`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WebhookStatus {
    Success {
        message: String,
        status_webhook: String,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        status_webhook: Option<String>,
    },
}

impl WebhookStatus {
    fn not_configured() -> Self {
        Self::Error {
            message: Some("N8N_WEBHOOK_URL no configurado.".into()),
            status_webhook: None,
        }
    }

    fn delivered() -> Self {
        Self::Success {
            message: "Datos enviados a n8n correctamente.".into(),
            status_webhook: "ok".into(),
        }
    }

    fn failed(err: impl std::fmt::Display) -> Self {
        Self::Error {
            message: None,
            status_webhook: Some(format!("Error al enviar datos a n8n: {err}")),
        }
    }
}

#[derive(Clone)]
pub struct WebhookClient {
    url: Option<String>,
    client: reqwest::Client,
}

impl WebhookClient {
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// POST the payload. Never fails: problems are reported in the status.
    pub async fn send(&self, payload: &WebhookPayload) -> WebhookStatus {
        let Some(url) = &self.url else {
            tracing::warn!("webhook URL not configured; recognition result not relayed");
            return WebhookStatus::not_configured();
        };

        let result = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .and_then(|resp| resp.error_for_status());

        match result {
            Ok(resp) => {
                tracing::info!(
                    url = %url,
                    http_status = %resp.status(),
                    filename = %payload.filename,
                    status = ?payload.status,
                    detections = payload.detections.len(),
                    "recognition result relayed"
                );
                WebhookStatus::delivered()
            }
            Err(e) => {
                tracing::error!(url = %url, error = %e, "webhook delivery failed");
                WebhookStatus::failed(e)
            }
        }
    }
}
