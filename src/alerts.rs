use log::{info, warn};
use reqwest::blocking::multipart;
use std::sync::Arc;
use std::time::Duration;

use crate::composer::ComposedAlert;
use crate::error::AlertError;

/// Caption markup understood by the Telegram Bot API.
pub const CAPTION_PARSE_MODE: &str = "Markdown";

/// Destination for composed alerts.
///
/// Implementations make exactly one delivery attempt per call.
pub trait AlertSink: Send + Sync {
    /// Deliver the alert.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::DeliveryFailed` carrying the sink's raw response
    /// text or the transport error text.
    fn deliver(&self, alert: &ComposedAlert) -> Result<(), AlertError>;
}

/// Telegram bot sink posting photos with a caption via `sendPhoto`.
pub struct TelegramSink {
    api_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramSink {
    /// Create a new TelegramSink.
    ///
    /// # Arguments
    ///
    /// * `api_url` - Bot API base URL, e.g. "https://api.telegram.org"
    /// * `bot_token` - Token issued by BotFather
    /// * `chat_id` - Chat or channel the photos are posted to
    pub fn new(api_url: String, bot_token: String, chat_id: String) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
        }
    }

    fn send_photo_url(&self) -> String {
        format!("{}/bot{}/sendPhoto", self.api_url, self.bot_token)
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }
}

impl AlertSink for TelegramSink {
    fn deliver(&self, alert: &ComposedAlert) -> Result<(), AlertError> {
        let delivery_failed = |reason: String| AlertError::DeliveryFailed { reason };

        let photo = multipart::Part::bytes(alert.image.clone())
            .file_name(alert.file_name.clone())
            .mime_str("image/jpeg")
            .map_err(|e| delivery_failed(e.to_string()))?;

        let form = multipart::Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", alert.caption.clone())
            .text("parse_mode", CAPTION_PARSE_MODE)
            .part("photo", photo);

        let client = reqwest::blocking::Client::builder()
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| delivery_failed(e.to_string()))?;

        let response = client
            .post(self.send_photo_url())
            .multipart(form)
            .send()
            .map_err(|e| delivery_failed(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .unwrap_or_else(|e| format!("HTTP {} ({})", status, e));
            return Err(delivery_failed(body));
        }

        Ok(())
    }
}

/// Result of one alert attempt for a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertOutcome {
    /// The frame showed a normal state; nothing was sent.
    NoAlert,
    /// The sink accepted the alert.
    Delivered,
    /// The sink was unreachable or rejected the alert.
    DeliveryFailed { reason: String },
    /// The overlay could not be encoded; nothing was sent.
    EncodingFailed { reason: String },
}

impl AlertOutcome {
    /// Status string reported in the response's `alert` object.
    pub fn status(&self) -> &'static str {
        match self {
            AlertOutcome::NoAlert => "no_alert",
            AlertOutcome::Delivered => "success",
            AlertOutcome::DeliveryFailed { .. } | AlertOutcome::EncodingFailed { .. } => "error",
        }
    }

    /// Human-readable message reported next to [`AlertOutcome::status`].
    pub fn message(&self) -> String {
        match self {
            AlertOutcome::NoAlert => "Normal state".to_string(),
            AlertOutcome::Delivered => "Alert sent".to_string(),
            AlertOutcome::DeliveryFailed { reason } => AlertError::DeliveryFailed {
                reason: reason.clone(),
            }
            .to_string(),
            AlertOutcome::EncodingFailed { reason } => AlertError::EncodingFailed {
                reason: reason.clone(),
            }
            .to_string(),
        }
    }
}

impl From<AlertError> for AlertOutcome {
    fn from(err: AlertError) -> Self {
        match err {
            AlertError::EncodingFailed { reason } => AlertOutcome::EncodingFailed { reason },
            AlertError::DeliveryFailed { reason } => AlertOutcome::DeliveryFailed { reason },
        }
    }
}

/// Sends composed alerts to a sink and reports what happened.
///
/// Delivery failures are logged and returned as an outcome, never as an
/// error. There is no retry.
#[derive(Clone)]
pub struct AlertDispatcher {
    sink: Arc<dyn AlertSink>,
}

impl AlertDispatcher {
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self { sink }
    }

    pub fn dispatch(&self, alert: &ComposedAlert) -> AlertOutcome {
        match self.sink.deliver(alert) {
            Ok(()) => {
                info!("Alert delivered ({} bytes image)", alert.image.len());
                AlertOutcome::Delivered
            }
            Err(e) => {
                warn!("Failed to deliver alert: {}", e);
                e.into()
            }
        }
    }
}
