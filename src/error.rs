//! Custom error types for the Print Watch service.
//!
//! Detection-path errors are fatal to a request. Alert-path errors are
//! downgraded into the response's `alert` sub-object. Configuration errors
//! stop the process before the server starts.

use std::any::Any;
use std::fmt;

/// Request-level error returned by the pipeline and the HTTP layer.
#[derive(Debug)]
pub enum ServiceError {
    /// No detection model is loaded.
    ModelUnavailable,

    /// The uploaded frame was missing, empty or undecodable.
    InputInvalid(InputError),

    /// The detection capability failed while processing the frame.
    Detection(DetectionError),

    /// Anything else that went wrong inside the pipeline.
    InternalUnexpected { reason: String },
}

/// Errors describing a rejected upload.
#[derive(Debug)]
pub enum InputError {
    /// The request carried no `image` file part.
    MissingImage,

    /// The `image` part had an empty file name.
    EmptyFilename,

    /// The upload exceeded the configured size limit.
    TooLarge { limit: usize },

    /// The multipart body could not be read.
    Malformed { reason: String },

    /// The bytes could not be decoded as an image.
    Undecodable { reason: String },
}

/// Errors specific to loading and running the detection model.
#[derive(Debug)]
pub enum DetectionError {
    /// Network config or weights could not be loaded.
    NetworkLoadFailed {
        model_cfg: String,
        weights: String,
        reason: String,
    },

    /// Labels file could not be read or parsed.
    LabelsLoadFailed { path: String, reason: String },

    /// The inference worker is gone or never started.
    WorkerUnavailable { reason: String },

    /// Neural network inference failed.
    InferenceFailed { reason: String },
}

/// Errors from the alert sub-flow. Never fatal to a request.
#[derive(Debug)]
pub enum AlertError {
    /// The overlay image could not be compressed.
    EncodingFailed { reason: String },

    /// The messaging sink was unreachable or rejected the alert.
    DeliveryFailed { reason: String },
}

/// Errors related to configuration and application setup.
#[derive(Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    MissingEnvVar { var_name: String },

    /// Invalid configuration values provided.
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::ModelUnavailable => write!(f, "Model not loaded"),
            ServiceError::InputInvalid(e) => write!(f, "{}", e),
            ServiceError::Detection(e) => write!(f, "Detection error: {}", e),
            ServiceError::InternalUnexpected { reason } => {
                write!(f, "Unexpected internal error: {}", reason)
            }
        }
    }
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::MissingImage => write!(f, "No image was sent"),
            InputError::EmptyFilename => write!(f, "Empty file name"),
            InputError::TooLarge { limit } => {
                write!(f, "Image exceeds the upload limit of {} bytes", limit)
            }
            InputError::Malformed { reason } => {
                write!(f, "Malformed multipart request: {}", reason)
            }
            InputError::Undecodable { reason } => {
                write!(f, "Could not decode the image: {}", reason)
            }
        }
    }
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionError::NetworkLoadFailed {
                model_cfg,
                weights,
                reason,
            } => {
                write!(
                    f,
                    "Failed to load network '{}' with weights '{}': {}",
                    model_cfg, weights, reason
                )
            }
            DetectionError::LabelsLoadFailed { path, reason } => {
                write!(f, "Failed to load labels from '{}': {}", path, reason)
            }
            DetectionError::WorkerUnavailable { reason } => {
                write!(f, "Inference worker unavailable: {}", reason)
            }
            DetectionError::InferenceFailed { reason } => {
                write!(f, "Neural network inference failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for AlertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertError::EncodingFailed { reason } => {
                write!(f, "Failed to encode alert image: {}", reason)
            }
            AlertError::DeliveryFailed { reason } => {
                write!(f, "Alert delivery failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingEnvVar { var_name } => {
                write!(f, "Required environment variable '{}' is not set", var_name)
            }
            ConfigError::InvalidValue {
                field,
                value,
                reason,
            } => {
                write!(
                    f,
                    "Invalid value '{}' for field '{}': {}",
                    value, field, reason
                )
            }
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::InputInvalid(e) => Some(e),
            ServiceError::Detection(e) => Some(e),
            ServiceError::ModelUnavailable | ServiceError::InternalUnexpected { .. } => None,
        }
    }
}

impl std::error::Error for InputError {}
impl std::error::Error for DetectionError {}
impl std::error::Error for AlertError {}
impl std::error::Error for ConfigError {}

impl From<InputError> for ServiceError {
    fn from(err: InputError) -> Self {
        ServiceError::InputInvalid(err)
    }
}

impl From<DetectionError> for ServiceError {
    fn from(err: DetectionError) -> Self {
        ServiceError::Detection(err)
    }
}

/// Text carried by a caught panic, for error reasons.
pub(crate) fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panicked without a message".to_string()
    }
}
