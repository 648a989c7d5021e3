use std::path::PathBuf;
use std::str::FromStr;

use crate::detector::DarknetSettings;
use crate::error::ConfigError;

/// Configuration for the Print Watch service loaded from environment variables.
///
/// All values come from the environment to support containerized
/// deployments. Only the Telegram credentials are required.
#[derive(Debug, Clone)]
pub struct Config {
    /// The file including label names per class, one per line.
    ///
    /// The class that means "printing normally" must be spelled
    /// `imprimiendo` (any case).
    /// Environment variable: `LABEL_FILE`
    pub label_file: PathBuf,

    /// The YOLO/Darknet network configuration file.
    /// Environment variable: `MODEL_CFG`
    pub model_cfg: PathBuf,

    /// The trained weights file. Reported by the status endpoint as the model path.
    /// Environment variable: `WEIGHTS_FILE`
    pub weights: PathBuf,

    /// Where to download the weights from when `weights` does not exist.
    /// Environment variable: `WEIGHTS_URL`
    pub weights_url: Option<String>,

    /// Objects with objectness scores below this threshold are dropped.
    /// Environment variable: `OBJECTNESS_THRESHOLD`
    pub objectness_threshold: f32,

    /// Detections with class probabilities below this threshold are dropped.
    /// Environment variable: `CLASS_PROB_THRESHOLD`
    pub class_prob_threshold: f32,

    /// Telegram bot token.
    /// Environment variable: `TELEGRAM_BOT_TOKEN`
    pub telegram_bot_token: String,

    /// Telegram chat that receives alerts.
    /// Environment variable: `TELEGRAM_CHAT_ID`
    pub telegram_chat_id: String,

    /// Telegram Bot API base URL.
    /// Environment variable: `TELEGRAM_API_URL`
    pub telegram_api_url: String,

    /// Environment variable: `BIND_ADDRESS`
    pub bind_address: String,

    /// Environment variable: `PORT`
    pub port: u16,

    /// Number of HTTP worker threads.
    /// Environment variable: `HTTP_WORKERS`
    pub workers: usize,

    /// Quality of the JPEG attached to alerts (1-100).
    /// Environment variable: `JPEG_QUALITY`
    pub jpeg_quality: u8,

    /// Largest accepted image upload in bytes.
    /// Environment variable: `MAX_UPLOAD_BYTES`
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is not set or a value cannot
    /// be parsed:
    /// - `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID` (required)
    /// - `LABEL_FILE` (default: "./labels.txt")
    /// - `MODEL_CFG` (default: "./model.cfg")
    /// - `WEIGHTS_FILE` (default: "./model/model-weights.darknet")
    /// - `WEIGHTS_URL` (optional)
    /// - `OBJECTNESS_THRESHOLD`, `CLASS_PROB_THRESHOLD` (default: "0.5", range 0-1)
    /// - `TELEGRAM_API_URL` (default: "https://api.telegram.org")
    /// - `BIND_ADDRESS` (default: "0.0.0.0"), `PORT` (default: "5000")
    /// - `HTTP_WORKERS` (default: "1"), `JPEG_QUALITY` (default: "95")
    /// - `MAX_UPLOAD_BYTES` (default: 10 MiB)
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar {
                    var_name: key.to_string(),
                })
        };

        let objectness_threshold = parse_threshold(
            "OBJECTNESS_THRESHOLD",
            &var("OBJECTNESS_THRESHOLD", defaults::THRESHOLD),
        )?;
        let class_prob_threshold = parse_threshold(
            "CLASS_PROB_THRESHOLD",
            &var("CLASS_PROB_THRESHOLD", defaults::THRESHOLD),
        )?;

        let workers: usize = parse("HTTP_WORKERS", &var("HTTP_WORKERS", defaults::WORKERS))?;
        if workers == 0 {
            return Err(invalid("HTTP_WORKERS", "0", "must be at least 1"));
        }

        let jpeg_quality: u8 = parse("JPEG_QUALITY", &var("JPEG_QUALITY", defaults::JPEG_QUALITY))?;
        if !(1..=100).contains(&jpeg_quality) {
            return Err(invalid(
                "JPEG_QUALITY",
                &jpeg_quality.to_string(),
                "must be between 1 and 100",
            ));
        }

        Ok(Config {
            label_file: PathBuf::from(var("LABEL_FILE", defaults::LABEL_FILE)),
            model_cfg: PathBuf::from(var("MODEL_CFG", defaults::MODEL_CFG)),
            weights: PathBuf::from(var("WEIGHTS_FILE", defaults::WEIGHTS_FILE)),
            weights_url: lookup("WEIGHTS_URL").filter(|url| !url.trim().is_empty()),
            objectness_threshold,
            class_prob_threshold,
            telegram_bot_token: required("TELEGRAM_BOT_TOKEN")?,
            telegram_chat_id: required("TELEGRAM_CHAT_ID")?,
            telegram_api_url: var("TELEGRAM_API_URL", defaults::TELEGRAM_API_URL),
            bind_address: var("BIND_ADDRESS", defaults::BIND_ADDRESS),
            port: parse("PORT", &var("PORT", defaults::PORT))?,
            workers,
            jpeg_quality,
            max_upload_bytes: parse(
                "MAX_UPLOAD_BYTES",
                &var("MAX_UPLOAD_BYTES", defaults::MAX_UPLOAD_BYTES),
            )?,
        })
    }

    /// Settings for loading the darknet detector.
    pub fn darknet_settings(&self) -> DarknetSettings {
        DarknetSettings {
            model_cfg: self.model_cfg.clone(),
            weights: self.weights.clone(),
            label_file: self.label_file.clone(),
            objectness_threshold: self.objectness_threshold,
            class_prob_threshold: self.class_prob_threshold,
        }
    }
}

fn parse<T>(field: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| invalid(field, value, &e.to_string()))
}

fn parse_threshold(field: &str, value: &str) -> Result<f32, ConfigError> {
    let threshold: f32 = parse(field, value)?;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(invalid(field, value, "must be between 0.0 and 1.0"));
    }
    Ok(threshold)
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Default values for optional settings.
pub mod defaults {
    pub const LABEL_FILE: &str = "./labels.txt";
    pub const MODEL_CFG: &str = "./model.cfg";
    pub const WEIGHTS_FILE: &str = "./model/model-weights.darknet";
    pub const THRESHOLD: &str = "0.5";
    pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";
    pub const BIND_ADDRESS: &str = "0.0.0.0";
    pub const PORT: &str = "5000";
    pub const WORKERS: &str = "1";
    pub const JPEG_QUALITY: &str = "95";
    /// 10 MiB.
    pub const MAX_UPLOAD_BYTES: &str = "10485760";
}
