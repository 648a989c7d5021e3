//! Print Watch - 3D print error detection and alerting service.
//!
//! Accepts a single camera frame over HTTP, runs an object-detection model on
//! it, and sends a Telegram alert with the annotated frame whenever an error
//! class (anything other than the normal "imprimiendo" state) is detected.
//!
//! # Core Components
//!
//! * [`detection`] - Normalized detections built from raw model records
//! * [`classification`] - The normal-vs-error decision
//! * [`composer`] - Alert caption and JPEG encoding
//! * [`alerts`] - Telegram sink and alert dispatch
//! * [`pipeline`] - Per-frame orchestration
//! * [`detector`] - Detection capability trait and the darknet backend
//! * [`server`] - HTTP routes
//! * [`config`] - Environment configuration
//! * [`error`] - Error types
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use print_watch::*;
//!
//! let config = Config::load()?;
//! let detector = DarknetDetector::load(&config.darknet_settings())?;
//! let sink = TelegramSink::new(
//!     config.telegram_api_url.clone(),
//!     config.telegram_bot_token.clone(),
//!     config.telegram_chat_id.clone(),
//! );
//! let pipeline = Pipeline::new(
//!     Some(Arc::new(detector) as Arc<dyn FrameDetector>),
//!     AlertComposer::new(config.jpeg_quality),
//!     AlertDispatcher::new(Arc::new(sink)),
//! );
//!
//! let frame = image::open("frame.jpg")?;
//! let report = pipeline.process(&frame)?;
//! println!("{}", report.summary());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod alerts;
pub mod classification;
pub mod composer;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod overlay;
pub mod pipeline;
pub mod server;

// Re-export commonly used types for convenience
pub use alerts::{AlertDispatcher, AlertOutcome, AlertSink, TelegramSink};
pub use classification::{ClassificationResult, classify};
pub use composer::{AlertComposer, ComposedAlert};
pub use config::Config;
pub use detection::{BoundingBox, Detection, DetectionSet, RawClass, RawDetection};
pub use detector::{DarknetDetector, FrameDetector, Inference};
pub use error::ServiceError;
pub use pipeline::{Pipeline, PipelineReport};
