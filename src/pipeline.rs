//! Per-frame orchestration: detect, classify, then alert when needed.
//!
//! Detection failures end the request. Alert failures never do; they are
//! folded into the report's [`AlertOutcome`].

use image::{DynamicImage, RgbImage};
use log::{debug, info, warn};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::alerts::{AlertDispatcher, AlertOutcome};
use crate::classification::{self, ClassificationResult};
use crate::composer::AlertComposer;
use crate::detection::DetectionSet;
use crate::detector::FrameDetector;
use crate::error::{ServiceError, panic_reason};

/// Where a frame is in its trip through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Detected,
    Classified,
    Resolved,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Detected => "detected",
            Stage::Classified => "classified",
            Stage::Resolved => "resolved",
        };
        f.write_str(name)
    }
}

/// Everything the pipeline learned about one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub detections: DetectionSet,
    pub classification: ClassificationResult,
    pub alert: AlertOutcome,
}

/// Runs one frame at a time through detection, classification and alerting.
///
/// Holds no per-request state; the detector handle is set once at
/// construction and only read afterwards.
pub struct Pipeline {
    detector: Option<Arc<dyn FrameDetector>>,
    composer: AlertComposer,
    dispatcher: AlertDispatcher,
}

impl Pipeline {
    /// `detector` is `None` when the model failed to load; every frame is
    /// then rejected with [`ServiceError::ModelUnavailable`].
    pub fn new(
        detector: Option<Arc<dyn FrameDetector>>,
        composer: AlertComposer,
        dispatcher: AlertDispatcher,
    ) -> Self {
        Self {
            detector,
            composer,
            dispatcher,
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.detector.is_some()
    }

    /// Process one decoded frame.
    ///
    /// # Errors
    ///
    /// - `ModelUnavailable` if no detector is loaded
    /// - `Detection` if the detector fails
    /// - `InternalUnexpected` if anything panics past detection
    pub fn process(&self, frame: &DynamicImage) -> Result<PipelineReport, ServiceError> {
        let detector = self
            .detector
            .as_ref()
            .ok_or(ServiceError::ModelUnavailable)?;
        debug!("Frame {}", Stage::Received);

        let inference = detector.detect(frame)?;
        debug!("Frame {}: {} raw record(s)", Stage::Detected, inference.records.len());

        panic::catch_unwind(AssertUnwindSafe(|| {
            let detections = DetectionSet::from_raw(inference.records, detector.class_names());
            let classification = classification::classify(&detections);
            debug!(
                "Frame {}: {} detection(s), {} error(s)",
                Stage::Classified,
                classification.total_count,
                classification.error_count
            );

            let alert = if classification.is_alertable {
                self.raise_alert(&inference.overlay, &detections)
            } else {
                AlertOutcome::NoAlert
            };
            debug!("Frame {}: alert {}", Stage::Resolved, alert.status());

            PipelineReport {
                detections,
                classification,
                alert,
            }
        }))
        .map_err(|payload| ServiceError::InternalUnexpected {
            reason: panic_reason(payload.as_ref()),
        })
    }

    fn raise_alert(&self, overlay: &RgbImage, detections: &DetectionSet) -> AlertOutcome {
        let errors = classification::error_detections(detections);
        for detection in &errors {
            warn!(
                "Detected {} with {:.2} confidence at x1: {:.0}, y1: {:.0}, x2: {:.0}, y2: {:.0}",
                detection.label,
                detection.confidence,
                detection.bounding_box.xmin,
                detection.bounding_box.ymin,
                detection.bounding_box.xmax,
                detection.bounding_box.ymax
            );
        }

        match self.composer.compose(overlay, &errors) {
            Ok(alert) => self.dispatcher.dispatch(&alert),
            Err(e) => {
                warn!("Not sending alert: {}", e);
                e.into()
            }
        }
    }
}

impl PipelineReport {
    /// One-line summary for request logs.
    pub fn summary(&self) -> String {
        format!(
            "{} detection(s), {} error(s), alert {}",
            self.classification.total_count,
            self.classification.error_count,
            self.alert.status()
        )
    }
}

/// Log a finished report at the level it deserves.
pub fn log_report(report: &PipelineReport) {
    match report.alert {
        AlertOutcome::DeliveryFailed { .. } | AlertOutcome::EncodingFailed { .. } => {
            warn!("Frame processed: {}", report.summary())
        }
        _ => info!("Frame processed: {}", report.summary()),
    }
}
