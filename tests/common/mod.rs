#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::{DynamicImage, RgbImage};

use print_watch::alerts::{AlertDispatcher, AlertSink};
use print_watch::composer::{AlertComposer, ComposedAlert};
use print_watch::detection::{RawClass, RawDetection};
use print_watch::detector::{FrameDetector, Inference};
use print_watch::error::{AlertError, DetectionError};
use print_watch::pipeline::Pipeline;

pub fn record(label: &str, confidence: f32, corners: [f32; 4]) -> RawDetection {
    RawDetection::new(RawClass::Name(label.to_string()), confidence, corners)
}

enum Behaviour {
    Records(Vec<RawDetection>),
    Fail,
    PanicAfterDetect,
}

/// Detector double returning canned records.
pub struct FakeDetector {
    behaviour: Behaviour,
    classes: Vec<String>,
    overlay_size: (u32, u32),
    calls: AtomicUsize,
}

impl FakeDetector {
    pub fn returning(records: Vec<RawDetection>) -> Self {
        Self {
            behaviour: Behaviour::Records(records),
            classes: vec!["imprimiendo".to_string(), "spaghetti".to_string()],
            overlay_size: (32, 32),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            behaviour: Behaviour::Fail,
            ..Self::returning(Vec::new())
        }
    }

    /// Detects fine, then panics when the pipeline asks for class names.
    pub fn panicking() -> Self {
        Self {
            behaviour: Behaviour::PanicAfterDetect,
            ..Self::returning(vec![record("spaghetti", 0.9, [0.0, 0.0, 4.0, 4.0])])
        }
    }

    pub fn with_overlay_size(mut self, width: u32, height: u32) -> Self {
        self.overlay_size = (width, height);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FrameDetector for FakeDetector {
    fn detect(&self, _frame: &DynamicImage) -> Result<Inference, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::Fail => Err(DetectionError::InferenceFailed {
                reason: "model exploded".to_string(),
            }),
            Behaviour::Records(records) => Ok(Inference {
                records: records.clone(),
                overlay: RgbImage::new(self.overlay_size.0, self.overlay_size.1),
            }),
            Behaviour::PanicAfterDetect => Ok(Inference {
                records: vec![record("spaghetti", 0.9, [0.0, 0.0, 4.0, 4.0])],
                overlay: RgbImage::new(self.overlay_size.0, self.overlay_size.1),
            }),
        }
    }

    fn class_names(&self) -> &[String] {
        if let Behaviour::PanicAfterDetect = self.behaviour {
            panic!("class table corrupted");
        }
        &self.classes
    }
}

/// Sink double recording every alert it receives.
pub struct RecordingSink {
    failure: Option<String>,
    delivered: Mutex<Vec<ComposedAlert>>,
}

impl RecordingSink {
    pub fn accepting() -> Self {
        Self {
            failure: None,
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> Vec<ComposedAlert> {
        self.delivered.lock().unwrap().clone()
    }
}

impl AlertSink for RecordingSink {
    fn deliver(&self, alert: &ComposedAlert) -> Result<(), AlertError> {
        self.delivered.lock().unwrap().push(alert.clone());
        match &self.failure {
            Some(reason) => Err(AlertError::DeliveryFailed {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

pub fn pipeline(detector: Arc<FakeDetector>, sink: Arc<RecordingSink>) -> Pipeline {
    Pipeline::new(
        Some(detector as Arc<dyn FrameDetector>),
        AlertComposer::new(90),
        AlertDispatcher::new(sink),
    )
}

pub fn frame() -> DynamicImage {
    DynamicImage::new_rgb8(32, 32)
}
