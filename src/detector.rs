use anyhow::Result;
use darknet::{Image, Network};
use image::{DynamicImage, GenericImageView, RgbImage};
use log::{debug, error, info};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::{fs, thread};

use crate::detection::{DetectionSet, RawClass, RawDetection};
use crate::error::{DetectionError, panic_reason};
use crate::overlay;

/// Minimum score darknet keeps before its own NMS.
const PREDICT_THRESHOLD: f32 = 0.25;
const HIERARCHY_THRESHOLD: f32 = 0.5;
const NMS_THRESHOLD: f32 = 0.45;

/// Raw model output for one frame.
pub struct Inference {
    /// One record per detected object, in model output order.
    pub records: Vec<RawDetection>,
    /// The frame with labelled detection boxes drawn on it.
    pub overlay: RgbImage,
}

/// Opaque object-detection capability.
///
/// The pipeline only relies on this trait; which model runs behind it, and
/// how it is loaded, is up to the implementation.
pub trait FrameDetector: Send + Sync {
    /// Run detection on a decoded frame.
    fn detect(&self, frame: &DynamicImage) -> Result<Inference, DetectionError>;

    /// Class names that `RawClass::Index` values refer to.
    fn class_names(&self) -> &[String];
}

/// Paths and thresholds needed to load the darknet model.
#[derive(Debug, Clone)]
pub struct DarknetSettings {
    pub model_cfg: PathBuf,
    pub weights: PathBuf,
    pub label_file: PathBuf,
    pub objectness_threshold: f32,
    pub class_prob_threshold: f32,
}

struct InferenceJob {
    frame: DynamicImage,
    reply: mpsc::Sender<Result<Inference, DetectionError>>,
}

/// Print failure detector backed by a YOLO/Darknet network.
///
/// The network is owned by a dedicated inference thread; callers submit
/// frames over a channel, so concurrent requests are served one at a time.
pub struct DarknetDetector {
    jobs: mpsc::Sender<InferenceJob>,
    labels: Vec<String>,
}

impl DarknetDetector {
    /// Load labels and the network, then start the inference thread.
    ///
    /// Blocks until the network has loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Labels file cannot be read
    /// - Model config or weights cannot be loaded
    /// - The inference thread cannot be started
    pub fn load(settings: &DarknetSettings) -> Result<Self, DetectionError> {
        let labels = load_labels(&settings.label_file)?;
        info!(
            "Loaded {} class labels from {}",
            labels.len(),
            settings.label_file.display()
        );

        let (jobs_tx, jobs_rx) = mpsc::channel::<InferenceJob>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), DetectionError>>();
        let worker_settings = settings.clone();
        let worker_labels = labels.clone();

        thread::Builder::new()
            .name("darknet-inference".into())
            .spawn(move || {
                let mut network = match Network::load(
                    &worker_settings.model_cfg,
                    Some(&worker_settings.weights),
                    false,
                ) {
                    Ok(network) => network,
                    Err(e) => {
                        let _ = ready_tx.send(Err(network_load_failed(&worker_settings, e)));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                serve_jobs(jobs_rx, |frame| {
                    infer(&mut network, &worker_settings, &worker_labels, frame)
                });
            })
            .map_err(|e| DetectionError::WorkerUnavailable {
                reason: e.to_string(),
            })?;

        ready_rx
            .recv()
            .map_err(|e| DetectionError::WorkerUnavailable {
                reason: e.to_string(),
            })??;

        info!(
            "Darknet network loaded from {} ({})",
            settings.model_cfg.display(),
            settings.weights.display()
        );

        Ok(Self {
            jobs: jobs_tx,
            labels,
        })
    }
}

impl FrameDetector for DarknetDetector {
    fn detect(&self, frame: &DynamicImage) -> Result<Inference, DetectionError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.jobs
            .send(InferenceJob {
                frame: frame.clone(),
                reply: reply_tx,
            })
            .map_err(|_| DetectionError::WorkerUnavailable {
                reason: "inference thread has stopped".to_string(),
            })?;

        reply_rx
            .recv()
            .map_err(|_| DetectionError::WorkerUnavailable {
                reason: "inference thread dropped the request".to_string(),
            })?
    }

    fn class_names(&self) -> &[String] {
        &self.labels
    }
}

/// Answer jobs until every detector handle is dropped.
///
/// A panic inside `run` fails only the job that caused it.
fn serve_jobs(
    jobs: mpsc::Receiver<InferenceJob>,
    mut run: impl FnMut(DynamicImage) -> Inference,
) {
    for job in jobs {
        let frame = job.frame;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| run(frame))).map_err(|payload| {
            let reason = panic_reason(payload.as_ref());
            error!("Inference panicked: {}", reason);
            DetectionError::InferenceFailed { reason }
        });
        // The requester may have gone away; nothing to do about it here.
        let _ = job.reply.send(outcome);
    }
    debug!("Inference thread exiting: no more detector handles");
}

fn infer(
    network: &mut Network,
    settings: &DarknetSettings,
    labels: &[String],
    frame: DynamicImage,
) -> Inference {
    let (width, height) = frame.dimensions();
    let darknet_image = Image::from(frame.clone());

    let detections = network.predict(
        &darknet_image,
        PREDICT_THRESHOLD,
        HIERARCHY_THRESHOLD,
        NMS_THRESHOLD,
        true,
    );

    let mut records = Vec::new();
    for det in detections
        .iter()
        .filter(|det| det.objectness() > settings.objectness_threshold)
    {
        if let Some((class_index, prob)) = det.best_class(Some(settings.class_prob_threshold)) {
            let bbox = det.bbox();
            records.push(RawDetection::new(
                RawClass::Index(class_index),
                prob,
                center_box_to_corners(bbox.x, bbox.y, bbox.w, bbox.h, width, height),
            ));
        }
    }
    debug!("Darknet returned {} detection(s)", records.len());

    let labelled = DetectionSet::from_raw(records.clone(), labels);

    Inference {
        overlay: overlay::render(&frame, labelled.as_slice()),
        records,
    }
}

/// Convert a normalized centre/size box into pixel corners.
fn center_box_to_corners(x: f32, y: f32, w: f32, h: f32, width: u32, height: u32) -> [f32; 4] {
    let (width, height) = (width as f32, height as f32);
    let (center_x, center_y) = (x * width, y * height);
    let (box_w, box_h) = (w * width, h * height);

    [
        center_x - box_w / 2.0,
        center_y - box_h / 2.0,
        center_x + box_w / 2.0,
        center_y + box_h / 2.0,
    ]
}

fn network_load_failed(settings: &DarknetSettings, e: impl std::fmt::Display) -> DetectionError {
    DetectionError::NetworkLoadFailed {
        model_cfg: settings.model_cfg.display().to_string(),
        weights: settings.weights.display().to_string(),
        reason: e.to_string(),
    }
}

/// Read class labels, one per line. Blank lines are ignored.
pub fn load_labels(path: &Path) -> Result<Vec<String>, DetectionError> {
    let contents = fs::read_to_string(path).map_err(|e| DetectionError::LabelsLoadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let labels: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect();

    if labels.is_empty() {
        return Err(DetectionError::LabelsLoadFailed {
            path: path.display().to_string(),
            reason: "file contains no labels".to_string(),
        });
    }

    Ok(labels)
}

/// Download model weights if they don't exist locally.
///
/// # Errors
///
/// Returns an error if:
/// - Download fails
/// - File cannot be written to disk
/// - Remote server returns error status
pub fn ensure_weights_downloaded(weights_path: &Path, download_url: &str) -> Result<()> {
    if weights_path.exists() {
        return Ok(());
    }

    info!(
        "Model weights not found, downloading from: {}",
        download_url
    );

    let response = reqwest::blocking::get(download_url)?;
    if !response.status().is_success() {
        return Err(anyhow::anyhow!(
            "Failed to download model weights from {}: {}",
            download_url,
            response.status()
        ));
    }

    if let Some(parent) = weights_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let model_weights_data = response.bytes()?;
    fs::write(weights_path, model_weights_data)?;

    info!("Model weights downloaded successfully");
    Ok(())
}
