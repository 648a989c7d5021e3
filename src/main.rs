use anyhow::{Context, Result};
use log::{error, info, warn};
use std::sync::Arc;

use print_watch::alerts::{AlertDispatcher, TelegramSink};
use print_watch::composer::AlertComposer;
use print_watch::config::Config;
use print_watch::detector::{self, DarknetDetector, FrameDetector};
use print_watch::pipeline::Pipeline;
use print_watch::server::{self, AppState};

/// Print Watch - 3D print error detection and alerting service.
///
/// Serves `POST /detect` for single camera frames. Every frame is run
/// through the darknet model; if anything other than the normal printing
/// state is found, the annotated frame and a description are posted to a
/// Telegram chat.
///
/// # Environment Variables
///
/// Required:
/// * `TELEGRAM_BOT_TOKEN` - Bot token used for `sendPhoto`
/// * `TELEGRAM_CHAT_ID` - Chat receiving the alerts
///
/// Optional (with defaults):
/// * `LABEL_FILE` - Path to label file (default: "./labels.txt")
/// * `MODEL_CFG` - Path to model config file (default: "./model.cfg")
/// * `WEIGHTS_FILE` - Path to weights file (default: "./model/model-weights.darknet")
/// * `WEIGHTS_URL` - Download source for missing weights (default: none)
/// * `OBJECTNESS_THRESHOLD` - Objectness threshold (default: "0.5")
/// * `CLASS_PROB_THRESHOLD` - Class probability threshold (default: "0.5")
/// * `TELEGRAM_API_URL` - Bot API base URL (default: "https://api.telegram.org")
/// * `BIND_ADDRESS` / `PORT` - Listen address (default: "0.0.0.0" / "5000")
/// * `HTTP_WORKERS` - HTTP worker threads (default: "1")
/// * `JPEG_QUALITY` - Alert image quality (default: "95")
/// * `MAX_UPLOAD_BYTES` - Upload limit (default: 10 MiB)
///
/// # Usage
///
/// ```bash
/// export TELEGRAM_BOT_TOKEN="123456:ABC..."
/// export TELEGRAM_CHAT_ID="-1001234567890"
/// ./print-watch
/// curl -F "image=@frame.jpg" http://localhost:5000/detect
/// ```
fn main() -> Result<()> {
    // Initialize logger to output to stdout, using RUST_LOG env var or info level by default
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stdout)
        .filter_level(
            std::env::var("RUST_LOG")
                .ok()
                .and_then(|level| level.parse().ok())
                .unwrap_or(log::LevelFilter::Info),
        )
        .init();

    let config = Config::load().context(
        "Failed to load configuration. Please ensure all required environment variables are set.",
    )?;

    info!("Print Watch starting...");
    info!("Alerts go to Telegram chat {}", config.telegram_chat_id);

    if let Some(url) = &config.weights_url {
        if let Err(e) = detector::ensure_weights_downloaded(&config.weights, url) {
            warn!("Could not download model weights: {:#}", e);
        }
    }

    // A missing model does not stop the server; /detect reports it instead.
    let detector: Option<Arc<dyn FrameDetector>> =
        match DarknetDetector::load(&config.darknet_settings()) {
            Ok(detector) => {
                info!("Model loaded successfully");
                Some(Arc::new(detector) as Arc<dyn FrameDetector>)
            }
            Err(e) => {
                error!("Failed to load model: {}", e);
                None
            }
        };

    let sink = TelegramSink::new(
        config.telegram_api_url.clone(),
        config.telegram_bot_token.clone(),
        config.telegram_chat_id.clone(),
    );
    let pipeline = Pipeline::new(
        detector,
        AlertComposer::new(config.jpeg_quality),
        AlertDispatcher::new(Arc::new(sink)),
    );

    let state = AppState::new(pipeline, config.weights.clone(), config.max_upload_bytes);
    server::run(state, &config.bind_address, config.port, config.workers)
}
