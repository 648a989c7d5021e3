//! Actix Web server exposing the health, status and detection routes.
//!
//! Handlers stay thin: the multipart upload is collected here, then decoding
//! and the whole pipeline run on the blocking thread pool.

use std::path::PathBuf;
use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::{App, HttpResponse, HttpServer, ResponseError, http::StatusCode, web};
use anyhow::{Context, Result};
use futures_util::StreamExt;
use image::DynamicImage;
use log::{error, info};
use serde::Serialize;
use serde_json::json;

use crate::detection::Detection;
use crate::error::{InputError, ServiceError};
use crate::pipeline::{self, Pipeline, PipelineReport};

/// Multipart field carrying the camera frame.
pub const IMAGE_FIELD: &str = "image";

/// Shared state backing HTTP handlers.
pub struct AppState {
    pipeline: Arc<Pipeline>,
    model_path: PathBuf,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: Pipeline, model_path: PathBuf, max_upload_bytes: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            model_path,
            max_upload_bytes,
        }
    }
}

#[derive(Serialize)]
struct AlertStatus {
    status: &'static str,
    message: String,
}

/// Body returned by `POST /detect` when detection succeeded.
#[derive(Serialize)]
struct DetectResponse<'a> {
    status: &'static str,
    detections: &'a [Detection],
    total_detections: usize,
    error_count: usize,
    alert: AlertStatus,
}

impl<'a> From<&'a PipelineReport> for DetectResponse<'a> {
    fn from(report: &'a PipelineReport) -> Self {
        Self {
            status: "success",
            detections: report.detections.as_slice(),
            total_detections: report.classification.total_count,
            error_count: report.classification.error_count,
            alert: AlertStatus {
                status: report.alert.status(),
                message: report.alert.message(),
            },
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InputInvalid(_) => StatusCode::BAD_REQUEST,
            ServiceError::ModelUnavailable
            | ServiceError::Detection(_)
            | ServiceError::InternalUnexpected { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "status": "error",
            "error": self.to_string(),
        }))
    }
}

/// Register the service routes.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(health_handler))
        .route("/status", web::get().to(status_handler))
        .route("/detect", web::post().to(detect_handler));
}

/// Bind the server and block until it shuts down.
pub fn run(state: AppState, bind_address: &str, port: u16, workers: usize) -> Result<()> {
    let state = web::Data::new(state);
    let bind_address = bind_address.to_string();

    actix_web::rt::System::new().block_on(async move {
        let server = HttpServer::new(move || App::new().app_data(state.clone()).configure(routes))
            .workers(workers)
            .bind((bind_address.as_str(), port))
            .with_context(|| format!("Failed to bind {}:{}", bind_address, port))?
            .run();

        info!("Listening on {}:{} with {} worker(s)", bind_address, port, workers);
        server.await.context("HTTP server error")
    })
}

/// Liveness check with the model flag.
async fn health_handler(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "running",
        "message": "3D print detection server active",
        "model_loaded": state.pipeline.model_loaded(),
    }))
}

/// Read-only model introspection.
async fn status_handler(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "server": "online",
        "model_loaded": state.pipeline.model_loaded(),
        "model_path": state.model_path.display().to_string(),
        "model_exists": state.model_path.exists(),
    }))
}

/// Run the pipeline on an uploaded frame.
async fn detect_handler(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ServiceError> {
    let outcome = detect(&state, payload).await;
    if let Err(e) = &outcome {
        error!("Detection request failed: {}", e);
    }
    outcome
}

async fn detect(state: &AppState, payload: Multipart) -> Result<HttpResponse, ServiceError> {
    if !state.pipeline.model_loaded() {
        return Err(ServiceError::ModelUnavailable);
    }

    let image_bytes = read_image_field(payload, state.max_upload_bytes).await?;
    let worker_pipeline = state.pipeline.clone();

    let report = web::block(move || {
        let frame = decode_frame(&image_bytes)?;
        worker_pipeline.process(&frame)
    })
    .await
    .map_err(|e| ServiceError::InternalUnexpected {
        reason: e.to_string(),
    })??;

    pipeline::log_report(&report);
    Ok(HttpResponse::Ok().json(DetectResponse::from(&report)))
}

/// Collect the bytes of the `image` file part.
///
/// Other fields are skipped. A part without a file name is not a file
/// upload and is skipped too.
async fn read_image_field(mut payload: Multipart, limit: usize) -> Result<Vec<u8>, InputError> {
    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| InputError::Malformed {
            reason: e.to_string(),
        })?;

        let disposition = field.content_disposition();
        if disposition.get_name() != Some(IMAGE_FIELD) {
            continue;
        }
        match disposition.get_filename() {
            None => continue,
            Some("") => return Err(InputError::EmptyFilename),
            Some(_) => {}
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| InputError::Malformed {
                reason: e.to_string(),
            })?;
            if bytes.len() + chunk.len() > limit {
                return Err(InputError::TooLarge { limit });
            }
            bytes.extend_from_slice(&chunk);
        }
        return Ok(bytes);
    }

    Err(InputError::MissingImage)
}

/// Decode an uploaded image in any format the `image` crate understands.
pub fn decode_frame(bytes: &[u8]) -> Result<DynamicImage, InputError> {
    image::load_from_memory(bytes).map_err(|e| InputError::Undecodable {
        reason: e.to_string(),
    })
}
