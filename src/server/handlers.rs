//! Request handlers: submit, poll, and introspection.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::job::{JobRecord, StatusView};
use crate::options::{parse_form_bool, ConvertOptions, EnhancementCredential};
use crate::workspace::JobWorkspace;

use super::error::ApiError;
use super::AppState;

/// Delay between re-checks when a freshly written record may not be
/// visible to this reader yet.
const STALENESS_BACKOFF: std::time::Duration = std::time::Duration::from_millis(50);

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub accepted: bool,
    pub id: Uuid,
    pub status_reference: String,
}

/// `POST /convert` — accept a document and start its conversion.
///
/// Returns 202 as soon as the upload is staged and the record exists; the
/// conversion itself runs on a tracked background task.
pub async fn submit(
    State(app): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let mut filename: Option<String> = None;
    let mut payload: Option<axum::body::Bytes> = None;
    let mut options = ConvertOptions::default();
    let mut credential: Option<EnhancementCredential> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                filename = field.file_name().map(str::to_owned);
                payload = Some(field.bytes().await?);
            }
            Some("output_format") => {
                options.output_format =
                    field.text().await?.parse().map_err(ApiError::InvalidInput)?;
            }
            Some("langs") => {
                options.language_hints =
                    ConvertOptions::parse_language_hints(&field.text().await?);
            }
            Some("paginate") => options.paginate = parse_form_bool(&field.text().await?),
            Some("strip_inline_formatting") => {
                options.strip_inline_formatting = parse_form_bool(&field.text().await?);
            }
            Some("use_enhancement") => {
                options.use_enhancement = parse_form_bool(&field.text().await?);
            }
            Some("enhancement_credential") => {
                let value = field.text().await?;
                let value = value.trim();
                if !value.is_empty() {
                    credential = Some(EnhancementCredential::new(value));
                }
            }
            Some("suppress_embedded_assets") => {
                options.suppress_embedded_assets = parse_form_bool(&field.text().await?);
            }
            Some("reprocess_math") => {
                options.reprocess_math = parse_form_bool(&field.text().await?);
            }
            // Unknown fields are ignored, matching lenient form handling.
            _ => {}
        }
    }

    let payload = payload.ok_or_else(|| ApiError::InvalidInput("missing 'file' field".into()))?;
    let filename = filename.ok_or_else(|| ApiError::InvalidInput("missing filename".into()))?;

    if !filename.to_ascii_lowercase().ends_with(".pdf") {
        return Err(ApiError::InvalidInput(
            "only PDF files are accepted".into(),
        ));
    }
    if payload.is_empty() {
        return Err(ApiError::InvalidInput("uploaded file is empty".into()));
    }
    if payload.len() > app.config.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge);
    }
    // Rejected up front: accepting the job and failing it later would make
    // a configuration mistake look like a conversion failure.
    if options.use_enhancement && credential.is_none() {
        return Err(ApiError::InvalidInput(
            "use_enhancement requires an enhancement_credential".into(),
        ));
    }
    if !options.use_enhancement {
        credential = None;
    }

    let id = Uuid::new_v4();
    let workspace = JobWorkspace::stage(&app.config.data_dir, id, &filename, &payload)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to stage upload: {e}")))?;

    let record = JobRecord::new(id, workspace.input_path().to_path_buf(), options);
    if let Err(e) = app.store.create(&record).await {
        if let Err(cleanup) = workspace.remove().await {
            warn!(job = %id, error = %cleanup, "failed to remove staged upload after create failure");
        }
        return Err(e.into());
    }

    info!(job = %id, file = %filename, size = payload.len(), "job accepted");

    let runner = app.runner.clone();
    app.tracker
        .spawn(async move { runner.run(record, workspace, credential).await });

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            accepted: true,
            id,
            status_reference: format!("/status/{id}"),
        }),
    ))
}

/// `GET /status/{id}` — report job state; deliver a terminal payload once.
///
/// The first poll that observes a terminal record claims it: the payload is
/// returned and the record is gone, so every later poll (and the loser of a
/// concurrent race) sees 404.
pub async fn poll(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusView>, ApiError> {
    let mut record = app.store.load(id).await?;
    // Backends without read-your-writes visibility get a bounded re-check
    // before we report the id unknown.
    for _ in 0..app.store.staleness_retries() {
        if record.is_some() {
            break;
        }
        tokio::time::sleep(STALENESS_BACKOFF).await;
        record = app.store.load(id).await?;
    }
    let record = record.ok_or(ApiError::NotFound)?;

    if !record.status.is_terminal() {
        return Ok(Json(StatusView::processing()));
    }

    match app.store.claim(id).await? {
        Some(terminal) => Ok(Json(StatusView::from(terminal))),
        // A concurrent poll or the sweep claimed it first.
        None => Err(ApiError::NotFound),
    }
}

/// `GET /health`.
pub async fn health(State(app): State<AppState>) -> Result<Json<Value>, ApiError> {
    let active = app.store.count().await?;
    Ok(Json(json!({
        "status": "healthy",
        "active_jobs": active,
    })))
}

/// `GET /` — human-facing service banner.
pub async fn root(State(app): State<AppState>) -> Result<Json<Value>, ApiError> {
    let active = app.store.count().await?;
    Ok(Json(json!({
        "service": "markerd",
        "status": "online",
        "active_jobs": active,
    })))
}
