use axum::{
    extract::{Json as ExtractJson, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::auth::{AccessGate, WRONG_PIN_MESSAGE};
use crate::models::common::{ActionResponse, HistoryQuery, PinRequest, RangeQuery, SubmissionPage};
use crate::models::form::{
    FieldDefinition, FormConfiguration, FormSubmission, NewSubmission, SubmissionUpdate,
};
use crate::services::database::{FormDatabase, PAGE_SIZE};
use crate::services::export::{self, ExportFile};
use crate::services::form_session::validate_submission;
use crate::services::history::{parse_range, EMPTY_RANGE_MESSAGE};

pub const NOTHING_TO_UNDO_MESSAGE: &str = "No hay ninguna eliminación para deshacer";

// AppState struct containing shared resources
pub struct AppState {
    pub database: Arc<FormDatabase>,
    pub access: AccessGate,
    // Single-slot undo buffer: the most recent deletion only
    pub last_deleted: Mutex<Option<FormSubmission>>,
}

// Fetch the active configuration (absent is a valid answer)
pub async fn get_active_configuration(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Option<FormConfiguration>>, StatusCode> {
    match state.database.get_active_configuration() {
        Ok(config) => Ok(Json(config)),
        Err(e) => {
            error!("Failed to fetch active configuration: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// Replace the whole field list of a configuration
pub async fn update_configuration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ExtractJson(fields): ExtractJson<Vec<FieldDefinition>>,
) -> Result<Json<FormConfiguration>, StatusCode> {
    info!(
        "Received request to update configuration {} with {} fields",
        id,
        fields.len()
    );

    match state.database.update_configuration(&id, fields) {
        Ok(Some(updated)) => Ok(Json(updated)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("Failed to update configuration: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// Validated form submission endpoint. Required-and-enabled fields with a
// blank value produce a field-keyed error map and no insert is issued.
pub async fn submit_form(
    State(state): State<Arc<AppState>>,
    ExtractJson(payload): ExtractJson<NewSubmission>,
) -> Response {
    let fields = match state.database.get_active_configuration() {
        Ok(config) => config.map(|c| c.fields).unwrap_or_default(),
        Err(e) => {
            error!("Failed to fetch configuration for validation: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let errors = validate_submission(&fields, &payload);
    if !errors.is_empty() {
        warn!("Rejected submission with {} validation errors", errors.len());
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "errors": errors })),
        )
            .into_response();
    }

    match state.database.insert_submission(&payload) {
        Ok(created) => {
            info!("Created submission {}", created.id);
            (StatusCode::CREATED, Json(created)).into_response()
        }
        Err(e) => {
            error!("Failed to insert submission: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// Paginated, searched history listing
pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<SubmissionPage>, StatusCode> {
    info!(
        "Received request to list submissions with page={}, search={:?}",
        params.page, params.search
    );

    match state.database.list_submissions(params.page, &params.search) {
        Ok((submissions, total_count)) => Ok(Json(SubmissionPage {
            total_count,
            current_page: params.page,
            total_pages: (total_count + PAGE_SIZE - 1) / PAGE_SIZE,
            submissions,
        })),
        Err(e) => {
            error!("Failed to list submissions: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// Allow-listed inline edit; unknown fields already failed deserialization
pub async fn update_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ExtractJson(changes): ExtractJson<SubmissionUpdate>,
) -> Result<Json<FormSubmission>, StatusCode> {
    match state.database.update_submission(&id, &changes) {
        Ok(Some(updated)) => Ok(Json(updated)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("Failed to update submission: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// Delete returns the full prior snapshot and retains it in the
// single-slot undo buffer, replacing any older snapshot.
pub async fn delete_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<FormSubmission>, StatusCode> {
    match state.database.delete_submission(&id) {
        Ok(Some(snapshot)) => {
            match state.last_deleted.lock() {
                Ok(mut slot) => *slot = Some(snapshot.clone()),
                Err(e) => warn!("Failed to retain undo snapshot: {}", e),
            }
            info!("Deleted submission {}", snapshot.id);
            Ok(Json(snapshot))
        }
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("Failed to delete submission: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// Re-insert the retained snapshot verbatim, identity preserved
pub async fn undo_delete(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FormSubmission>, (StatusCode, String)> {
    let snapshot = match state.last_deleted.lock() {
        Ok(mut slot) => slot.take(),
        Err(e) => {
            error!("Failed to read undo snapshot: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read undo snapshot".to_string(),
            ));
        }
    };

    let Some(snapshot) = snapshot else {
        return Err((StatusCode::NOT_FOUND, NOTHING_TO_UNDO_MESSAGE.to_string()));
    };

    match state.database.restore_submission(&snapshot) {
        Ok(restored) => {
            info!("Restored submission {}", restored.id);
            Ok(Json(restored))
        }
        Err(e) => {
            error!("Failed to restore submission: {}", e);
            // Put the snapshot back so the undo can be retried
            if let Ok(mut slot) = state.last_deleted.lock() {
                *slot = Some(snapshot);
            }
            Err((StatusCode::INTERNAL_SERVER_ERROR, e))
        }
    }
}

// Unpaginated date-range query
pub async fn range_submissions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<Vec<FormSubmission>>, (StatusCode, String)> {
    let (start, end) = parse_range(
        params.start.as_deref().unwrap_or_default(),
        params.end.as_deref().unwrap_or_default(),
    )
    .map_err(|message| (StatusCode::BAD_REQUEST, message))?;

    match state.database.submissions_in_range(start, end) {
        Ok(submissions) => Ok(Json(submissions)),
        Err(e) => {
            error!("Failed to query submissions by range: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e))
        }
    }
}

// Single-record spreadsheet download
pub async fn export_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, (StatusCode, String)> {
    let submission = match state.database.find_submission(&id) {
        Ok(Some(submission)) => submission,
        Ok(None) => return Err((StatusCode::NOT_FOUND, format!("No submission {}", id))),
        Err(e) => {
            error!("Failed to load submission for export: {}", e);
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e));
        }
    };

    let file = export::single_export(&submission)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))?;

    Ok(download_response(file))
}

// Bulk date-range download; the range is validated and an empty result
// reported before any file is generated.
pub async fn export_range(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeQuery>,
) -> Result<Response, (StatusCode, String)> {
    let (start, end) = parse_range(
        params.start.as_deref().unwrap_or_default(),
        params.end.as_deref().unwrap_or_default(),
    )
    .map_err(|message| (StatusCode::BAD_REQUEST, message))?;

    let submissions = state
        .database
        .submissions_in_range(start, end)
        .map_err(|e| {
            error!("Failed to query submissions for export: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e)
        })?;

    if submissions.is_empty() {
        return Err((StatusCode::NOT_FOUND, EMPTY_RANGE_MESSAGE.to_string()));
    }

    info!("Exporting {} submissions", submissions.len());

    let file = export::range_export(&submissions, start, end)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))?;

    Ok(download_response(file))
}

// PIN gate check; success persists the access flag
pub async fn verify_pin(
    State(state): State<Arc<AppState>>,
    ExtractJson(request): ExtractJson<PinRequest>,
) -> Result<Json<ActionResponse>, (StatusCode, String)> {
    if state.access.verify(&request.pin) {
        Ok(Json(ActionResponse {
            success: true,
            message: "Acceso concedido".to_string(),
        }))
    } else {
        warn!("Rejected access code attempt");
        Err((StatusCode::UNAUTHORIZED, WRONG_PIN_MESSAGE.to_string()))
    }
}

fn download_response(file: ExportFile) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.bytes,
    )
        .into_response()
}
