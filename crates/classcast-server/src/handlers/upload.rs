use crate::intake::{IntakeError, StagedUpload};
use crate::security::client_ip;
use crate::state::AppState;
use crate::utils::error::ApiError;
use axum::{
    extract::{multipart::MultipartError, ConnectInfo, Multipart, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use classcast_registry::NewSession;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::{debug, info};

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub pin: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub code: String,
    pub expires_in: i64,
    pub file: String,
    pub pin_required: bool,
}

pub async fn upload_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let client = client_ip(addr, &headers);
    debug!("File upload request received from {}", client);

    let limit = state.uploads.max_bytes();
    let mut staged: Option<StagedUpload> = None;
    let mut form_pin: Option<String> = None;

    // Parse multipart form; `pin` may come before or after `file`
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::from(intake_error(e, limit)))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "pin" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid pin: {}", e)))?;
                form_pin = Some(text);
            }
            "file" if staged.is_none() => {
                let filename = field.file_name().unwrap_or("").to_string();
                let mime_type = essence(field.content_type().unwrap_or("application/octet-stream"));
                let body = field.map_err(move |e| intake_error(e, limit));

                staged = Some(state.uploads.store(&filename, &mime_type, body).await?);
            }
            _ => {}
        }
    }

    let staged = staged.ok_or_else(|| ApiError::BadRequest("No file uploaded.".to_string()))?;
    let pin = form_pin.filter(|p| !p.is_empty()).or(query.pin);
    let pin_state = match pin.as_deref() {
        Some(p) if !p.is_empty() => "set",
        _ => "none",
    };

    // On error `staged` is dropped and the file goes with it
    let code = state.registry.create(NewSession {
        handle: staged.handle.clone(),
        original_name: staged.original_name.clone(),
        size: staged.size,
        mime_type: staged.mime_type.clone(),
        pin,
    })?;

    info!(
        client = %client,
        code = %code,
        file = %staged.stored_name,
        size = staged.size,
        pin = pin_state,
        "UPLOAD"
    );

    let file = staged.original_name.clone();
    staged.commit();

    Ok(Json(UploadResponse {
        code: code.to_string(),
        expires_in: state.registry.config().ttl.num_seconds(),
        file,
        pin_required: pin_state == "set",
    }))
}

fn intake_error(e: MultipartError, limit: u64) -> IntakeError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        IntakeError::TooLarge { limit }
    } else {
        IntakeError::Stream(e.body_text())
    }
}

/// `image/png; charset=binary` -> `image/png`
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
