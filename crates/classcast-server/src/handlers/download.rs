use crate::security::client_ip;
use crate::state::AppState;
use crate::utils::error::ApiError;
use crate::utils::headers::content_disposition;
use axum::{
    body::Body,
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use classcast_registry::{ResolveError, SessionView};
use futures::TryStreamExt;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub code: Option<String>,
    pub pin: Option<String>,
}

/// `GET /download?code=123456&pin=xxxx`
pub async fn download_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let client = client_ip(addr, &headers);
    let view = resolve(&state, client, &query)?;

    // The registry saw the file a moment ago; losing it now is still Gone,
    // but the session is left for the next poll to evict.
    let file = tokio::fs::File::open(view.handle.path()).await.map_err(|e| {
        warn!(client = %client, code = %view.code, error = %e, "DOWNLOAD_ERROR");
        ApiError::from(ResolveError::Gone)
    })?;

    let code = view.code.clone();
    let stream = ReaderStream::new(file).inspect_err(move |e| {
        warn!(client = %client, code = %code, error = %e, "DOWNLOAD_ERROR");
    });

    info!(
        client = %client,
        code = %view.code,
        file = %view.original_name,
        size = view.size,
        "DOWNLOAD"
    );

    let mut response = Body::from_stream(stream).into_response();
    apply_file_headers(response.headers_mut(), &view);
    Ok(response)
}

/// `HEAD /download?code=123456&pin=xxxx`, the student's metadata probe.
pub async fn download_probe_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<DownloadQuery>,
) -> Response {
    let client = client_ip(addr, &headers);

    match resolve(&state, client, &query) {
        Ok(view) => {
            debug!(client = %client, code = %view.code, "DOWNLOAD_PROBE");
            let mut response = StatusCode::OK.into_response();
            apply_file_headers(response.headers_mut(), &view);
            response
        }
        Err(e) => e.status().into_response(),
    }
}

fn resolve(state: &AppState, client: IpAddr, query: &DownloadQuery) -> Result<SessionView, ApiError> {
    let raw = query.code.as_deref().unwrap_or("");

    state.registry.resolve(raw, query.pin.as_deref()).map_err(|err| {
        match err {
            ResolveError::InvalidCode | ResolveError::NotFound => {
                debug!(client = %client, code = raw, outcome = err.kind(), "DOWNLOAD_REJECTED")
            }
            ResolveError::Expired => info!(client = %client, code = raw, "DOWNLOAD_EXPIRED"),
            ResolveError::Gone => warn!(client = %client, code = raw, "DOWNLOAD_MISSING"),
            ResolveError::PinRequired => warn!(client = %client, code = raw, "DOWNLOAD_PIN_FAIL"),
        }
        ApiError::from(err)
    })
}

fn apply_file_headers(headers: &mut HeaderMap, view: &SessionView) {
    if let Ok(value) = HeaderValue::from_str(&view.mime_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(view.size));
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&view.original_name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
}
