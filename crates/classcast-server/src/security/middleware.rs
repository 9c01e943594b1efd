use crate::security::client_ip::client_ip;
use crate::state::AppState;
use crate::utils::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::header::ORIGIN,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::{debug, warn};

/// Security middleware - check IP whitelist and browser origin
pub async fn security_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = client_ip(addr, request.headers());
    debug!("Incoming request from IP: {}", ip);

    // 1. Check IP whitelist
    if !state.ip_whitelist.is_allowed(ip) {
        warn!("Request from non-whitelisted IP: {}", ip);
        return Err(ApiError::Forbidden(format!("Access denied from IP: {}", ip)));
    }

    // 2. Check Origin against the LAN policy
    let origin = request.headers().get(ORIGIN);
    if !state.origins.allows(origin) {
        let shown = origin
            .and_then(|o| o.to_str().ok())
            .unwrap_or("<binary>")
            .to_string();
        warn!("Request from {} with disallowed origin {}", ip, shown);
        return Err(ApiError::Forbidden(
            "CORS: Not allowed by ClassCast LAN policy".to_string(),
        ));
    }

    Ok(next.run(request).await)
}
