use axum::extract::FromRef;
use classcast_registry::SessionRegistry;
use std::sync::Arc;

use crate::config::Settings;
use crate::intake::UploadStore;
use crate::security::{DownloadLimiter, IpWhitelist, OriginPolicy};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<SessionRegistry>,
    pub uploads: Arc<UploadStore>,
    pub limiter: Arc<DownloadLimiter>,
    pub ip_whitelist: Arc<IpWhitelist>,
    pub origins: Arc<OriginPolicy>,
}

impl FromRef<AppState> for Arc<SessionRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.registry.clone()
    }
}

impl FromRef<AppState> for Arc<UploadStore> {
    fn from_ref(state: &AppState) -> Self {
        state.uploads.clone()
    }
}

impl FromRef<AppState> for Arc<DownloadLimiter> {
    fn from_ref(state: &AppState) -> Self {
        state.limiter.clone()
    }
}
