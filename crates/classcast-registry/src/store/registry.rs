use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::code::{Code, CodeGenerator, CodeSource, RandomCodes};
use crate::config::RegistryConfig;
use crate::error::{CreateError, ResolveError};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::store::files::FileStore;
use crate::store::session::{NewSession, Pin, Session, SessionView};
use crate::time::Clock;

/// Live code -> session map.
///
/// Each operation on a code runs under that code's shard lock, so a session
/// is either fully present or fully gone. Files are deleted only after their
/// entry has left the map, by whoever removed it.
pub struct SessionRegistry {
    sessions: DashMap<Code, Session>,
    generator: CodeGenerator,
    clock: Arc<dyn Clock>,
    files: Arc<dyn FileStore>,
    metrics: Metrics,
    cfg: RegistryConfig,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RegistryStats {
    pub active_sessions: usize,
    pub stored_bytes: u64,
    pub counters: MetricsSnapshot,
}

enum Eviction {
    Expired,
    Gone,
}

impl SessionRegistry {
    pub fn new(cfg: RegistryConfig, clock: Arc<dyn Clock>, files: Arc<dyn FileStore>) -> Self {
        Self::with_code_source(cfg, clock, files, Box::new(RandomCodes))
    }

    pub fn with_code_source(
        cfg: RegistryConfig,
        clock: Arc<dyn Clock>,
        files: Arc<dyn FileStore>,
        source: Box<dyn CodeSource>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            generator: CodeGenerator::new(source, cfg.max_code_attempts),
            clock,
            files,
            metrics: Metrics::new(),
            cfg,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.cfg
    }

    /// Registers an uploaded file under a fresh code.
    pub fn create(&self, upload: NewSession) -> Result<Code, CreateError> {
        let pin = Pin::new(upload.pin, self.cfg.max_pin_len)?;
        let pin_state = if pin.is_some() { "set" } else { "none" };
        let created_at = self.clock.now();

        let mut pending = Some(Session {
            handle: upload.handle,
            original_name: upload.original_name,
            size: upload.size,
            mime_type: upload.mime_type,
            pin,
            created_at,
            expires_at: created_at + self.cfg.ttl,
            downloaded: false,
        });

        let code = self.generator.claim(|code| match self.sessions.entry(code) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => pending.take().map(|session| {
                let code = slot.key().clone();
                info!(
                    code = %code,
                    file = %session.original_name,
                    size = session.size,
                    pin = pin_state,
                    "session created"
                );
                slot.insert(session);
                code
            }),
        })?;

        self.metrics.inc_created();
        Ok(code)
    }

    /// Looks up a code and checks, in order: shape, presence, expiry, backing
    /// file, PIN. Expired and file-less sessions are evicted on the way out.
    pub fn resolve(&self, raw_code: &str, pin: Option<&str>) -> Result<SessionView, ResolveError> {
        let code = Code::parse(raw_code).ok_or(ResolveError::InvalidCode)?;
        let now = self.clock.now();

        let occupied = match self.sessions.entry(code.clone()) {
            Entry::Occupied(occupied) => occupied,
            Entry::Vacant(_) => {
                self.metrics.inc_not_found();
                return Err(ResolveError::NotFound);
            }
        };

        let session = occupied.get();
        let eviction = if session.is_expired(now) {
            Some(Eviction::Expired)
        } else if !self.files.exists(&session.handle) {
            Some(Eviction::Gone)
        } else {
            None
        };

        match eviction {
            Some(reason) => {
                let (_, session) = occupied.remove_entry();
                Err(self.evict(&code, &session, reason))
            }
            None => {
                let mut occupied = occupied;
                let session = occupied.get_mut();
                if !session.admits(pin) {
                    self.metrics.inc_pin_rejected();
                    debug!(code = %code, "PIN required or incorrect");
                    return Err(ResolveError::PinRequired);
                }
                session.downloaded = true;
                self.metrics.inc_resolved();
                Ok(session.view(&code))
            }
        }
    }

    /// Evicts every session whose expiry is at or before `now`.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let candidates: Vec<Code> = self
            .sessions
            .iter()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for code in candidates {
            // Re-check under the shard lock; a resolve may have beaten us to it.
            if let Some((code, session)) = self.sessions.remove_if(&code, |_, s| s.is_expired(now)) {
                self.discard(&code, &session);
                info!(code = %code, file = %session.original_name, "expired session swept");
                evicted += 1;
            }
        }

        if evicted > 0 {
            self.metrics.inc_swept(evicted as u64);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let stored_bytes = self
            .sessions
            .iter()
            .fold(0u64, |sum, entry| sum.saturating_add(entry.size));

        RegistryStats {
            active_sessions: self.sessions.len(),
            stored_bytes,
            counters: self.metrics.snapshot(),
        }
    }

    fn evict(&self, code: &Code, session: &Session, reason: Eviction) -> ResolveError {
        match reason {
            Eviction::Expired => {
                self.metrics.inc_expired();
                self.discard(code, session);
                info!(code = %code, file = %session.original_name, "session expired on lookup");
                ResolveError::Expired
            }
            Eviction::Gone => {
                self.metrics.inc_gone();
                warn!(
                    code = %code,
                    file = %session.original_name,
                    handle = %session.handle,
                    "backing file missing, session dropped"
                );
                ResolveError::Gone
            }
        }
    }

    /// Best-effort delete of a session's file once its entry is out of the map.
    fn discard(&self, code: &Code, session: &Session) {
        if let Err(e) = self.files.remove(&session.handle) {
            warn!(
                code = %code,
                handle = %session.handle,
                error = %e,
                "failed to delete backing file"
            );
        }
    }
}
