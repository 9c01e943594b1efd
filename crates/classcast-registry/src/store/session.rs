use chrono::{DateTime, Utc};
use std::fmt;

use crate::code::Code;
use crate::error::CreateError;
use crate::store::files::StorageHandle;

/// Optional download gate. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(String);

impl Pin {
    /// Empty input means "no gate"; over-long input is rejected.
    pub fn new(raw: Option<String>, max_len: usize) -> Result<Option<Self>, CreateError> {
        match raw {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) if s.len() > max_len => Err(CreateError::InvalidPin { max: max_len }),
            Some(s) => Ok(Some(Self(s))),
        }
    }

    /// Exact, case-sensitive match. A missing caller PIN never matches.
    pub fn matches(&self, supplied: Option<&str>) -> bool {
        supplied.is_some_and(|p| p == self.0)
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(***)")
    }
}

/// What upload intake hands to `SessionRegistry::create`.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub handle: StorageHandle,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    pub pin: Option<String>,
}

#[derive(Debug)]
pub struct Session {
    pub handle: StorageHandle,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    pub pin: Option<Pin>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub downloaded: bool,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn admits(&self, supplied: Option<&str>) -> bool {
        match &self.pin {
            None => true,
            Some(pin) => pin.matches(supplied),
        }
    }

    pub fn view(&self, code: &Code) -> SessionView {
        SessionView {
            code: code.clone(),
            original_name: self.original_name.clone(),
            size: self.size,
            mime_type: self.mime_type.clone(),
            handle: self.handle.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

/// Read-only snapshot returned by a successful resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub code: Code,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    pub handle: StorageHandle,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
