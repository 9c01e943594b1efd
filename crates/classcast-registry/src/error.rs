//! Registry outcome types.
//!
//! Every variant is an ordinary result of a client poll, not a fault.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    #[error("code must be exactly 6 digits")]
    InvalidCode,

    #[error("code not found")]
    NotFound,

    #[error("file expired")]
    Expired,

    #[error("file deleted before download")]
    Gone,

    #[error("PIN required or incorrect")]
    PinRequired,
}

impl ResolveError {
    /// Short name used in logs and JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::InvalidCode => "InvalidCode",
            ResolveError::NotFound => "NotFound",
            ResolveError::Expired => "Expired",
            ResolveError::Gone => "Gone",
            ResolveError::PinRequired => "PinRequired",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CreateError {
    #[error("PIN must be at most {max} bytes")]
    InvalidPin { max: usize },

    #[error("no free code found after {attempts} attempts")]
    CodeSpaceExhausted { attempts: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("session TTL of {secs}s is out of range (1..={max})")]
    TtlOutOfRange { secs: u64, max: u64 },
}
