use rand::Rng;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

use crate::error::CreateError;

pub const CODE_LEN: usize = 6;
pub const CODE_MIN: u32 = 100_000;
pub const CODE_MAX: u32 = 999_999;

/// A six digit share code.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(transparent)]
pub struct Code(String);

impl Code {
    /// Accepts exactly six ASCII digits, nothing else.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() == CODE_LEN && raw.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    fn from_number(n: u32) -> Self {
        Self(format!("{:06}", n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Code {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Yields candidate code values in `CODE_MIN..=CODE_MAX`.
pub trait CodeSource: Send + Sync {
    fn candidate(&self) -> u32;
}

/// Uniform draw from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodes;

impl CodeSource for RandomCodes {
    fn candidate(&self) -> u32 {
        rand::rng().random_range(CODE_MIN..=CODE_MAX)
    }
}

pub struct CodeGenerator {
    source: Box<dyn CodeSource>,
    max_attempts: u32,
}

impl CodeGenerator {
    pub fn new(source: Box<dyn CodeSource>, max_attempts: u32) -> Self {
        Self {
            source,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Draws candidates until `try_claim` accepts one.
    ///
    /// `try_claim` must perform the collision check and the insert as one
    /// atomic step, returning `None` when the code is already live.
    pub fn claim<T>(&self, mut try_claim: impl FnMut(Code) -> Option<T>) -> Result<T, CreateError> {
        for attempt in 1..=self.max_attempts {
            let code = Code::from_number(self.source.candidate());
            if let Some(claimed) = try_claim(code) {
                if attempt > 1 {
                    debug!(attempt, "code claimed after collision retries");
                }
                return Ok(claimed);
            }
        }

        warn!(attempts = self.max_attempts, "code space exhausted");
        Err(CreateError::CodeSpaceExhausted {
            attempts: self.max_attempts,
        })
    }
}
