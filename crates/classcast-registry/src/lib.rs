//! # ClassCast Registry
//!
//! In-memory code/session registry for the LAN file relay: code generation,
//! PIN-gated lookup, lazy eviction and the periodic expiry sweep.

pub mod code;
pub mod config;
pub mod error;
pub mod metrics;
pub mod store;
pub mod time;

pub use code::{Code, CodeGenerator, CodeSource, RandomCodes};
pub use config::RegistryConfig;
pub use error::{ConfigError, CreateError, ResolveError};
pub use metrics::{Metrics, MetricsSnapshot};
pub use store::{
    DiskStore, FileStore, NewSession, Pin, RegistryStats, SessionRegistry, SessionView,
    StorageHandle, Sweeper,
};
pub use time::{Clock, ManualClock, SystemClock};
