pub mod files;
pub mod registry;
pub mod session;
pub mod sweeper;

pub use files::{DiskStore, FileStore, StorageHandle};
pub use registry::{RegistryStats, SessionRegistry};
pub use session::{NewSession, Pin, Session, SessionView};
pub use sweeper::Sweeper;
