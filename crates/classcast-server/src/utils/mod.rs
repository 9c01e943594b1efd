pub mod error;
pub mod headers;

pub use error::ApiError;
