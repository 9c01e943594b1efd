pub mod client_ip;
pub mod ip_whitelist;
pub mod middleware;
pub mod origin;
pub mod rate_limit;

pub use client_ip::client_ip;
pub use ip_whitelist::IpWhitelist;
pub use middleware::security_middleware;
pub use origin::OriginPolicy;
pub use rate_limit::{download_rate_limit, DownloadLimiter};
