use axum::http::{HeaderValue, Method};
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, warn};

/// Browser origins allowed to call the API: the pages this server hands
/// out over the LAN, localhost, and anything configured on top.
///
/// Requests without an `Origin` header (curl, same-origin navigation) are
/// always accepted.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    port: u16,
    lan_ips: Vec<IpAddr>,
    allowed: BTreeSet<String>,
}

impl OriginPolicy {
    pub fn new(lan_ips: Vec<IpAddr>, port: u16, extra_origins: &[String]) -> Self {
        let mut allowed = BTreeSet::new();

        for ip in &lan_ips {
            allowed.insert(http_origin(*ip, port));
        }
        allowed.insert(format!("http://localhost:{}", port));
        allowed.insert(http_origin(IpAddr::V4(Ipv4Addr::LOCALHOST), port));

        for origin in extra_origins {
            let origin = origin.trim().trim_end_matches('/');
            if origin.is_empty() {
                continue;
            }
            if HeaderValue::from_str(origin).is_err() {
                warn!("Invalid extra origin ignored: {}", origin);
                continue;
            }
            allowed.insert(origin.to_string());
        }

        debug!("Allowed origins: {:?}", allowed);
        Self {
            port,
            lan_ips,
            allowed,
        }
    }

    /// Allows every LAN address the host is reachable on: the detected
    /// outward-facing one, the configured `lan_ips`, and the bind host when it
    /// is a concrete non-loopback address.
    pub fn detect(host: &str, port: u16, lan_ips: &[String], extra_origins: &[String]) -> Self {
        let lan_ips = collect_lan_ips(detect_lan_ip(), host, lan_ips);

        if lan_ips.is_empty() {
            warn!("No LAN address detected, only localhost origins are allowed");
        }
        Self::new(lan_ips, port, extra_origins)
    }

    pub fn allows(&self, origin: Option<&HeaderValue>) -> bool {
        match origin {
            None => true,
            Some(value) => value
                .to_str()
                .map(|o| self.allowed.contains(o))
                .unwrap_or(false),
        }
    }

    pub fn allowed_origins(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }

    /// Page URLs worth printing at startup.
    pub fn banner_urls(&self) -> Vec<String> {
        let mut urls = Vec::new();
        for ip in &self.lan_ips {
            let base = http_origin(*ip, self.port);
            urls.push(format!("{}/teacher", base));
            urls.push(format!("{}/student", base));
        }
        urls.push(format!("http://localhost:{}/teacher", self.port));
        urls
    }

    pub fn cors_layer(&self) -> CorsLayer {
        let policy = self.clone();
        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(move |origin, _parts| {
                policy.allows(Some(origin))
            }))
            .allow_methods([Method::GET, Method::HEAD, Method::POST])
            .allow_headers(Any)
            .expose_headers([
                axum::http::header::CONTENT_DISPOSITION,
                axum::http::header::CONTENT_LENGTH,
            ])
    }
}

/// Merges LAN address sources in order, skipping duplicates, unparsable
/// entries, and loopback or unspecified addresses.
pub fn collect_lan_ips(detected: Option<IpAddr>, host: &str, configured: &[String]) -> Vec<IpAddr> {
    let mut ips: Vec<IpAddr> = Vec::new();
    let mut push = |ip: IpAddr| {
        if !ip.is_unspecified() && !ip.is_loopback() && !ips.contains(&ip) {
            ips.push(ip);
        }
    };

    if let Some(ip) = detected {
        push(ip);
    }
    if let Ok(bound) = host.parse::<IpAddr>() {
        push(bound);
    }
    for entry in configured {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.parse::<IpAddr>() {
            Ok(ip) => push(ip),
            Err(_) => warn!("Invalid LAN IP ignored: {}", entry),
        }
    }

    ips
}

fn http_origin(ip: IpAddr, port: u16) -> String {
    format!("http://{}", SocketAddr::new(ip, port))
}

/// Best-effort outward-facing address. Connecting a UDP socket sends no
/// packets; it only asks the OS which interface would route there.
pub fn detect_lan_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    if socket.connect("8.8.8.8:80").is_err() && socket.connect("1.1.1.1:80").is_err() {
        return None;
    }
    socket
        .local_addr()
        .ok()
        .map(|addr| addr.ip())
        .filter(|ip| !ip.is_unspecified() && !ip.is_loopback())
}
