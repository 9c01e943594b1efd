use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// Address a request is attributed to for logging, whitelisting and rate
/// limiting.
///
/// `X-Forwarded-For` is only honoured when the TCP peer is loopback, i.e. a
/// reverse proxy on the same host. Anyone else could forge it.
pub fn client_ip(peer: SocketAddr, headers: &HeaderMap) -> IpAddr {
    let peer_ip = peer.ip();
    if !peer_ip.is_loopback() {
        return peer_ip;
    }

    extract_forwarded_ip(headers).unwrap_or(peer_ip)
}

fn extract_forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<IpAddr>().ok())
}
