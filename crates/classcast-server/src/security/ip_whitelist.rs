use anyhow::Result;
use ipnetwork::IpNetwork;
use std::net::IpAddr;
use tracing::{debug, warn};

/// Peers allowed to reach the relay; everything else gets 403.
#[derive(Debug, Clone)]
pub struct IpWhitelist {
    allowed_networks: Vec<IpNetwork>,
}

impl IpWhitelist {
    pub fn new(allowed_ips: &[String]) -> Result<Self> {
        let networks = Self::parse_ip_list(allowed_ips);
        if networks.is_empty() {
            anyhow::bail!("security.allowed_ips contains no valid IP or CIDR entry");
        }

        Ok(Self {
            allowed_networks: networks,
        })
    }

    /// Parse IP list (single IP or CIDR). Invalid entries are skipped.
    fn parse_ip_list(ips: &[String]) -> Vec<IpNetwork> {
        let mut networks = Vec::new();

        for ip_str in ips {
            let ip_str = ip_str.trim();

            match ip_str.parse::<IpNetwork>() {
                Ok(network) => {
                    debug!("Added network: {}", network);
                    networks.push(network);
                }
                Err(_) => match ip_str.parse::<IpAddr>() {
                    Ok(ip) => {
                        debug!("Added single IP: {}", ip);
                        networks.push(IpNetwork::from(ip));
                    }
                    Err(_) => warn!("Invalid IP/CIDR format: {}", ip_str),
                },
            }
        }

        networks
    }

    pub fn is_allowed(&self, ip: IpAddr) -> bool {
        let ip = canonical(ip);

        if let Some(network) = self.allowed_networks.iter().find(|n| n.contains(ip)) {
            debug!("IP {} matched network {}", ip, network);
            return true;
        }

        warn!("IP {} not in whitelist", ip);
        false
    }

    pub fn get_whitelist(&self) -> Vec<String> {
        self.allowed_networks.iter().map(|n| n.to_string()).collect()
    }
}

/// IPv4 peers on a dual-stack socket arrive as `::ffff:a.b.c.d`.
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}
