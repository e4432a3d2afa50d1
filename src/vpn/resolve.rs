//! Address string parsing and resolution (IPv4 only)

use super::SetupError;
use ipnetwork::Ipv4Network;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use tracing::debug;

fn first_ipv4(addr: &str, addrs: impl Iterator<Item = SocketAddr>) -> Result<Ipv4Addr, SetupError> {
    addrs
        .filter_map(|a| match a.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| SetupError::Resolution {
            addr: addr.to_string(),
            reason: "no IPv4 address found".to_string(),
        })
}

/// Resolve a `host:port` transport address
pub fn resolve_socket_addr(addr: &str) -> Result<Ipv4Addr, SetupError> {
    let addrs = addr.to_socket_addrs().map_err(|e| SetupError::Resolution {
        addr: addr.to_string(),
        reason: e.to_string(),
    })?;
    let ip = first_ipv4(addr, addrs)?;
    debug!(addr, %ip, "resolved transport address");
    Ok(ip)
}

/// Resolve a plain IPv4 literal or hostname
pub fn resolve_host(host: &str) -> Result<Ipv4Addr, SetupError> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(ip);
    }
    if host.is_empty() || host.contains(':') {
        return Err(SetupError::Resolution {
            addr: host.to_string(),
            reason: "expected an IPv4 address or hostname".to_string(),
        });
    }
    let addrs = (host, 0).to_socket_addrs().map_err(|e| SetupError::Resolution {
        addr: host.to_string(),
        reason: e.to_string(),
    })?;
    let ip = first_ipv4(host, addrs)?;
    debug!(host, %ip, "resolved host");
    Ok(ip)
}

/// Parse `a.b.c.d/n`, keeping the host bits of the address
pub fn parse_cidr(cidr: &str) -> Result<Ipv4Network, SetupError> {
    if !cidr.contains('/') {
        return Err(SetupError::Resolution {
            addr: cidr.to_string(),
            reason: "missing prefix length".to_string(),
        });
    }
    cidr.parse().map_err(|e: ipnetwork::IpNetworkError| SetupError::Resolution {
        addr: cidr.to_string(),
        reason: e.to_string(),
    })
}
