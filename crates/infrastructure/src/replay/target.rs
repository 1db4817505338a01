use dnsreplay_domain::config::client_pool::service_port;
use dnsreplay_domain::DomainError;
use std::net::{SocketAddr, ToSocketAddrs};

/// Resolves the replay target to all its addresses (IPv4 + IPv6).
pub fn resolve_target(host: &str, service: &str) -> Result<Vec<SocketAddr>, DomainError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(DomainError::TargetUnset);
    }
    let port = service_port(service)?;
    let target = format!("{}:{}", host, port);

    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| DomainError::TargetResolution(target.clone(), e.to_string()))?
        .collect();

    if addrs.is_empty() {
        return Err(DomainError::NoTargetAddress(target));
    }

    Ok(addrs)
}
