//! Route table manipulation for full-tunnel setup
//!
//! Two changes are made to the host routing table, in this order:
//!
//! 1. A host route pins the tunnel's own remote endpoint to the current
//!    default gateway, so transport traffic keeps flowing outside the tunnel.
//! 2. Two half-space routes (`0.0.0.0/1` and `128.0.0.0/1`) send everything
//!    else through the tunnel gateway. They win over the existing default
//!    route by longest-prefix match, so that route is never deleted or
//!    replaced.
//!
//! Step 1 must run while the original default route still decides where
//! traffic goes.

use super::error::tolerate_existing;
use super::resolve::{resolve_host, resolve_socket_addr};
use super::SetupError;
use crate::platform::{Route, RouteTable};
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use tracing::info;

/// Well-known external address used to find the internet-facing link.
/// Only routed, never contacted.
pub const DEFAULT_PROBE_ADDR: &str = "8.8.8.8:53";

/// Halves of the IPv4 address space, split at 128.0.0.0.
pub const SPLIT_ROUTES: [Ipv4Network; 2] = [
    Ipv4Network::new_checked(Ipv4Addr::new(0, 0, 0, 0), 1).unwrap(),
    Ipv4Network::new_checked(Ipv4Addr::new(128, 0, 0, 0), 1).unwrap(),
];

/// Read-only route queries
pub struct RouteInspector<'a, R: ?Sized> {
    routes: &'a R,
    probe_addr: &'a str,
}

impl<'a, R: RouteTable + ?Sized> RouteInspector<'a, R> {
    pub fn new(routes: &'a R) -> Self {
        Self::with_probe(routes, DEFAULT_PROBE_ADDR)
    }

    pub fn with_probe(routes: &'a R, probe_addr: &'a str) -> Self {
        Self { routes, probe_addr }
    }

    /// Candidate routes to a `host:port` destination
    pub fn route_to(&self, destination: &str) -> Result<Vec<Route>, SetupError> {
        let ip = resolve_socket_addr(destination)?;
        self.routes_to_ip(ip)
    }

    /// Gateway of the first route to a `host:port` destination
    pub fn default_gateway(&self, destination: &str) -> Result<Ipv4Addr, SetupError> {
        let ip = resolve_socket_addr(destination)?;
        self.gateway_to_ip(ip)
    }

    /// Index of the link currently used to reach the internet
    pub fn default_link_index(&self) -> Result<u32, SetupError> {
        let ip = resolve_socket_addr(self.probe_addr)?;
        let first = self.first_route(ip)?;
        first.link_index.ok_or(SetupError::NoRoute(ip))
    }

    /// Gateway of the first route to an already resolved address
    pub fn gateway_to_ip(&self, ip: Ipv4Addr) -> Result<Ipv4Addr, SetupError> {
        self.first_route(ip)?
            .gateway
            .ok_or(SetupError::NoGateway(ip))
    }

    fn routes_to_ip(&self, ip: Ipv4Addr) -> Result<Vec<Route>, SetupError> {
        let routes = self.routes.route_get(ip)?;
        if routes.is_empty() {
            return Err(SetupError::NoRoute(ip));
        }
        Ok(routes)
    }

    fn first_route(&self, ip: Ipv4Addr) -> Result<Route, SetupError> {
        let mut routes = self.routes_to_ip(ip)?;
        Ok(routes.swap_remove(0))
    }
}

/// Pin the route to `remote_addr` (`host:port`) to the current default gateway.
///
/// An identical existing route counts as success.
pub fn except_tunnel_endpoint<R>(routes: &R, remote_addr: &str) -> Result<(), SetupError>
where
    R: RouteTable + ?Sized,
{
    // Resolved once: the pinned address must be the one whose route was read
    let remote = resolve_socket_addr(remote_addr)?;
    let gateway = RouteInspector::new(routes).gateway_to_ip(remote)?;

    let route = Route::via(Ipv4Network::from(remote), gateway);
    info!(%route, "Adding host route for tunnel endpoint");
    tolerate_existing(routes.route_add(&route), "endpoint route")?;
    Ok(())
}

/// Route the whole IPv4 space through `tunnel_gateway` with two /1 routes.
pub fn override_default_route<R>(routes: &R, tunnel_gateway: &str) -> Result<(), SetupError>
where
    R: RouteTable + ?Sized,
{
    let gateway = resolve_host(tunnel_gateway)?;

    for destination in SPLIT_ROUTES {
        let route = Route::via(destination, gateway);
        info!(%route, "Adding split default route");
        tolerate_existing(routes.route_add(&route), "split default route")?;
    }
    Ok(())
}
