//! Client and server setup sequences
//!
//! Both sequences are fail-fast: the first error is returned as is and
//! nothing already applied is undone, so a failure can leave the host
//! partially configured (for example an interface that is up and addressed
//! but has no NAT rules yet).

use super::firewall::configure_nat;
use super::interface::{assign_address, bring_up};
use super::routing::{except_tunnel_endpoint, override_default_route};
use super::SetupError;
use crate::config::{ClientConfig, ServerConfig, SetupSettings};
use crate::platform::{CommandRunner, NetworkControl};
use tracing::info;

/// Work to run once the transport handshake has succeeded.
///
/// The transport layer calls `on_handshake_complete` exactly once; an error
/// aborts the session.
pub trait PostHandshakeHook {
    fn on_handshake_complete(&self) -> Result<(), SetupError>;
}

/// Client role: pin the server, configure the tunnel link, then move the
/// default route into the tunnel.
pub struct ClientSetup<'a> {
    net: &'a dyn NetworkControl,
    settings: &'a SetupSettings,
    client: &'a ClientConfig,
}

impl<'a> ClientSetup<'a> {
    pub fn new(
        net: &'a dyn NetworkControl,
        settings: &'a SetupSettings,
        client: &'a ClientConfig,
    ) -> Self {
        Self {
            net,
            settings,
            client,
        }
    }
}

impl PostHandshakeHook for ClientSetup<'_> {
    fn on_handshake_complete(&self) -> Result<(), SetupError> {
        let c = self.client;
        info!(
            server = %c.server_addr,
            interface = %c.interface,
            tunnel_cidr = %c.tunnel_cidr,
            gateway = %c.gateway,
            "Running client setup"
        );

        // Must precede the split routes, or the transport would route into itself
        except_tunnel_endpoint(self.net, &c.server_addr)?;
        bring_up(self.net, &c.interface, self.settings.mtu)?;
        assign_address(self.net, &c.interface, &c.tunnel_cidr, &c.gateway)?;
        override_default_route(self.net, &c.gateway)?;

        info!("Client setup complete");
        Ok(())
    }
}

/// Server role: configure the tunnel link and NAT before accepting clients.
pub struct ServerSetup<'a> {
    net: &'a dyn NetworkControl,
    runner: &'a dyn CommandRunner,
    settings: &'a SetupSettings,
    server: &'a ServerConfig,
}

impl<'a> ServerSetup<'a> {
    pub fn new(
        net: &'a dyn NetworkControl,
        runner: &'a dyn CommandRunner,
        settings: &'a SetupSettings,
        server: &'a ServerConfig,
    ) -> Self {
        Self {
            net,
            runner,
            settings,
            server,
        }
    }

    pub fn run(&self) -> Result<(), SetupError> {
        let s = self.server;
        info!(
            interface = %s.interface,
            tunnel_cidr = %s.tunnel_cidr,
            "Running server setup"
        );

        bring_up(self.net, &s.interface, self.settings.mtu)?;
        assign_address(self.net, &s.interface, &s.tunnel_cidr, "")?;
        configure_nat(
            self.net,
            self.runner,
            &self.settings.firewall_tool,
            &self.settings.probe_addr,
            &s.interface,
        )?;

        if self.settings.enable_ip_forward {
            info!("Enabling IPv4 forwarding");
            self.net.set_ipv4_forwarding(true)?;
        }

        info!("Server setup complete");
        Ok(())
    }
}
