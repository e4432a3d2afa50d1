//! tunsetup - host network setup for point-to-point tunnels
//!
//! Turns an established tunnel transport into a usable network path. On the
//! client it pins the tunnel endpoint to the current gateway, configures the
//! tunnel interface and moves the default route into the tunnel. On the
//! server it configures the tunnel interface and NATs tunnel clients out
//! through the host's egress link.
//!
//! # Architecture
//!
//! - `config`: Configuration file handling (TOML)
//! - `platform`: Kernel and command capabilities (Linux backend, dry run)
//! - `vpn`: Routing, interface, firewall and the setup sequences
//!
//! # Usage
//!
//! From a transport implementation, after the handshake succeeded:
//! ```ignore
//! let net = tunsetup::platform::get_platform()?;
//! let config = tunsetup::Config::discover(None)?;
//! let client = config.client.as_ref().ok_or("no [client] section")?;
//! client.check()?;
//! let hook = tunsetup::ClientSetup::new(net.as_ref(), &config.setup, client);
//! hook.on_handshake_complete()?;
//! ```

pub mod config;
pub mod platform;
pub mod vpn;

pub use config::Config;
pub use vpn::{ClientSetup, PostHandshakeHook, ServerSetup, SetupError};
