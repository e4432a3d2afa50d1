//! Tunnel session network setup
//!
//! - `routing`: route inspection, endpoint host route, split default route
//! - `interface`: link bring-up and tunnel addressing
//! - `firewall`: NAT/forwarding rules (server role)
//! - `setup`: client and server call sequences

pub mod error;
pub mod firewall;
pub mod interface;
pub mod resolve;
pub mod routing;
pub mod setup;

pub use error::SetupError;
pub use setup::{ClientSetup, PostHandshakeHook, ServerSetup};
