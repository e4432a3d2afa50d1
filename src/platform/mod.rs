//! Host network capabilities
//!
//! The setup components never touch the host directly. They go through the
//! narrow traits defined here: route table queries and additions, link
//! control, and external command execution. The Linux backend implements
//! them on top of iproute2; tests use a recording fake.

#[cfg(target_os = "linux")]
pub mod linux;

mod command;
pub mod dry_run;

#[cfg(test)]
pub(crate) mod fake;

use ipnetwork::Ipv4Network;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use command::SystemCommandRunner;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Link not found: {0}")]
    LinkNotFound(String),
    #[error("Command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("Failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("Unexpected output from `{command}`: {reason}")]
    BadOutput { command: String, reason: String },
    #[error("Unsupported platform")]
    UnsupportedPlatform,
}

/// A kernel routing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub destination: Ipv4Network,
    pub gateway: Option<Ipv4Addr>,
    /// Owning link, when known. Left unset on additions so the kernel picks
    /// the link from the gateway.
    pub link_index: Option<u32>,
}

impl Route {
    pub fn via(destination: Ipv4Network, gateway: Ipv4Addr) -> Self {
        Self {
            destination,
            gateway: Some(gateway),
            link_index: None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.destination)?;
        if let Some(gw) = self.gateway {
            write!(f, " via {}", gw)?;
        }
        if let Some(index) = self.link_index {
            write!(f, " link {}", index)?;
        }
        Ok(())
    }
}

/// A network interface as reported by the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub index: u32,
    pub name: String,
    pub mtu: u32,
    pub up: bool,
}

/// Address assigned to a tunnel interface, with an optional point-to-point peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelAddress {
    pub local: Ipv4Network,
    pub peer: Option<Ipv4Network>,
}

impl fmt::Display for TunnelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.local)?;
        if let Some(peer) = self.peer {
            write!(f, " peer {}", peer)?;
        }
        Ok(())
    }
}

/// Read and extend the kernel routing table
pub trait RouteTable {
    /// Candidate routes the kernel would use to reach `destination`.
    fn route_get(&self, destination: Ipv4Addr) -> Result<Vec<Route>, PlatformError>;
    /// Add a route. Fails with `AlreadyExists` when the prefix is taken.
    fn route_add(&self, route: &Route) -> Result<(), PlatformError>;
}

/// Inspect and configure network interfaces
pub trait LinkControl {
    fn link_by_name(&self, name: &str) -> Result<Link, PlatformError>;
    fn link_by_index(&self, index: u32) -> Result<Link, PlatformError>;
    fn set_mtu(&self, link: &Link, mtu: u32) -> Result<(), PlatformError>;
    fn set_up(&self, link: &Link) -> Result<(), PlatformError>;
    /// Add an address. Fails with `AlreadyExists` when it is already assigned.
    fn addr_add(&self, link: &Link, addr: &TunnelAddress) -> Result<(), PlatformError>;
    fn set_ipv4_forwarding(&self, enabled: bool) -> Result<(), PlatformError>;
}

/// Everything the setup components need from the kernel
pub trait NetworkControl: RouteTable + LinkControl {}

impl<T: RouteTable + LinkControl> NetworkControl for T {}

/// Locate and run external programs
pub trait CommandRunner {
    fn find_executable(&self, name: &str) -> Option<PathBuf>;
    /// Run `program` to completion and return its stdout.
    fn run(&self, program: &Path, args: &[String]) -> Result<String, PlatformError>;
}

/// Render a command line for logs and error messages
pub fn command_line(program: &Path, args: &[String]) -> String {
    std::iter::once(program.display().to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Get the network backend for the current platform
pub fn get_platform() -> Result<Box<dyn NetworkControl>, PlatformError> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(linux::LinuxPlatform::new(SystemCommandRunner::new())))
    }

    #[cfg(not(target_os = "linux"))]
    {
        Err(PlatformError::UnsupportedPlatform)
    }
}
