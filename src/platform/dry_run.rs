//! Dry-run wrapper: queries go to the real host, mutations are only logged

use super::{
    CommandRunner, Link, LinkControl, PlatformError, Route, RouteTable, TunnelAddress,
    command_line,
};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct DryRun<T>(pub T);

impl<T: RouteTable + ?Sized> RouteTable for DryRun<Box<T>> {
    fn route_get(&self, destination: Ipv4Addr) -> Result<Vec<Route>, PlatformError> {
        self.0.route_get(destination)
    }

    fn route_add(&self, route: &Route) -> Result<(), PlatformError> {
        info!(%route, "dry run: would add route");
        Ok(())
    }
}

impl<T: LinkControl + ?Sized> LinkControl for DryRun<Box<T>> {
    fn link_by_name(&self, name: &str) -> Result<Link, PlatformError> {
        self.0.link_by_name(name)
    }

    fn link_by_index(&self, index: u32) -> Result<Link, PlatformError> {
        self.0.link_by_index(index)
    }

    fn set_mtu(&self, link: &Link, mtu: u32) -> Result<(), PlatformError> {
        info!(link = %link.name, mtu, "dry run: would set mtu");
        Ok(())
    }

    fn set_up(&self, link: &Link) -> Result<(), PlatformError> {
        info!(link = %link.name, "dry run: would set link up");
        Ok(())
    }

    fn addr_add(&self, link: &Link, addr: &TunnelAddress) -> Result<(), PlatformError> {
        info!(link = %link.name, %addr, "dry run: would add address");
        Ok(())
    }

    fn set_ipv4_forwarding(&self, enabled: bool) -> Result<(), PlatformError> {
        info!(enabled, "dry run: would set net.ipv4.ip_forward");
        Ok(())
    }
}

impl<T: CommandRunner + ?Sized> CommandRunner for DryRun<Box<T>> {
    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        self.0.find_executable(name)
    }

    fn run(&self, program: &Path, args: &[String]) -> Result<String, PlatformError> {
        info!(command = %command_line(program, args), "dry run: would run");
        Ok(String::new())
    }
}
