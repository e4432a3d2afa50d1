//! Tunnel interface bring-up and addressing

use super::error::tolerate_existing;
use super::resolve::{parse_cidr, resolve_host};
use super::SetupError;
use crate::platform::{LinkControl, TunnelAddress};
use ipnetwork::Ipv4Network;
use tracing::info;

pub const DEFAULT_MTU: u32 = 1500;

/// Set the MTU, then bring the link up.
///
/// The link is set up last so it is never observed up but half configured.
pub fn bring_up<L>(links: &L, link_name: &str, mtu: u32) -> Result<(), SetupError>
where
    L: LinkControl + ?Sized,
{
    let link = links.link_by_name(link_name)?;

    info!(link = %link.name, index = link.index, mtu, "Bringing link up");
    links.set_mtu(&link, mtu)?;
    links.set_up(&link)?;
    Ok(())
}

/// Assign `local_cidr` to the link, with `remote_addr` as point-to-point peer
/// when it is non-empty.
///
/// The server passes an empty peer: it talks to many clients, not one.
pub fn assign_address<L>(
    links: &L,
    link_name: &str,
    local_cidr: &str,
    remote_addr: &str,
) -> Result<(), SetupError>
where
    L: LinkControl + ?Sized,
{
    let link = links.link_by_name(link_name)?;
    let local = parse_cidr(local_cidr)?;

    let peer = if remote_addr.is_empty() {
        None
    } else {
        Some(Ipv4Network::from(resolve_host(remote_addr)?))
    };

    let addr = TunnelAddress { local, peer };
    info!(link = %link.name, %addr, "Assigning tunnel address");
    tolerate_existing(links.addr_add(&link, &addr), "tunnel address")
}
