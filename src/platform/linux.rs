//! Linux implementation on top of iproute2

use super::{
    CommandRunner, Link, LinkControl, PlatformError, Route, RouteTable, TunnelAddress,
};
use ipnetwork::Ipv4Network;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

const IP_COMMAND: &str = "ip";
const SYSCTL_COMMAND: &str = "sysctl";

/// `ip -j route get` entry
#[derive(Debug, Deserialize)]
struct RouteJson {
    dst: String,
    gateway: Option<String>,
    dev: Option<String>,
}

/// `ip -j link show` entry
#[derive(Debug, Deserialize)]
struct LinkJson {
    ifindex: u32,
    ifname: String,
    #[serde(default)]
    mtu: u32,
    #[serde(default)]
    flags: Vec<String>,
}

pub struct LinuxPlatform<R> {
    runner: R,
    ip: PathBuf,
    sysctl: PathBuf,
}

impl<R: CommandRunner> LinuxPlatform<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            ip: PathBuf::from(IP_COMMAND),
            sysctl: PathBuf::from(SYSCTL_COMMAND),
        }
    }

    fn ip(&self, args: &[&str]) -> Result<String, PlatformError> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.runner.run(&self.ip, &args).map_err(classify)
    }

    fn links(&self, args: &[&str]) -> Result<Vec<LinkJson>, PlatformError> {
        let out = self.ip(args)?;
        parse_json(&self.ip, args, &out)
    }
}

/// Map iproute2 failure messages onto the error kinds callers act on.
fn classify(err: PlatformError) -> PlatformError {
    match err {
        PlatformError::CommandFailed { command, stderr } => {
            if stderr.contains("File exists") {
                PlatformError::AlreadyExists(command)
            } else {
                PlatformError::CommandFailed { command, stderr }
            }
        }
        other => other,
    }
}

/// `Device "tun9" does not exist.` from a lookup of one link by name
fn is_missing_device(err: &PlatformError) -> bool {
    matches!(err, PlatformError::CommandFailed { stderr, .. }
        if stderr.contains("does not exist") || stderr.contains("Cannot find device"))
}

fn parse_json<T: DeserializeOwned>(
    program: &Path,
    args: &[&str],
    out: &str,
) -> Result<Vec<T>, PlatformError> {
    // `ip -j` prints nothing at all for an empty result set
    if out.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(out).map_err(|e| PlatformError::BadOutput {
        command: format!("{} {}", program.display(), args.join(" ")),
        reason: e.to_string(),
    })
}

fn parse_ipv4(field: &str, value: &str) -> Result<Ipv4Addr, PlatformError> {
    value.parse().map_err(|_| PlatformError::BadOutput {
        command: "ip route get".to_string(),
        reason: format!("invalid {} address: {}", field, value),
    })
}

impl From<LinkJson> for Link {
    fn from(link: LinkJson) -> Self {
        let up = link.flags.iter().any(|f| f == "UP");
        Link {
            index: link.ifindex,
            name: link.ifname,
            mtu: link.mtu,
            up,
        }
    }
}

impl<R: CommandRunner> RouteTable for LinuxPlatform<R> {
    fn route_get(&self, destination: Ipv4Addr) -> Result<Vec<Route>, PlatformError> {
        let dst = destination.to_string();
        let args = ["-4", "-j", "route", "get", dst.as_str()];
        let out = match self.ip(&args) {
            Ok(out) => out,
            // "Network is unreachable", or "No route to host" from a prohibit route
            Err(PlatformError::CommandFailed { stderr, .. })
                if stderr.contains("unreachable") || stderr.contains("No route to host") =>
            {
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let entries: Vec<RouteJson> = parse_json(&self.ip, &args, &out)?;
        let mut routes = Vec::with_capacity(entries.len());
        for entry in entries {
            let dst = parse_ipv4("destination", &entry.dst)?;
            let gateway = entry
                .gateway
                .as_deref()
                .map(|gw| parse_ipv4("gateway", gw))
                .transpose()?;
            let link_index = match entry.dev.as_deref() {
                Some(dev) => Some(self.link_by_name(dev)?.index),
                None => None,
            };
            routes.push(Route {
                destination: Ipv4Network::from(dst),
                gateway,
                link_index,
            });
        }
        Ok(routes)
    }

    fn route_add(&self, route: &Route) -> Result<(), PlatformError> {
        let dst = route.destination.to_string();
        let mut args = vec!["-4", "route", "add", dst.as_str()];
        let gw = route.gateway.map(|gw| gw.to_string());
        if let Some(ref gw) = gw {
            args.extend(["via", gw.as_str()]);
        }
        let dev = match route.link_index {
            Some(index) => Some(self.link_by_index(index)?.name),
            None => None,
        };
        if let Some(ref dev) = dev {
            args.extend(["dev", dev.as_str()]);
        }
        self.ip(&args).map(|_| ())
    }
}

impl<R: CommandRunner> LinkControl for LinuxPlatform<R> {
    fn link_by_name(&self, name: &str) -> Result<Link, PlatformError> {
        let links = match self.links(&["-j", "link", "show", "dev", name]) {
            Err(e) if is_missing_device(&e) => {
                return Err(PlatformError::LinkNotFound(name.to_string()));
            }
            other => other?,
        };
        links
            .into_iter()
            .next()
            .map(Link::from)
            .ok_or_else(|| PlatformError::LinkNotFound(name.to_string()))
    }

    fn link_by_index(&self, index: u32) -> Result<Link, PlatformError> {
        self.links(&["-j", "link", "show"])?
            .into_iter()
            .find(|l| l.ifindex == index)
            .map(Link::from)
            .ok_or_else(|| PlatformError::LinkNotFound(format!("index {}", index)))
    }

    fn set_mtu(&self, link: &Link, mtu: u32) -> Result<(), PlatformError> {
        let mtu = mtu.to_string();
        self.ip(&["link", "set", "dev", link.name.as_str(), "mtu", mtu.as_str()])
            .map(|_| ())
    }

    fn set_up(&self, link: &Link) -> Result<(), PlatformError> {
        self.ip(&["link", "set", "dev", link.name.as_str(), "up"]).map(|_| ())
    }

    fn addr_add(&self, link: &Link, addr: &TunnelAddress) -> Result<(), PlatformError> {
        let local = addr.local.to_string();
        let peer = addr.peer.map(|p| p.to_string());
        let mut args = vec!["-4", "addr", "add", local.as_str()];
        if let Some(ref peer) = peer {
            args.extend(["peer", peer.as_str()]);
        }
        args.extend(["dev", link.name.as_str()]);
        self.ip(&args).map(|_| ())
    }

    fn set_ipv4_forwarding(&self, enabled: bool) -> Result<(), PlatformError> {
        let setting = format!("net.ipv4.ip_forward={}", u8::from(enabled));
        self.runner
            .run(&self.sysctl, &["-w".to_string(), setting])
            .map(|_| ())
    }
}
