//! In-memory host used by the unit tests

use super::{
    CommandRunner, Link, LinkControl, PlatformError, Route, RouteTable, TunnelAddress,
    command_line,
};
use ipnetwork::Ipv4Network;
use std::cell::RefCell;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// A capability call, in the order it was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RouteGet(Ipv4Addr),
    RouteAdd(Route),
    SetMtu(String, u32),
    SetUp(String),
    AddrAdd(String, TunnelAddress),
    SetForwarding(bool),
}

/// Fake kernel: one default gateway on one egress link, plus whatever
/// interfaces the test registers.
pub struct FakeNet {
    pub default_gateway: Option<Ipv4Addr>,
    pub egress_index: u32,
    /// Answer route queries with an on-link route (no next hop)
    pub directly_connected: bool,
    /// Answer route queries without an output link
    pub without_link: bool,
    links: RefCell<Vec<Link>>,
    routes: RefCell<Vec<Route>>,
    addrs: RefCell<Vec<(String, TunnelAddress)>>,
    calls: RefCell<Vec<Call>>,
    fail_route_add: RefCell<Option<Ipv4Network>>,
}

impl FakeNet {
    /// Host with `eth0` (index 2) reaching everything via `gateway`
    pub fn with_gateway(gateway: Ipv4Addr) -> Self {
        let net = Self {
            default_gateway: Some(gateway),
            egress_index: 2,
            directly_connected: false,
            without_link: false,
            links: RefCell::new(Vec::new()),
            routes: RefCell::new(Vec::new()),
            addrs: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            fail_route_add: RefCell::new(None),
        };
        net.add_link(2, "eth0");
        net
    }

    /// Host whose kernel answers every route query with nothing
    pub fn without_routes() -> Self {
        let mut net = Self::with_gateway(Ipv4Addr::UNSPECIFIED);
        net.default_gateway = None;
        net
    }

    pub fn add_link(&self, index: u32, name: &str) {
        self.links.borrow_mut().push(Link {
            index,
            name: name.to_string(),
            mtu: 1400,
            up: false,
        });
    }

    /// Make `route_add` for `destination` fail with a generic error
    pub fn fail_route_add(&self, destination: Ipv4Network) {
        *self.fail_route_add.borrow_mut() = Some(destination);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Calls that change host state
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::RouteGet(_)))
            .collect()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.routes.borrow().clone()
    }

    pub fn link(&self, name: &str) -> Option<Link> {
        self.links.borrow().iter().find(|l| l.name == name).cloned()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn update_link(&self, name: &str, f: impl FnOnce(&mut Link)) -> Result<(), PlatformError> {
        let mut links = self.links.borrow_mut();
        let link = links
            .iter_mut()
            .find(|l| l.name == name)
            .ok_or_else(|| PlatformError::LinkNotFound(name.to_string()))?;
        f(link);
        Ok(())
    }
}

impl RouteTable for FakeNet {
    fn route_get(&self, destination: Ipv4Addr) -> Result<Vec<Route>, PlatformError> {
        self.record(Call::RouteGet(destination));
        Ok(self
            .default_gateway
            .map(|gw| Route {
                destination: Ipv4Network::from(destination),
                gateway: (!self.directly_connected).then_some(gw),
                link_index: (!self.without_link).then_some(self.egress_index),
            })
            .into_iter()
            .collect())
    }

    fn route_add(&self, route: &Route) -> Result<(), PlatformError> {
        self.record(Call::RouteAdd(route.clone()));
        if *self.fail_route_add.borrow() == Some(route.destination) {
            return Err(PlatformError::CommandFailed {
                command: format!("route add {}", route),
                stderr: "Operation not permitted".to_string(),
            });
        }
        let mut routes = self.routes.borrow_mut();
        if routes.iter().any(|r| r.destination == route.destination) {
            return Err(PlatformError::AlreadyExists(route.to_string()));
        }
        routes.push(route.clone());
        Ok(())
    }
}

impl LinkControl for FakeNet {
    fn link_by_name(&self, name: &str) -> Result<Link, PlatformError> {
        self.link(name)
            .ok_or_else(|| PlatformError::LinkNotFound(name.to_string()))
    }

    fn link_by_index(&self, index: u32) -> Result<Link, PlatformError> {
        self.links
            .borrow()
            .iter()
            .find(|l| l.index == index)
            .cloned()
            .ok_or_else(|| PlatformError::LinkNotFound(format!("index {}", index)))
    }

    fn set_mtu(&self, link: &Link, mtu: u32) -> Result<(), PlatformError> {
        self.record(Call::SetMtu(link.name.clone(), mtu));
        self.update_link(&link.name, |l| l.mtu = mtu)
    }

    fn set_up(&self, link: &Link) -> Result<(), PlatformError> {
        self.record(Call::SetUp(link.name.clone()));
        self.update_link(&link.name, |l| l.up = true)
    }

    fn addr_add(&self, link: &Link, addr: &TunnelAddress) -> Result<(), PlatformError> {
        self.record(Call::AddrAdd(link.name.clone(), addr.clone()));
        let mut addrs = self.addrs.borrow_mut();
        let entry = (link.name.clone(), addr.clone());
        if addrs.contains(&entry) {
            return Err(PlatformError::AlreadyExists(addr.to_string()));
        }
        addrs.push(entry);
        Ok(())
    }

    fn set_ipv4_forwarding(&self, enabled: bool) -> Result<(), PlatformError> {
        self.record(Call::SetForwarding(enabled));
        Ok(())
    }
}

/// Records command lines instead of running anything
#[derive(Default)]
pub struct FakeRunner {
    executables: HashMap<String, PathBuf>,
    fail_at: Option<usize>,
    commands: RefCell<Vec<String>>,
}

impl FakeRunner {
    pub fn with_executable(name: &str, path: &str) -> Self {
        let mut runner = Self::default();
        runner
            .executables
            .insert(name.to_string(), PathBuf::from(path));
        runner
    }

    /// Fail the n-th invocation (zero based)
    pub fn failing_at(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl CommandRunner for FakeRunner {
    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        self.executables.get(name).cloned()
    }

    fn run(&self, program: &Path, args: &[String]) -> Result<String, PlatformError> {
        let command = command_line(program, args);
        let n = self.commands.borrow().len();
        self.commands.borrow_mut().push(command.clone());
        if self.fail_at == Some(n) {
            return Err(PlatformError::CommandFailed {
                command,
                stderr: "iptables: Permission denied (you must be root).".to_string(),
            });
        }
        Ok(String::new())
    }
}
