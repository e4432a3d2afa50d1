//! NAT and forwarding rules for the server role
//!
//! Tunnel clients reach the internet through the host: traffic in and out of
//! the tunnel interface is accepted, and traffic leaving through the egress
//! link is masqueraded. Rules are applied with one `iptables` invocation each,
//! strictly in order, waiting for every invocation to finish.

use super::routing::RouteInspector;
use super::SetupError;
use crate::platform::{CommandRunner, LinkControl, RouteTable, command_line};
use std::fmt;
use tracing::info;

pub const DEFAULT_FIREWALL_TOOL: &str = "iptables";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Filter,
    Nat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    Forward,
    Input,
    Postrouting,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Chain::Forward => "FORWARD",
            Chain::Input => "INPUT",
            Chain::Postrouting => "POSTROUTING",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    InInterface(String),
    OutInterface(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Accept,
    Masquerade,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Target::Accept => "ACCEPT",
            Target::Masquerade => "MASQUERADE",
        })
    }
}

/// One rule-table operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirewallRule {
    Flush(Table),
    Insert {
        table: Table,
        chain: Chain,
        matcher: Match,
        target: Target,
    },
}

impl FirewallRule {
    fn insert(table: Table, chain: Chain, matcher: Match, target: Target) -> Self {
        FirewallRule::Insert {
            table,
            chain,
            matcher,
            target,
        }
    }

    /// Arguments for the rule tool
    pub fn args(&self) -> Vec<String> {
        match self {
            FirewallRule::Flush(Table::Filter) => vec!["-F".to_string()],
            FirewallRule::Flush(Table::Nat) => {
                vec!["-F".to_string(), "-t".to_string(), "nat".to_string()]
            }
            FirewallRule::Insert {
                table,
                chain,
                matcher,
                target,
            } => {
                let mut args = Vec::with_capacity(8);
                if *table == Table::Nat {
                    args.push("-t".to_string());
                    args.push("nat".to_string());
                }
                let (flag, iface) = match matcher {
                    Match::InInterface(iface) => ("-i", iface),
                    Match::OutInterface(iface) => ("-o", iface),
                };
                args.push("-I".to_string());
                args.push(chain.to_string());
                args.push(flag.to_string());
                args.push(iface.clone());
                args.push("-j".to_string());
                args.push(target.to_string());
                args
            }
        }
    }
}

/// The rule set letting `tunnel_link` clients out through `egress_link`, in
/// the order it must be applied.
pub fn nat_rules(tunnel_link: &str, egress_link: &str) -> Vec<FirewallRule> {
    use FirewallRule::Flush;
    vec![
        Flush(Table::Filter),
        Flush(Table::Nat),
        FirewallRule::insert(
            Table::Filter,
            Chain::Forward,
            Match::InInterface(tunnel_link.to_string()),
            Target::Accept,
        ),
        FirewallRule::insert(
            Table::Filter,
            Chain::Forward,
            Match::OutInterface(tunnel_link.to_string()),
            Target::Accept,
        ),
        FirewallRule::insert(
            Table::Filter,
            Chain::Input,
            Match::InInterface(tunnel_link.to_string()),
            Target::Accept,
        ),
        FirewallRule::insert(
            Table::Nat,
            Chain::Postrouting,
            Match::OutInterface(egress_link.to_string()),
            Target::Masquerade,
        ),
    ]
}

/// Flush the filter and NAT tables and install forwarding and masquerade
/// rules for `tunnel_link`.
pub fn configure_nat<N>(
    net: &N,
    runner: &dyn CommandRunner,
    tool: &str,
    probe_addr: &str,
    tunnel_link: &str,
) -> Result<(), SetupError>
where
    N: RouteTable + LinkControl + ?Sized,
{
    let program = runner
        .find_executable(tool)
        .ok_or_else(|| SetupError::ExecutableNotFound {
            name: tool.to_string(),
        })?;

    let index = RouteInspector::with_probe(net, probe_addr).default_link_index()?;
    let egress = net.link_by_index(index)?;
    info!(tunnel = tunnel_link, egress = %egress.name, "Configuring NAT");

    for rule in nat_rules(tunnel_link, &egress.name) {
        let args = rule.args();
        info!(command = %command_line(&program, &args), "running command");
        runner
            .run(&program, &args)
            .map_err(|source| SetupError::ExternalCommand {
                tool: tool.to_string(),
                source,
            })?;
    }
    Ok(())
}
