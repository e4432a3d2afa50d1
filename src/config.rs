//! Configuration handling for tunnel setup

use crate::vpn::firewall::DEFAULT_FIREWALL_TOOL;
use crate::vpn::interface::DEFAULT_MTU;
use crate::vpn::routing::DEFAULT_PROBE_ADDR;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const CONFIG_FILE_NAME: &str = "tunsetup.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Missing [{section}] settings: {}", fields.join(", "))]
    Incomplete {
        section: &'static str,
        fields: Vec<&'static str>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub setup: SetupSettings,
    pub client: Option<ClientConfig>,
    pub server: Option<ServerConfig>,
}

/// Knobs shared by both roles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupSettings {
    pub mtu: u32,
    /// `host:port` whose route identifies the internet-facing link
    pub probe_addr: String,
    pub firewall_tool: String,
    pub enable_ip_forward: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Transport address of the server, `host:port`
    pub server_addr: String,
    pub interface: String,
    /// Local tunnel address, `a.b.c.d/n`
    pub tunnel_cidr: String,
    /// Server's tunnel address; peer address and route gateway
    pub gateway: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub interface: String,
    pub tunnel_cidr: String,
}

impl Default for SetupSettings {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            probe_addr: DEFAULT_PROBE_ADDR.to_string(),
            firewall_tool: DEFAULT_FIREWALL_TOOL.to_string(),
            enable_ip_forward: false,
        }
    }
}

impl ClientConfig {
    /// Fails unless every field needed to touch the host is set.
    pub fn check(&self) -> Result<(), ConfigError> {
        let fields: Vec<&'static str> = [
            ("server_addr", &self.server_addr),
            ("interface", &self.interface),
            ("tunnel_cidr", &self.tunnel_cidr),
            ("gateway", &self.gateway),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();
        incomplete("client", fields)
    }
}

impl ServerConfig {
    pub fn check(&self) -> Result<(), ConfigError> {
        let fields: Vec<&'static str> = [
            ("interface", &self.interface),
            ("tunnel_cidr", &self.tunnel_cidr),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();
        incomplete("server", fields)
    }
}

fn incomplete(section: &'static str, fields: Vec<&'static str>) -> Result<(), ConfigError> {
    if fields.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Incomplete { section, fields })
    }
}

impl Config {
    /// Sample written by `tunsetup init`. Documentation addresses only; never
    /// used as a fallback.
    pub fn template() -> Self {
        Self {
            setup: SetupSettings::default(),
            client: Some(ClientConfig {
                server_addr: "203.0.113.5:443".to_string(),
                interface: "tun0".to_string(),
                tunnel_cidr: "10.8.0.2/24".to_string(),
                gateway: "10.8.0.1".to_string(),
            }),
            server: Some(ServerConfig {
                interface: "tun0".to_string(),
                tunnel_cidr: "10.8.0.1/24".to_string(),
            }),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from `explicit`, else `./tunsetup.toml`, else the user config
    /// directory, else defaults with no client or server section.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::discover_in(explicit, &default_locations())
    }

    fn discover_in(explicit: Option<&Path>, candidates: &[PathBuf]) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            info!("Loading config from {}", path.display());
            return Self::load(path);
        }

        for path in candidates {
            if path.exists() {
                info!("Loading config from {}", path.display());
                return Self::load(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Config::default())
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("tunsetup").join("config.toml"));
    }
    paths
}
