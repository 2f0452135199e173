use anyhow::{Context, Result};
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::query::LookupTables;

const DEFAULTS: &str = include_str!("../config/default.yaml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub linux: LinuxConfig,
    #[serde(default)]
    pub tables: LookupTables,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Host the commands run on. No `host` means the local machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub host: Option<IpAddr>,
    #[serde(default = "default_user")]
    pub user: String,
    /// Address management detection compares against for local runs.
    pub source_ip: Option<IpAddr>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: None,
            user: default_user(),
            source_ip: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxConfig {
    /// Network namespace every iproute2/ethtool/sysfs command runs in.
    pub namespace: Option<String>,
    /// `ip -d link` kinds dropped from discovery results. An empty list
    /// keeps tunnels.
    #[serde(default = "default_tunnel_kinds")]
    pub tunnel_kinds: Vec<String>,
}

impl Default for LinuxConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            tunnel_kinds: default_tunnel_kinds(),
        }
    }
}

/// Kept in step with `linux.tunnel_kinds` in the bundled defaults.
fn default_tunnel_kinds() -> Vec<String> {
    [
        "vxlan", "geneve", "gre", "gretap", "ip6gre", "ip6gretap", "ipip", "sit", "ip6tnl",
        "erspan",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_user() -> String {
    "root".to_string()
}

impl Config {
    pub fn path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(config_dir.join("nic-owner").join("config.yaml"))
    }

    /// Bundled defaults, then the user file (explicit path or the default
    /// location if present), then `NIC_OWNER_*` variables (`__` nests).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Yaml::string(DEFAULTS));

        match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("config file {} does not exist", path.display());
                }
                figment = figment.merge(Yaml::file(path));
            }
            None => {
                if let Ok(default_path) = Self::path() {
                    figment = figment.merge(Yaml::file(default_path));
                }
            }
        }

        figment
            .merge(Env::prefixed("NIC_OWNER_").split("__"))
            .extract()
            .context("loading nic-owner configuration")
    }
}
