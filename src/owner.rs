//! Entry point for one managed host.

use std::sync::Arc;

use tracing::{debug, info};

use crate::collectors::{self, CollectContext};
use crate::config::LinuxConfig;
use crate::connection::Connection;
use crate::domain::interface::InterfaceInfo;
use crate::domain::network_interface::NetworkInterface;
use crate::error::{OwnerError, Result};
use crate::pipeline;
use crate::platform::{self, Platform};
use crate::query::{InterfaceQuery, LookupTables, QueryMode, ValidatedQuery};
use crate::tools::{BondingQuery, SysfsBonding};

/// Discovers and selects the network interfaces of one host.
///
/// Every call rediscovers from scratch; nothing is cached between calls.
pub struct Owner {
    connection: Arc<dyn Connection>,
    platform: Platform,
    tables: LookupTables,
    linux: LinuxConfig,
    bonding: Box<dyn BondingQuery>,
}

impl Owner {
    /// Asks the connection for the OS name once and picks the platform.
    pub fn new(connection: Arc<dyn Connection>, tables: LookupTables) -> Result<Self> {
        let os_name = connection.get_os_name()?;
        let platform = platform::detect(os_name)?;
        info!(os = %os_name, platform = %platform, "interface owner ready");
        Ok(Self {
            connection,
            platform,
            tables,
            linux: LinuxConfig::default(),
            bonding: Box::new(SysfsBonding),
        })
    }

    pub fn with_linux_config(mut self, linux: LinuxConfig) -> Self {
        self.linux = linux;
        self
    }

    pub fn with_bonding(mut self, bonding: Box<dyn BondingQuery>) -> Self {
        self.bonding = bonding;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn tables(&self) -> &LookupTables {
        &self.tables
    }

    /// The full canonical interface set, not-installed controllers included.
    pub fn discover(&self) -> Result<Vec<InterfaceInfo>> {
        let ctx = CollectContext {
            conn: self.connection.as_ref(),
            linux: &self.linux,
            bonding: self.bonding.as_ref(),
        };
        let inventory = collectors::collect(self.platform, &ctx)?;
        let interfaces = pipeline::run(self.platform, &inventory)?;
        info!(
            platform = %self.platform,
            interfaces = interfaces.len(),
            "discovery complete"
        );
        Ok(interfaces)
    }

    fn resolve(&self, query: &ValidatedQuery) -> Result<Vec<NetworkInterface>> {
        let filtered = query.filter(self.discover()?, &self.tables)?;
        debug!(candidates = filtered.len(), selection = ?query.selection, "query filtered");
        Ok(query
            .select(filtered)?
            .into_iter()
            .map(|info| NetworkInterface::new(info, Arc::clone(&self.connection), self.platform))
            .collect())
    }

    /// Interfaces matching `query`; all matches unless a cardinality option
    /// says otherwise.
    pub fn get_interfaces(&self, query: &InterfaceQuery) -> Result<Vec<NetworkInterface>> {
        let validated = query.validate(QueryMode::Multiple)?;
        self.resolve(&validated)
    }

    /// One interface matching `query`; the first match by default.
    pub fn get_interface(&self, query: &InterfaceQuery) -> Result<NetworkInterface> {
        let validated = query.validate(QueryMode::Single)?;
        self.resolve(&validated)?
            .into_iter()
            .next()
            .ok_or_else(|| OwnerError::InterfaceNotFound("no interface selected".to_string()))
    }
}
