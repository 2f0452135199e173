//! Caller-facing handle on one discovered interface.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::interface::{InterfaceInfo, InterfaceType};
use super::pci::PciAddress;
use crate::collectors::linux::netns;
use crate::connection::Connection;
use crate::error::{OwnerError, Result};
use crate::parsers;
use crate::platform::Platform;

/// Snapshot of an interface plus the connection to the host it lives on.
/// The record is never refreshed; query the owner again for current state.
#[derive(Clone)]
pub struct NetworkInterface {
    info: InterfaceInfo,
    connection: Arc<dyn Connection>,
    platform: Platform,
}

impl NetworkInterface {
    pub fn new(info: InterfaceInfo, connection: Arc<dyn Connection>, platform: Platform) -> Self {
        Self {
            info,
            connection,
            platform,
        }
    }

    pub fn info(&self) -> &InterfaceInfo {
        &self.info
    }

    pub fn into_info(self) -> InterfaceInfo {
        self.info
    }

    pub fn name(&self) -> Option<&str> {
        self.info.name()
    }

    pub fn pci_address(&self) -> Option<PciAddress> {
        self.info.pci_address
    }

    pub fn interface_type(&self) -> InterfaceType {
        self.info.interface_type
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Interface counters. Only Linux exposes them through `ip -s link`.
    pub fn stats(&self) -> Result<BTreeMap<String, u64>> {
        if self.platform != Platform::Linux {
            return Err(OwnerError::UnsupportedOs(format!(
                "interface statistics are not available on {}",
                self.platform
            )));
        }
        let name = self
            .name()
            .ok_or_else(|| OwnerError::InterfaceNotFound(self.info.label()))?;
        let command = netns(&format!("ip -s link show dev {}", name), self.info.namespace());
        let result = self.connection.execute_command(&command, &[0])?;
        let stats = parsers::parse_ip_link_stats(&result.stdout);
        debug!(interface = name, counters = stats.len(), "read interface stats");
        Ok(stats)
    }
}

impl fmt::Debug for NetworkInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkInterface")
            .field("info", &self.info)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl PartialEq for NetworkInterface {
    fn eq(&self, other: &Self) -> bool {
        match (self.pci_address(), other.pci_address()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.name() == other.name(),
            _ => false,
        }
    }
}

/// Addressed interfaces order by PCI address; an unaddressed one is
/// incomparable with anything but itself.
impl PartialOrd for NetworkInterface {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.pci_address(), other.pci_address()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ if self == other => Some(Ordering::Equal),
            _ => None,
        }
    }
}

/// Sort by ascending PCI address, failing on the first interface without one.
pub fn sort_interfaces(interfaces: &mut [NetworkInterface]) -> Result<()> {
    if let Some(unaddressed) = interfaces.iter().find(|i| i.pci_address().is_none()) {
        return Err(OwnerError::Incomparable(unaddressed.info.label()));
    }
    interfaces.sort_by_key(|i| i.pci_address());
    Ok(())
}
