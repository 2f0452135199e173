//! Per-platform raw inventory collection.
//!
//! Collectors only run commands and parse their output. Deciding what an
//! interface *is* happens later, in the pipeline.

pub mod esxi;
pub mod freebsd;
pub mod linux;
pub mod windows;

use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr};

use tracing::info;

use crate::config::LinuxConfig;
use crate::connection::Connection;
use crate::domain::interface::{PlatformDetails, VlanInfo};
use crate::domain::pci::{PciAddress, PciDevice};
use crate::error::Result;
use crate::platform::Platform;
use crate::tools::{BondingQuery, DriverInfo};

/// One device record as a single source reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub name: Option<String>,
    pub pci_address: Option<PciAddress>,
    pub pci_device: Option<PciDevice>,
    pub mac_address: Option<String>,
    pub branding_string: Option<String>,
    pub driver: Option<String>,
    pub installed: bool,
    pub details: PlatformDetails,
}

impl RawRecord {
    /// A record the OS exposes under a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            pci_address: None,
            pci_device: None,
            mac_address: None,
            branding_string: None,
            driver: None,
            installed: true,
            details: PlatformDetails::Generic,
        }
    }

    /// A PCI function as the bus inventory reports it, not yet bound to a name.
    pub fn pci_function(address: PciAddress, device: Option<PciDevice>) -> Self {
        Self {
            name: None,
            pci_address: Some(address),
            pci_device: device,
            mac_address: None,
            branding_string: None,
            driver: None,
            installed: false,
            details: PlatformDetails::Generic,
        }
    }
}

/// Flags and relations from the link dump (`ip link` / `ifconfig`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkDetails {
    pub flags: BTreeSet<String>,
    pub master: Option<String>,
    /// Link kind from the detailed dump (`vlan`, `bond`, `vxlan`...).
    pub kind: Option<String>,
}

impl LinkDetails {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }
}

/// One row of the Windows cluster network interface table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNetworkRow {
    /// `<node> - <role>`
    pub name: String,
    pub network: String,
    pub node: Option<String>,
}

impl ClusterNetworkRow {
    /// The part after `<node> - `.
    pub fn role(&self) -> &str {
        self.name
            .split_once(" - ")
            .map(|(_, role)| role.trim())
            .unwrap_or(self.name.as_str())
    }

    /// The `<node>` part of the name; `None` when the name has no node prefix.
    pub fn node_name(&self) -> Option<&str> {
        self.name.split_once(" - ").map(|(node, _)| node.trim())
    }

    /// Whether this row describes an interface of `node`.
    pub fn is_on_node(&self, node: &str) -> bool {
        self.node_name().is_some_and(|n| n.eq_ignore_ascii_case(node))
    }
}

/// Everything one discovery pass read from the host.
#[derive(Debug, Clone, Default)]
pub struct RawInventory {
    /// Records the OS exposes by name; the seed of the pipeline.
    pub interfaces: Vec<RawRecord>,
    /// PCI functions from the bus inventory.
    pub pci_functions: Vec<RawRecord>,
    pub link_details: BTreeMap<String, LinkDetails>,
    pub vlans: BTreeMap<String, VlanInfo>,
    pub virtual_functions: BTreeSet<String>,
    pub bond_masters: BTreeSet<String>,
    pub bond_slaves: BTreeSet<String>,
    pub ipv4: BTreeMap<String, Vec<Ipv4Addr>>,
    pub driver_info: BTreeMap<String, DriverInfo>,
    /// Rows for every node of the cluster, not only this host.
    pub cluster_networks: Vec<ClusterNetworkRow>,
    /// Cluster node name of this host (Windows).
    pub local_node: Option<String>,
    pub tunnels: BTreeSet<String>,
    pub source_ip: Option<IpAddr>,
}

pub struct CollectContext<'a> {
    pub conn: &'a dyn Connection,
    pub linux: &'a LinuxConfig,
    pub bonding: &'a dyn BondingQuery,
}

pub fn collect(platform: Platform, ctx: &CollectContext<'_>) -> Result<RawInventory> {
    let mut inventory = match platform {
        Platform::Linux => linux::collect(ctx)?,
        Platform::Windows => windows::collect(ctx)?,
        Platform::Esxi => esxi::collect(ctx)?,
        Platform::FreeBsd => freebsd::collect(ctx)?,
    };
    inventory.source_ip = ctx.conn.source_ip();

    info!(
        platform = %platform,
        interfaces = inventory.interfaces.len(),
        pci_functions = inventory.pci_functions.len(),
        "raw inventory collected"
    );
    Ok(inventory)
}
