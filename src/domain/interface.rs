//! Canonical interface record produced by the discovery pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::pci::{PciAddress, PciDevice};

/// Role of an interface on the host. Exactly one per record once the
/// pipeline has run; later stages overwrite earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterfaceType {
    Pf,
    Vf,
    Vlan,
    Bond,
    BondSlave,
    VirtualDevice,
    Vmbus,
    Management,
    EthController,
    Generic,
    Vmnic,
    Vport,
    Bts,
    ClusterStorage,
    ClusterManagement,
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InterfaceType::Pf => "PF",
            InterfaceType::Vf => "VF",
            InterfaceType::Vlan => "VLAN",
            InterfaceType::Bond => "BOND",
            InterfaceType::BondSlave => "BOND_SLAVE",
            InterfaceType::VirtualDevice => "VIRTUAL_DEVICE",
            InterfaceType::Vmbus => "VMBUS",
            InterfaceType::Management => "MANAGEMENT",
            InterfaceType::EthController => "ETH_CONTROLLER",
            InterfaceType::Generic => "GENERIC",
            InterfaceType::Vmnic => "VMNIC",
            InterfaceType::Vport => "VPORT",
            InterfaceType::Bts => "BTS",
            InterfaceType::ClusterStorage => "CLUSTER_STORAGE",
            InterfaceType::ClusterManagement => "CLUSTER_MANAGEMENT",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanInfo {
    pub parent: String,
    pub vlan_id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proto: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub network: String,
    pub node: Option<String>,
}

/// Platform specific part of an interface record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum PlatformDetails {
    #[default]
    Generic,
    Linux {
        namespace: Option<String>,
        /// Target of the `/sys/class/net/<name>` symlink.
        sys_path: Option<String>,
    },
    Windows {
        pnp_device_id: Option<String>,
        index: Option<u32>,
        service_name: Option<String>,
        cluster_info: Option<ClusterInfo>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    pub name: Option<String>,
    pub pci_address: Option<PciAddress>,
    pub pci_device: Option<PciDevice>,
    pub mac_address: Option<String>,
    pub interface_type: InterfaceType,
    pub installed: bool,
    pub branding_string: Option<String>,
    pub driver: Option<String>,
    pub vlan_info: Option<VlanInfo>,
    pub details: PlatformDetails,
}

impl InterfaceInfo {
    pub fn new(name: Option<String>, interface_type: InterfaceType) -> Self {
        Self {
            name,
            pci_address: None,
            pci_device: None,
            mac_address: None,
            interface_type,
            installed: true,
            branding_string: None,
            driver: None,
            vlan_info: None,
            details: PlatformDetails::Generic,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name for log and error messages; falls back to the PCI address.
    pub fn label(&self) -> String {
        match (&self.name, &self.pci_address) {
            (Some(name), _) => name.clone(),
            (None, Some(addr)) => addr.to_string(),
            (None, None) => "<unnamed>".to_string(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        match &self.details {
            PlatformDetails::Linux { namespace, .. } => namespace.as_deref(),
            _ => None,
        }
    }

    pub fn sys_path(&self) -> Option<&str> {
        match &self.details {
            PlatformDetails::Linux { sys_path, .. } => sys_path.as_deref(),
            _ => None,
        }
    }

    pub fn service_name(&self) -> Option<&str> {
        match &self.details {
            PlatformDetails::Windows { service_name, .. } => service_name.as_deref(),
            _ => None,
        }
    }

    pub fn pnp_device_id(&self) -> Option<&str> {
        match &self.details {
            PlatformDetails::Windows { pnp_device_id, .. } => pnp_device_id.as_deref(),
            _ => None,
        }
    }

    pub fn cluster_info(&self) -> Option<&ClusterInfo> {
        match &self.details {
            PlatformDetails::Windows { cluster_info, .. } => cluster_info.as_ref(),
            _ => None,
        }
    }

    /// Named, installed records are what callers can select.
    pub fn is_selectable(&self) -> bool {
        self.installed && self.name.is_some()
    }
}
