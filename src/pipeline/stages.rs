//! Pipeline stages, in the order they normally run.

use std::net::IpAddr;

use tracing::debug;

use crate::collectors::{RawInventory, RawRecord};
use crate::domain::interface::{ClusterInfo, InterfaceInfo, InterfaceType, PlatformDetails};
use crate::error::{OwnerError, Result};

const HYPERV_VIRTUAL_ETHERNET: &str = "Hyper-V Virtual Ethernet";
const VIRTUAL_FUNCTION: &str = "Virtual Function";
const VMSMP_SERVICE: &str = "VMSMP";

fn from_raw(raw: &RawRecord, interface_type: InterfaceType) -> InterfaceInfo {
    InterfaceInfo {
        name: raw.name.clone(),
        pci_address: raw.pci_address,
        pci_device: raw.pci_device,
        mac_address: raw.mac_address.clone(),
        interface_type,
        installed: raw.installed,
        branding_string: raw.branding_string.clone(),
        driver: raw.driver.clone(),
        vlan_info: None,
        details: raw.details.clone(),
    }
}

fn is_controller(info: &InterfaceInfo) -> bool {
    info.name.is_none() && info.interface_type == InterfaceType::EthController
}

// ─── seed ───────────────────────────────────────────────────────

/// One record per OS-visible interface with a provisional type.
pub fn seed(_: Vec<InterfaceInfo>, inventory: &RawInventory) -> Result<Vec<InterfaceInfo>> {
    Ok(inventory
        .interfaces
        .iter()
        .map(|raw| {
            let branding = raw.branding_string.as_deref().unwrap_or_default();
            let sys_path = match &raw.details {
                PlatformDetails::Linux { sys_path, .. } => sys_path.as_deref().unwrap_or_default(),
                _ => "",
            };
            let interface_type = if raw.pci_address.is_some() {
                InterfaceType::Pf
            } else if branding.contains(HYPERV_VIRTUAL_ETHERNET) {
                InterfaceType::Vmnic
            } else if sys_path.contains("/devices/virtual/") {
                InterfaceType::VirtualDevice
            } else {
                InterfaceType::Generic
            };
            from_raw(raw, interface_type)
        })
        .collect())
}

// ─── merge_pci ──────────────────────────────────────────────────

fn same_function(info: &InterfaceInfo, function: &RawRecord) -> bool {
    let pnp = match &function.details {
        PlatformDetails::Windows { pnp_device_id, .. } => pnp_device_id.as_deref(),
        _ => None,
    };
    if let (Some(ours), Some(theirs)) = (info.pnp_device_id(), pnp) {
        return ours.eq_ignore_ascii_case(theirs);
    }
    function.pci_address.is_some() && info.pci_address == function.pci_address
}

/// Join the bus inventory onto the OS-visible records. The OS record wins;
/// functions nobody claims stay as name-less, not-installed controllers.
pub fn merge_pci(
    mut interfaces: Vec<InterfaceInfo>,
    inventory: &RawInventory,
) -> Result<Vec<InterfaceInfo>> {
    let mut controllers = Vec::new();
    for function in &inventory.pci_functions {
        let mut claimed = 0;
        for info in interfaces.iter_mut().filter(|i| same_function(i, function)) {
            claimed += 1;
            info.pci_address = info.pci_address.or(function.pci_address);
            info.pci_device = function.pci_device.or(info.pci_device);
            if info.branding_string.is_none() {
                info.branding_string = function.branding_string.clone();
            }
            if info.driver.is_none() {
                info.driver = function.driver.clone();
            }
            if info.interface_type == InterfaceType::Generic {
                info.interface_type = InterfaceType::Pf;
            }
        }
        // Two names on one function: keep the controller so vport_bts can tell
        // the representor apart.
        if claimed != 1 {
            let mut controller = from_raw(function, InterfaceType::EthController);
            controller.name = None;
            controller.installed = false;
            controllers.push(controller);
        }
    }
    interfaces.extend(controllers);
    Ok(interfaces)
}

// ─── vlan ───────────────────────────────────────────────────────

pub fn vlan(mut interfaces: Vec<InterfaceInfo>, inventory: &RawInventory) -> Result<Vec<InterfaceInfo>> {
    for info in &mut interfaces {
        let Some(vlan) = info.name.as_ref().and_then(|n| inventory.vlans.get(n)) else {
            continue;
        };
        info.interface_type = InterfaceType::Vlan;
        info.vlan_info = Some(vlan.clone());
    }
    Ok(interfaces)
}

// ─── vf ─────────────────────────────────────────────────────────

pub fn vf(mut interfaces: Vec<InterfaceInfo>, inventory: &RawInventory) -> Result<Vec<InterfaceInfo>> {
    for info in &mut interfaces {
        if info.interface_type == InterfaceType::Vlan {
            continue;
        }
        let listed = info
            .name
            .as_ref()
            .is_some_and(|n| inventory.virtual_functions.contains(n));
        let vmsmp = info.service_name() == Some(VMSMP_SERVICE);
        let branded = info
            .branding_string
            .as_deref()
            .is_some_and(|b| b.contains(VIRTUAL_FUNCTION));
        if listed || vmsmp || branded {
            info.interface_type = InterfaceType::Vf;
        }
    }
    Ok(interfaces)
}

// ─── bond ───────────────────────────────────────────────────────

pub fn bond(mut interfaces: Vec<InterfaceInfo>, inventory: &RawInventory) -> Result<Vec<InterfaceInfo>> {
    for info in &mut interfaces {
        let Some(name) = info.name.as_deref() else {
            continue;
        };
        let details = inventory.link_details.get(name).ok_or_else(|| {
            OwnerError::CorrelationFailure(format!("no link details for interface {}", name))
        })?;
        if inventory.bond_masters.contains(name) {
            info.interface_type = InterfaceType::Bond;
        } else if details.has_flag("SLAVE") || inventory.bond_slaves.contains(name) {
            info.interface_type = InterfaceType::BondSlave;
        } else if details.has_flag("MASTER") {
            info.interface_type = InterfaceType::Bond;
        }
    }
    Ok(interfaces)
}

// ─── vmbus ──────────────────────────────────────────────────────

pub fn vmbus(mut interfaces: Vec<InterfaceInfo>, _: &RawInventory) -> Result<Vec<InterfaceInfo>> {
    for info in &mut interfaces {
        if info
            .sys_path()
            .is_some_and(|p| p.to_ascii_lowercase().contains("vmbus"))
        {
            info.interface_type = InterfaceType::Vmbus;
        }
    }
    Ok(interfaces)
}

// ─── management ─────────────────────────────────────────────────

/// Marks the interface(s) carrying the automation connection's own address.
pub fn management(
    mut interfaces: Vec<InterfaceInfo>,
    inventory: &RawInventory,
) -> Result<Vec<InterfaceInfo>> {
    let Some(IpAddr::V4(source)) = inventory.source_ip else {
        return Ok(interfaces);
    };
    for info in &mut interfaces {
        let owns_source = info
            .name
            .as_ref()
            .and_then(|n| inventory.ipv4.get(n))
            .is_some_and(|addrs| addrs.contains(&source));
        if owns_source {
            debug!(interface = %info.label(), %source, "management interface");
            info.interface_type = InterfaceType::Management;
        }
    }
    Ok(interfaces)
}

// ─── vport_bts ──────────────────────────────────────────────────

/// VPORT: every named record after the first that shares a controller's
/// address and device id. BTS: a named record whose ethtool bus-info points
/// at another, unclaimed controller; it takes over that controller's identity.
pub fn vport_bts(
    mut interfaces: Vec<InterfaceInfo>,
    inventory: &RawInventory,
) -> Result<Vec<InterfaceInfo>> {
    let controllers: Vec<InterfaceInfo> = interfaces.iter().filter(|i| is_controller(i)).cloned().collect();

    for controller in &controllers {
        let mut sharing = interfaces.iter_mut().filter(|i| {
            i.name.is_some()
                && i.pci_address.is_some()
                && i.pci_address == controller.pci_address
                && i.pci_device == controller.pci_device
        });
        // The first name on the function is the port itself.
        sharing.next();
        for representor in sharing {
            representor.interface_type = InterfaceType::Vport;
        }
    }

    let mut consumed = Vec::new();
    for info in interfaces.iter_mut() {
        let Some(name) = info.name.as_deref() else {
            continue;
        };
        let Some(driver_info) = inventory.driver_info.get(name) else {
            continue;
        };
        let Some(bus) = driver_info.bus_info else {
            continue;
        };
        if info.pci_address == Some(bus) || consumed.contains(&bus) {
            continue;
        }
        let Some(controller) = controllers.iter().find(|c| {
            c.pci_address == Some(bus)
                && c.driver.as_deref().map_or(true, |d| d == driver_info.driver)
        }) else {
            continue;
        };
        debug!(interface = %name, bus = %bus, "BTS uplink");
        info.interface_type = InterfaceType::Bts;
        info.pci_address = Some(bus);
        info.pci_device = controller.pci_device;
        consumed.push(bus);
    }

    interfaces.retain(|i| !(is_controller(i) && i.pci_address.is_some_and(|a| consumed.contains(&a))));
    Ok(interfaces)
}

// ─── cluster ────────────────────────────────────────────────────

/// Rows cover every node of the cluster; only those named
/// `"<local node> - <interface>"` describe this host.
pub fn cluster(mut interfaces: Vec<InterfaceInfo>, inventory: &RawInventory) -> Result<Vec<InterfaceInfo>> {
    let Some(local_node) = inventory.local_node.as_deref() else {
        if !inventory.cluster_networks.is_empty() {
            debug!(
                rows = inventory.cluster_networks.len(),
                "local node unknown, skipping cluster rows"
            );
        }
        return Ok(interfaces);
    };
    for row in inventory
        .cluster_networks
        .iter()
        .filter(|r| r.is_on_node(local_node))
    {
        let role = row.role();
        let Some(info) = interfaces.iter_mut().find(|i| i.name() == Some(role)) else {
            continue;
        };
        match &mut info.details {
            PlatformDetails::Windows { cluster_info, .. } => {
                *cluster_info = Some(ClusterInfo {
                    network: row.network.clone(),
                    node: row.node.clone(),
                });
            }
            _ => {
                return Err(OwnerError::CorrelationFailure(format!(
                    "cluster row '{}' matched non-Windows interface {}",
                    row.name, role
                )))
            }
        }
        if role.contains("vSMB") {
            info.interface_type = InterfaceType::ClusterStorage;
        } else if role.contains("Management") {
            info.interface_type = InterfaceType::ClusterManagement;
        }
    }
    Ok(interfaces)
}

// ─── remove_tunnels ─────────────────────────────────────────────

pub fn remove_tunnels(
    mut interfaces: Vec<InterfaceInfo>,
    inventory: &RawInventory,
) -> Result<Vec<InterfaceInfo>> {
    interfaces.retain(|i| !i.name.as_ref().is_some_and(|n| inventory.tunnels.contains(n)));
    Ok(interfaces)
}
