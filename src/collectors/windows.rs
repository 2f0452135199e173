//! Windows inventory through PowerShell/WMI.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use super::{ClusterNetworkRow, CollectContext, RawInventory, RawRecord};
use crate::domain::interface::{PlatformDetails, VlanInfo};
use crate::domain::pci::{PciAddress, PciDevice};
use crate::error::Result;
use crate::parsers::{self, Fields};

pub const ADAPTERS: &str = "Get-CimInstance -ClassName Win32_NetworkAdapter | Where-Object { $_.PNPDeviceID } | Format-List NetConnectionID,Name,PNPDeviceID,MACAddress,ServiceName,Index,Installed";
pub const PNP_DEVICES: &str = "Get-CimInstance -ClassName Win32_PnPSignedDriver -Filter \"DeviceClass='NET'\" | Format-List DeviceID,Location";
pub const VLANS: &str = "if (Get-Command Get-IntelNetVLAN -ErrorAction SilentlyContinue) { Get-IntelNetVLAN | Format-List ParentName,VLANID,VLANName }";
pub const CLUSTER_INTERFACES: &str = "if (Get-Command Get-ClusterNetworkInterface -ErrorAction SilentlyContinue) { Get-ClusterNetworkInterface | Format-List Name,Network,Node }";
pub const COMPUTER_NAME: &str = "$env:COMPUTERNAME";
pub const IPV4: &str = "Get-NetIPAddress -AddressFamily IPv4 | Format-List InterfaceAlias,IPAddress";

lazy_static! {
    static ref PNP_ID_RE: Regex = Regex::new(
        r"(?i)^PCI\\VEN_([0-9A-F]{4})&DEV_([0-9A-F]{4})(?:&SUBSYS_([0-9A-F]{4})([0-9A-F]{4}))?"
    )
    .unwrap();
}

/// PCI identity encoded in a PnP device id:
/// `PCI\VEN_8086&DEV_1572&SUBSYS_00018086&REV_01\...`. SUBSYS is the
/// subsystem device id followed by the subsystem vendor id.
pub fn pci_device_from_pnp_id(pnp_device_id: &str) -> Option<PciDevice> {
    let caps = PNP_ID_RE.captures(pnp_device_id)?;
    let hex = |i: usize| caps.get(i).and_then(|m| u16::from_str_radix(m.as_str(), 16).ok());
    let device = PciDevice::new(hex(1)?, hex(2)?);
    Some(match (hex(4), hex(3)) {
        (Some(sub_vendor), Some(sub_device)) => device.with_subsystem(sub_vendor, sub_device),
        _ => device,
    })
}

fn non_empty(fields: &Fields, key: &str) -> Option<String> {
    fields
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn parse_adapters(text: &str) -> Vec<RawRecord> {
    parsers::parse_property_blocks(text)
        .into_iter()
        .map(|block| {
            let name = non_empty(&block, "NetConnectionID");
            RawRecord {
                installed: block
                    .get("Installed")
                    .map(|v| v.eq_ignore_ascii_case("true"))
                    .unwrap_or(true),
                name,
                pci_address: None,
                pci_device: None,
                mac_address: non_empty(&block, "MACAddress"),
                branding_string: non_empty(&block, "Name"),
                driver: None,
                details: PlatformDetails::Windows {
                    pnp_device_id: non_empty(&block, "PNPDeviceID"),
                    index: block.get("Index").and_then(|v| v.trim().parse().ok()),
                    service_name: non_empty(&block, "ServiceName"),
                    cluster_info: None,
                },
            }
        })
        .collect()
}

/// PCI-backed PnP network devices with their bus location.
pub fn parse_pnp_devices(text: &str) -> Vec<RawRecord> {
    parsers::parse_property_blocks(text)
        .into_iter()
        .filter_map(|block| {
            let pnp_id = non_empty(&block, "DeviceID")?;
            let device = pci_device_from_pnp_id(&pnp_id)?;
            let location = block.get("Location")?;
            let address = match PciAddress::from_windows_location(location) {
                Ok(addr) => addr,
                Err(e) => {
                    warn!(error = %e, pnp_id = %pnp_id, "skipping PnP device");
                    return None;
                }
            };
            let mut record = RawRecord::pci_function(address, Some(device));
            record.details = PlatformDetails::Windows {
                pnp_device_id: Some(pnp_id),
                index: None,
                service_name: None,
                cluster_info: None,
            };
            Some(record)
        })
        .collect()
}

/// Intel VLAN table keyed by the VLAN adapter's connection name. Parent
/// branding strings are resolved to connection names where possible.
pub fn parse_vlans(text: &str, adapters: &[RawRecord]) -> BTreeMap<String, VlanInfo> {
    let mut vlans = BTreeMap::new();
    for block in parsers::parse_property_blocks(text) {
        let (Some(vlan_name), Some(vlan_id)) = (
            non_empty(&block, "VLANName"),
            block.get("VLANID").and_then(|v| v.trim().parse::<u16>().ok()),
        ) else {
            continue;
        };
        let suffix = format!("VLAN : {}", vlan_name);
        let adapter_name = adapters
            .iter()
            .find(|a| {
                a.name.as_deref() == Some(vlan_name.as_str())
                    || a.branding_string
                        .as_deref()
                        .is_some_and(|b| b.ends_with(&suffix))
            })
            .and_then(|a| a.name.clone())
            .unwrap_or_else(|| vlan_name.clone());
        let parent_raw = non_empty(&block, "ParentName").unwrap_or_default();
        let parent = adapters
            .iter()
            .find(|a| a.branding_string.as_deref() == Some(parent_raw.as_str()))
            .and_then(|a| a.name.clone())
            .unwrap_or(parent_raw);
        vlans.insert(
            adapter_name,
            VlanInfo {
                parent,
                vlan_id,
                proto: None,
            },
        );
    }
    vlans
}

pub fn parse_cluster_interfaces(text: &str) -> Vec<ClusterNetworkRow> {
    parsers::parse_property_blocks(text)
        .into_iter()
        .filter_map(|block| {
            Some(ClusterNetworkRow {
                name: non_empty(&block, "Name")?,
                network: non_empty(&block, "Network")?,
                node: non_empty(&block, "Node"),
            })
        })
        .collect()
}

pub fn parse_ipv4(text: &str) -> BTreeMap<String, Vec<Ipv4Addr>> {
    let mut addresses: BTreeMap<String, Vec<Ipv4Addr>> = BTreeMap::new();
    for block in parsers::parse_property_blocks(text) {
        let (Some(alias), Some(ip)) = (
            non_empty(&block, "InterfaceAlias"),
            block.get("IPAddress").and_then(|v| v.trim().parse::<Ipv4Addr>().ok()),
        ) else {
            continue;
        };
        addresses.entry(alias).or_default().push(ip);
    }
    addresses
}

pub fn collect(ctx: &CollectContext<'_>) -> Result<RawInventory> {
    let conn = ctx.conn;
    let adapters = conn.execute_powershell(ADAPTERS, &[0])?;
    let pnp = conn.execute_powershell(PNP_DEVICES, &[0])?;
    let vlans = conn.execute_powershell(VLANS, &[0])?;
    let cluster = conn.execute_powershell(CLUSTER_INTERFACES, &[0])?;
    let ipv4 = conn.execute_powershell(IPV4, &[0])?;
    let computer_name = conn.execute_powershell(COMPUTER_NAME, &[0])?;

    let interfaces = parse_adapters(&adapters.stdout);
    Ok(RawInventory {
        vlans: parse_vlans(&vlans.stdout, &interfaces),
        pci_functions: parse_pnp_devices(&pnp.stdout),
        cluster_networks: parse_cluster_interfaces(&cluster.stdout),
        ipv4: parse_ipv4(&ipv4.stdout),
        local_node: Some(computer_name.stdout.trim().to_string()).filter(|n| !n.is_empty()),
        interfaces,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pnp_id_with_subsystem() {
        let dev = pci_device_from_pnp_id(r"PCI\VEN_8086&DEV_1572&SUBSYS_00078086&REV_02\6&2A5B6C7D&0&00000008")
            .unwrap();
        assert_eq!(dev, PciDevice::new(0x8086, 0x1572).with_subsystem(0x8086, 0x0007));
    }

    #[test]
    fn test_pnp_id_non_pci() {
        assert_eq!(pci_device_from_pnp_id(r"ROOT\VMS_MP\0000"), None);
        assert_eq!(
            pci_device_from_pnp_id(r"PCI\VEN_8086&DEV_1889"),
            Some(PciDevice::new(0x8086, 0x1889))
        );
    }

    #[test]
    fn test_parse_adapters() {
        let text = "\
NetConnectionID : Ethernet 2
Name            : Intel(R) Ethernet Controller X710 for 10GbE SFP+
PNPDeviceID     : PCI\\VEN_8086&DEV_1572&SUBSYS_00078086&REV_02\\6&2A5B6C7D&0&00000008
MACAddress      : 3C:FD:FE:AA:BB:01
ServiceName     : i40ea
Index           : 7
Installed       : True

NetConnectionID :
Name            : Intel(R) Ethernet Controller X710 for 10GbE SFP+ #2
PNPDeviceID     : PCI\\VEN_8086&DEV_1572&SUBSYS_00078086&REV_02\\6&2A5B6C7D&0&01000008
MACAddress      :
ServiceName     : i40ea
Index           : 8
Installed       : True
";
        let adapters = parse_adapters(text);
        assert_eq!(adapters.len(), 2);
        assert_eq!(adapters[0].name.as_deref(), Some("Ethernet 2"));
        assert_eq!(adapters[0].mac_address.as_deref(), Some("3C:FD:FE:AA:BB:01"));
        match &adapters[0].details {
            PlatformDetails::Windows { index, service_name, .. } => {
                assert_eq!(*index, Some(7));
                assert_eq!(service_name.as_deref(), Some("i40ea"));
            }
            other => panic!("unexpected details {:?}", other),
        }
        assert_eq!(adapters[1].name, None);
        assert_eq!(adapters[1].mac_address, None);
    }

    #[test]
    fn test_parse_vlans_resolves_names() {
        let mut parent = RawRecord::named("Ethernet 2");
        parent.branding_string = Some("Intel(R) Ethernet Controller X710".to_string());
        let mut child = RawRecord::named("Ethernet 5");
        child.branding_string = Some("Intel(R) Ethernet Controller X710 - VLAN : VLAN10".to_string());
        let text = "ParentName : Intel(R) Ethernet Controller X710\nVLANID     : 10\nVLANName   : VLAN10\n";

        let vlans = parse_vlans(text, &[parent, child]);
        let vlan = &vlans["Ethernet 5"];
        assert_eq!(vlan.parent, "Ethernet 2");
        assert_eq!(vlan.vlan_id, 10);
    }

    #[test]
    fn test_parse_pnp_devices_location() {
        let text = "\
DeviceID : PCI\\VEN_8086&DEV_1572&SUBSYS_00078086&REV_02\\6&2A5B6C7D&0&00000008
Location : PCI bus 24, device 0, function 0

DeviceID : ROOT\\VMS_MP\\0001
Location :
";
        let records = parse_pnp_devices(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pci_address, Some(PciAddress::new(0, 24, 0, 0)));
        assert!(!records[0].installed);
    }
}
