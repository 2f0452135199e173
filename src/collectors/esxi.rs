//! ESXi inventory: `lspci` for the bus, `esxcfg-nics` for vmnics.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use super::{CollectContext, RawInventory, RawRecord};
use crate::domain::pci::{PciAddress, PciDevice};
use crate::error::Result;
use crate::parsers;

pub const LSPCI_IDS: &str = "lspci -n";
pub const LSPCI_PASSTHROUGH: &str = "lspci -p";
pub const NICS: &str = "esxcfg-nics -l";

const NIC_COLUMNS: &[&str] = &[
    "Name",
    "PCI",
    "Driver",
    "Link",
    "Speed",
    "Duplex",
    "MAC Address",
    "MTU",
    "Description",
];

lazy_static! {
    static ref LSPCI_ID_RE: Regex = Regex::new(
        r"^(\S+)\s+Class\s+([0-9a-fA-F]{4}):\s+([0-9a-fA-F]{4}):([0-9a-fA-F]{4})"
    )
    .unwrap();
    static ref ID_PAIR_RE: Regex = Regex::new(r"^([0-9a-fA-F]{4}):([0-9a-fA-F]{4})$").unwrap();
}

fn id_pair(token: &str) -> Option<(u16, u16)> {
    let caps = ID_PAIR_RE.captures(token)?;
    Some((
        u16::from_str_radix(&caps[1], 16).ok()?,
        u16::from_str_radix(&caps[2], 16).ok()?,
    ))
}

/// Network-class functions from `lspci -n`:
/// `0000:3b:00.0 Class 0200: 8086:1572 [vmnic0]`.
pub fn parse_lspci_ids(text: &str) -> Vec<RawRecord> {
    text.lines()
        .filter_map(|line| {
            let caps = LSPCI_ID_RE.captures(line.trim())?;
            let class = u16::from_str_radix(&caps[2], 16).ok()?;
            if class >> 8 != 0x02 {
                return None;
            }
            let address: PciAddress = match caps[1].parse() {
                Ok(addr) => addr,
                Err(e) => {
                    warn!(error = %e, "skipping lspci line");
                    return None;
                }
            };
            let vendor = u16::from_str_radix(&caps[3], 16).ok()?;
            let device = u16::from_str_radix(&caps[4], 16).ok()?;
            Some(RawRecord::pci_function(address, Some(PciDevice::new(vendor, device))))
        })
        .collect()
}

/// Subsystem ids from `lspci -p`, keyed by address. The third column is
/// `subvendor:subdevice`.
pub fn parse_lspci_subsystems(text: &str) -> BTreeMap<PciAddress, (u16, u16)> {
    text.lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            let address: PciAddress = tokens.next()?.parse().ok()?;
            let _ids = tokens.next()?;
            Some((address, id_pair(tokens.next()?)?))
        })
        .collect()
}

pub fn parse_nics(text: &str) -> Vec<RawRecord> {
    parsers::parse_fixed_width_table(text, NIC_COLUMNS)
        .into_iter()
        .filter_map(|row| {
            let name = row.get("Name").filter(|n| !n.is_empty())?;
            let mut record = RawRecord::named(name.clone());
            record.pci_address = row.get("PCI").and_then(|p| p.parse().ok());
            let non_empty = |key: &str| row.get(key).filter(|v| !v.is_empty()).cloned();
            record.driver = non_empty("Driver");
            record.mac_address = non_empty("MAC Address");
            record.branding_string = non_empty("Description");
            Some(record)
        })
        .collect()
}

pub fn collect(ctx: &CollectContext<'_>) -> Result<RawInventory> {
    let conn = ctx.conn;
    let ids = conn.execute_command(LSPCI_IDS, &[0])?;
    let passthrough = conn.execute_command(LSPCI_PASSTHROUGH, &[0])?;
    let nics = conn.execute_command(NICS, &[0])?;

    let subsystems = parse_lspci_subsystems(&passthrough.stdout);
    let mut pci_functions = parse_lspci_ids(&ids.stdout);
    for record in &mut pci_functions {
        let sub = record.pci_address.and_then(|a| subsystems.get(&a));
        if let (Some(device), Some(&(sub_vendor, sub_device))) = (record.pci_device, sub) {
            record.pci_device = Some(device.with_subsystem(sub_vendor, sub_device));
        }
    }

    Ok(RawInventory {
        interfaces: parse_nics(&nics.stdout),
        pci_functions,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lspci_ids() {
        let text = "\
0000:00:00.0 Class 0600: 8086:2020
0000:3b:00.0 Class 0200: 8086:1572 [vmnic0]
0000:3b:00.1 Class 0200: 8086:1572 [vmnic1]
";
        let records = parse_lspci_ids(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].pci_address, Some(PciAddress::new(0, 0x3b, 0, 1)));
        assert_eq!(records[1].pci_device, Some(PciDevice::new(0x8086, 0x1572)));
    }

    #[test]
    fn test_parse_lspci_subsystems() {
        let text = "\
Segment:Bus:Dev.Func Vend:Dvid Subv:Subd ISA/irq/Vec P M Module       Name
0000:3b:00.0         8086:1572 8086:0007  11/   /0x1a A V i40en        vmnic0
";
        let subs = parse_lspci_subsystems(text);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[&PciAddress::new(0, 0x3b, 0, 0)], (0x8086, 0x0007));
    }

    #[test]
    fn test_parse_nics() {
        let text = "\
Name    PCI          Driver      Link Speed      Duplex MAC Address       MTU    Description
vmnic0  0000:3b:00.0 i40en       Up   10000Mbps  Full   3c:fd:fe:aa:bb:01 1500   Intel(R) Ethernet Controller X710 for 10GbE SFP+
";
        let nics = parse_nics(text);
        assert_eq!(nics.len(), 1);
        assert_eq!(nics[0].name.as_deref(), Some("vmnic0"));
        assert_eq!(nics[0].pci_address, Some(PciAddress::new(0, 0x3b, 0, 0)));
        assert_eq!(nics[0].driver.as_deref(), Some("i40en"));
        assert_eq!(nics[0].mac_address.as_deref(), Some("3c:fd:fe:aa:bb:01"));
        assert!(nics[0].installed);
    }
}
