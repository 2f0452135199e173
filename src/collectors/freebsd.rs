//! FreeBSD inventory: `pciconf -lv` for the bus, `ifconfig -a` for links.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use super::{CollectContext, LinkDetails, RawInventory, RawRecord};
use crate::domain::interface::VlanInfo;
use crate::domain::pci::{PciAddress, PciDevice};
use crate::error::Result;

pub const PCICONF: &str = "pciconf -lv";
pub const IFCONFIG: &str = "ifconfig -a";

/// Drivers that only ever bind virtual functions.
const VF_DRIVERS: &[&str] = &["iavf", "ixlv", "ixv"];

/// Proto assumed for VLAN lines that predate `vlanproto:` (FreeBSD < 13).
const DEFAULT_VLAN_PROTO: &str = "802.1q";

lazy_static! {
    static ref PCICONF_HEADER_RE: Regex =
        Regex::new(r"^([a-z][a-z0-9_]*?)(\d+)@(pci[0-9:]+):?\s+(.*)$").unwrap();
    static ref PCICONF_FIELD_RE: Regex = Regex::new(r"(\w+)=0x([0-9a-fA-F]+)").unwrap();
    static ref PCICONF_DEVICE_RE: Regex = Regex::new(r"^\s+device\s+=\s+'(.*)'\s*$").unwrap();
    static ref IFCONFIG_HEADER_RE: Regex =
        Regex::new(r"^([^\s:]+):\s+flags=[0-9a-fA-F]+<([^>]*)>").unwrap();
    static ref VLAN_RE: Regex = Regex::new(
        r"vlan:\s*(\d+)(?:\s+vlanproto:\s*(\S+))?\s+vlanpcp:\s*\d+\s+parent interface:\s*(\S+)"
    )
    .unwrap();
}

/// One function of `pciconf -lv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PciconfEntry {
    /// Bound device name (`ixl0`), `None` for `noneN` entries.
    pub name: Option<String>,
    pub driver: Option<String>,
    pub address: PciAddress,
    pub class: u32,
    pub device: PciDevice,
    pub description: Option<String>,
}

impl PciconfEntry {
    pub fn is_network(&self) -> bool {
        self.class >> 16 == 0x02
    }
}

/// Both header encodings are understood: the modern
/// `vendor=0x8086 device=0x1572 subvendor=0x8086 subdevice=0x0007` and the
/// older `chip=0x15728086 card=0x00078086` (device/vendor packed high/low).
fn pci_device_from_fields(fields: &BTreeMap<String, u32>) -> Option<PciDevice> {
    let (vendor, device) = match (fields.get("vendor"), fields.get("device"), fields.get("chip")) {
        (Some(&v), Some(&d), _) => (v as u16, d as u16),
        (_, _, Some(&chip)) => ((chip & 0xffff) as u16, (chip >> 16) as u16),
        _ => return None,
    };
    let dev = PciDevice::new(vendor, device);
    let subsystem = match (fields.get("subvendor"), fields.get("subdevice"), fields.get("card")) {
        (Some(&sv), Some(&sd), _) => Some((sv as u16, sd as u16)),
        (_, _, Some(&card)) => Some(((card & 0xffff) as u16, (card >> 16) as u16)),
        _ => None,
    };
    Some(match subsystem {
        Some((sv, sd)) => dev.with_subsystem(sv, sd),
        None => dev,
    })
}

pub fn parse_pciconf(text: &str) -> Vec<PciconfEntry> {
    let mut entries: Vec<PciconfEntry> = Vec::new();
    for line in text.lines() {
        if let Some(caps) = PCICONF_HEADER_RE.captures(line) {
            let address = match PciAddress::from_freebsd_selector(&caps[3]) {
                Ok(addr) => addr,
                Err(e) => {
                    warn!(error = %e, "skipping pciconf entry");
                    continue;
                }
            };
            let fields: BTreeMap<String, u32> = PCICONF_FIELD_RE
                .captures_iter(&caps[4])
                .filter_map(|f| Some((f[1].to_string(), u32::from_str_radix(&f[2], 16).ok()?)))
                .collect();
            let (Some(&class), Some(device)) = (fields.get("class"), pci_device_from_fields(&fields))
            else {
                continue;
            };
            let bound = &caps[1] != "none";
            entries.push(PciconfEntry {
                name: bound.then(|| format!("{}{}", &caps[1], &caps[2])),
                driver: bound.then(|| caps[1].to_string()),
                address,
                class,
                device,
                description: None,
            });
        } else if let (Some(caps), Some(entry)) = (PCICONF_DEVICE_RE.captures(line), entries.last_mut()) {
            entry.description = Some(caps[1].to_string());
        }
    }
    entries
}

/// One interface block of `ifconfig -a`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IfconfigEntry {
    pub name: String,
    pub details: LinkDetails,
    pub mac_address: Option<String>,
    pub ipv4: Vec<Ipv4Addr>,
    pub vlan: Option<VlanInfo>,
    /// Set for lagg interfaces.
    pub lagg_ports: Vec<String>,
    pub is_lagg: bool,
}

pub fn parse_ifconfig(text: &str) -> Vec<IfconfigEntry> {
    let mut entries: Vec<IfconfigEntry> = Vec::new();
    for line in text.lines() {
        if !line.starts_with(char::is_whitespace) {
            if let Some(caps) = IFCONFIG_HEADER_RE.captures(line) {
                entries.push(IfconfigEntry {
                    name: caps[1].to_string(),
                    details: LinkDetails {
                        flags: caps[2]
                            .split(',')
                            .filter(|f| !f.is_empty())
                            .map(str::to_string)
                            .collect(),
                        ..Default::default()
                    },
                    ..Default::default()
                });
            }
            continue;
        }
        let Some(current) = entries.last_mut() else {
            continue;
        };
        let trimmed = line.trim();
        let mut tokens = trimmed.split_whitespace();
        match tokens.next() {
            Some("ether") => current.mac_address = tokens.next().map(str::to_string),
            Some("inet") => {
                if let Some(ip) = tokens.next().and_then(|t| t.parse().ok()) {
                    current.ipv4.push(ip);
                }
            }
            Some("laggproto") => current.is_lagg = true,
            Some("laggport:") => {
                if let Some(port) = tokens.next() {
                    current.lagg_ports.push(port.to_string());
                }
            }
            Some("vlan:") => {
                current.vlan = VLAN_RE.captures(trimmed).and_then(|c| {
                    Some(VlanInfo {
                        parent: c[3].to_string(),
                        vlan_id: c[1].parse().ok()?,
                        proto: Some(
                            c.get(2)
                                .map(|p| p.as_str())
                                .unwrap_or(DEFAULT_VLAN_PROTO)
                                .to_lowercase(),
                        ),
                    })
                });
            }
            _ => {}
        }
    }
    entries
}

pub fn collect(ctx: &CollectContext<'_>) -> Result<RawInventory> {
    let conn = ctx.conn;
    let pciconf = conn.execute_command(PCICONF, &[0])?;
    let ifconfig = conn.execute_command(IFCONFIG, &[0])?;

    let pci: Vec<PciconfEntry> = parse_pciconf(&pciconf.stdout)
        .into_iter()
        .filter(PciconfEntry::is_network)
        .collect();
    let links = parse_ifconfig(&ifconfig.stdout);

    let mut inventory = RawInventory::default();
    let mut slaves_by_master: BTreeMap<String, String> = BTreeMap::new();
    for link in &links {
        if link.is_lagg {
            inventory.bond_masters.insert(link.name.clone());
            for port in &link.lagg_ports {
                inventory.bond_slaves.insert(port.clone());
                slaves_by_master.insert(port.clone(), link.name.clone());
            }
        }
    }

    let vf_names: BTreeSet<String> = pci
        .iter()
        .filter(|e| e.driver.as_deref().is_some_and(|d| VF_DRIVERS.contains(&d)))
        .filter_map(|e| e.name.clone())
        .collect();
    inventory.virtual_functions = vf_names;

    for entry in &pci {
        let mut record = RawRecord::pci_function(entry.address, Some(entry.device));
        record.branding_string = entry.description.clone();
        record.driver = entry.driver.clone();
        inventory.pci_functions.push(record);
    }

    for link in links {
        let mut record = RawRecord::named(link.name.clone());
        record.mac_address = link.mac_address.clone();
        if let Some(entry) = pci.iter().find(|e| e.name.as_deref() == Some(link.name.as_str())) {
            record.pci_address = Some(entry.address);
            record.pci_device = Some(entry.device);
            record.driver = entry.driver.clone();
            record.branding_string = entry.description.clone();
        }
        if let Some(vlan) = link.vlan {
            inventory.vlans.insert(link.name.clone(), vlan);
        }
        if !link.ipv4.is_empty() {
            inventory.ipv4.insert(link.name.clone(), link.ipv4);
        }
        let mut details = link.details;
        details.master = slaves_by_master.get(&link.name).cloned();
        inventory.link_details.insert(link.name.clone(), details);
        debug!(name = %link.name, pci = ?record.pci_address, "ifconfig interface");
        inventory.interfaces.push(record);
    }

    Ok(inventory)
}
