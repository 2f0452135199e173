//! Linux inventory: lspci, /sys/class/net, iproute2, sysfs VF links, ethtool.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use super::{CollectContext, LinkDetails, RawInventory, RawRecord};
use crate::domain::interface::{PlatformDetails, VlanInfo};
use crate::domain::pci::{PciAddress, PciDevice};
use crate::error::Result;
use crate::parsers;
use crate::tools::Ethtool;

pub const LSPCI: &str = "lspci -D -nnvvvmm";
pub const SYS_CLASS_NET: &str = "ls -l /sys/class/net";
pub const IP_LINK: &str = "ip -d link show";
pub const IP_ADDR: &str = "ip -o -4 addr show";
pub const PHYSFN: &str = "find /sys/class/net/*/device/ -maxdepth 1 -name physfn";

/// First tokens of `ip -d link` detail lines that are not a link kind.
const NON_KIND_TOKENS: &[&str] = &["altname", "addrgenmode", "alias", "vf", "prop", "inet", "inet6"];

lazy_static! {
    static ref LINK_HEADER_RE: Regex = Regex::new(r"^\d+:\s+([^:\s]+):\s+<([^>]*)>(.*)$").unwrap();
    static ref MASTER_RE: Regex = Regex::new(r"\bmaster\s+(\S+)").unwrap();
    static ref VLAN_RE: Regex = Regex::new(r"vlan protocol (\S+) id (\d+)").unwrap();
}

/// Run `command` inside network namespace `namespace`, if any.
pub fn netns(command: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) => format!("ip netns exec {} {}", ns, command),
        None => command.to_string(),
    }
}

/// One interface of the `ip -d link show` dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpLink {
    pub name: String,
    /// Lower device after `@` (VLAN parent, veth peer...).
    pub link: Option<String>,
    pub details: LinkDetails,
    pub mac_address: Option<String>,
    pub vlan: Option<(String, u16)>,
}

pub fn parse_ip_link(text: &str) -> Vec<IpLink> {
    let mut links: Vec<IpLink> = Vec::new();
    // Only the first indented line after `link/` carries the kind.
    let mut awaiting_kind = false;

    for line in text.lines() {
        if let Some(caps) = LINK_HEADER_RE.captures(line) {
            let (name, link) = match caps[1].split_once('@') {
                Some((name, link)) => (name.to_string(), Some(link.to_string())),
                None => (caps[1].to_string(), None),
            };
            let flags = caps[2]
                .split(',')
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect();
            let master = MASTER_RE.captures(&caps[3]).map(|m| m[1].to_string());
            links.push(IpLink {
                name,
                link,
                details: LinkDetails {
                    flags,
                    master,
                    kind: None,
                },
                mac_address: None,
                vlan: None,
            });
            awaiting_kind = false;
            continue;
        }

        let Some(current) = links.last_mut() else {
            continue;
        };
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("link/") {
            let mut tokens = rest.split_whitespace();
            if tokens.next() == Some("ether") {
                current.mac_address = tokens.next().map(str::to_string);
            }
            awaiting_kind = true;
        } else if awaiting_kind {
            awaiting_kind = false;
            let first = trimmed.split_whitespace().next().unwrap_or_default();
            if first.is_empty() || NON_KIND_TOKENS.contains(&first) {
                continue;
            }
            current.details.kind = Some(first.to_string());
            if first == "vlan" {
                current.vlan = VLAN_RE.captures(trimmed).and_then(|c| {
                    let id = c[2].parse().ok()?;
                    Some((c[1].to_string(), id))
                });
            }
        }
    }
    links
}

/// Network-class functions from `lspci -D -nnvvvmm`.
pub fn parse_lspci(text: &str, namespace: Option<&str>) -> Vec<RawRecord> {
    parsers::parse_key_value_blocks(text)
        .into_iter()
        .filter_map(|block| {
            let class = parsers::bracket_id(block.get("Class")?)?;
            if class >> 8 != 0x02 {
                return None;
            }
            let address: PciAddress = match block.get("Slot")?.parse() {
                Ok(addr) => addr,
                Err(e) => {
                    warn!(error = %e, "skipping lspci block");
                    return None;
                }
            };
            let vendor = block.get("Vendor").and_then(|v| parsers::bracket_id(v));
            let device_name = block.get("Device");
            let device_id = device_name.and_then(|v| parsers::bracket_id(v));
            let device = match (vendor, device_id) {
                (Some(vendor), Some(device)) => {
                    let dev = PciDevice::new(vendor, device);
                    let sub_vendor = block.get("SVendor").and_then(|v| parsers::bracket_id(v));
                    let sub_device = block.get("SDevice").and_then(|v| parsers::bracket_id(v));
                    Some(match (sub_vendor, sub_device) {
                        (Some(sv), Some(sd)) => dev.with_subsystem(sv, sd),
                        _ => dev,
                    })
                }
                _ => None,
            };

            let mut record = RawRecord::pci_function(address, device);
            record.branding_string = device_name.map(|d| parsers::strip_bracket_id(d));
            record.driver = block.get("Driver").cloned();
            record.details = PlatformDetails::Linux {
                namespace: namespace.map(str::to_string),
                sys_path: None,
            };
            Some(record)
        })
        .collect()
}

/// PCI address of a `/sys/class/net` symlink target: the path component
/// right before `net/<name>`. Virtual and VMBus devices have none.
pub fn pci_address_from_sys_path(target: &str) -> Option<PciAddress> {
    let parts: Vec<&str> = target.trim_end_matches('/').split('/').collect();
    if parts.len() < 3 || parts[parts.len() - 2] != "net" {
        return None;
    }
    parts[parts.len() - 3].parse().ok()
}

/// `ip -o -4 addr show` → addresses per interface.
pub fn parse_ipv4_addresses(text: &str) -> BTreeMap<String, Vec<Ipv4Addr>> {
    let mut addresses: BTreeMap<String, Vec<Ipv4Addr>> = BTreeMap::new();
    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 4 || tokens[2] != "inet" {
            continue;
        }
        let name = tokens[1].split('@').next().unwrap_or(tokens[1]);
        let ip = tokens[3].split('/').next().unwrap_or_default();
        if let Ok(ip) = ip.parse::<Ipv4Addr>() {
            addresses.entry(name.to_string()).or_default().push(ip);
        }
    }
    addresses
}

/// `find ... -name physfn` output → names of the interfaces that are VFs.
pub fn parse_physfn_names(text: &str) -> BTreeSet<String> {
    text.lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.trim().trim_end_matches('/').split('/').collect();
            let net = parts.iter().position(|p| *p == "net")?;
            parts.get(net + 1).map(|name| name.to_string())
        })
        .collect()
}

pub fn collect(ctx: &CollectContext<'_>) -> Result<RawInventory> {
    let ns = ctx.linux.namespace.as_deref();
    let conn = ctx.conn;

    let lspci = conn.execute_command(LSPCI, &[0])?;
    let listing = conn.execute_command(&netns(SYS_CLASS_NET, ns), &[0])?;
    let ip_link = conn.execute_command(&netns(IP_LINK, ns), &[0])?;
    let ip_addr = conn.execute_command(&netns(IP_ADDR, ns), &[0])?;
    // find exits 1 when the glob matches nothing.
    let physfn = conn.execute_command(&netns(PHYSFN, ns), &[0, 1])?;
    let bond_masters = ctx.bonding.get_bond_interfaces(conn, ns)?;

    let links = parse_ip_link(&ip_link.stdout);
    let mut inventory = RawInventory {
        pci_functions: parse_lspci(&lspci.stdout, ns),
        ipv4: parse_ipv4_addresses(&ip_addr.stdout),
        virtual_functions: parse_physfn_names(&physfn.stdout),
        bond_masters: bond_masters.into_iter().collect(),
        ..Default::default()
    };

    for link in &links {
        if let (Some((proto, vlan_id)), Some(parent)) = (&link.vlan, &link.link) {
            inventory.vlans.insert(
                link.name.clone(),
                VlanInfo {
                    parent: parent.clone(),
                    vlan_id: *vlan_id,
                    proto: Some(proto.clone()),
                },
            );
        }
        if let Some(kind) = &link.details.kind {
            if ctx.linux.tunnel_kinds.iter().any(|k| k == kind) {
                inventory.tunnels.insert(link.name.clone());
            }
        }
        inventory
            .link_details
            .insert(link.name.clone(), link.details.clone());
    }

    let ethtool = Ethtool::new(conn, ns);
    for entry in parsers::parse_sys_class_net(&listing.stdout) {
        let mut record = RawRecord::named(entry.name.clone());
        record.pci_address = pci_address_from_sys_path(&entry.target);
        record.mac_address = links
            .iter()
            .find(|l| l.name == entry.name)
            .and_then(|l| l.mac_address.clone());
        record.details = PlatformDetails::Linux {
            namespace: ns.map(str::to_string),
            sys_path: Some(entry.target.clone()),
        };
        if record.pci_address.is_some() {
            let info = ethtool.driver_info(&entry.name)?;
            record.driver = Some(info.driver.clone()).filter(|d| !d.is_empty());
            inventory.driver_info.insert(entry.name.clone(), info);
        }
        debug!(name = %entry.name, pci = ?record.pci_address, "sysfs interface");
        inventory.interfaces.push(record);
    }

    Ok(inventory)
}
