//! PCI identity value types.
//!
//! `PciAddress` is the primary key used to correlate records coming from
//! different commands, `PciDevice` groups functions of the same NIC family.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::OwnerError;

lazy_static! {
    static ref WINDOWS_LOCATION_RE: Regex =
        Regex::new(r"(?i)PCI bus (\d+), device (\d+), function (\d+)").unwrap();
}

/// domain:bus:slot.func
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PciAddress {
    pub domain: u32,
    pub bus: u8,
    pub slot: u8,
    pub func: u8,
}

impl PciAddress {
    pub fn new(domain: u32, bus: u8, slot: u8, func: u8) -> Self {
        Self {
            domain,
            bus,
            slot,
            func,
        }
    }

    /// Parse a FreeBSD pciconf selector such as `pci0:24:0:1` (decimal fields).
    pub fn from_freebsd_selector(selector: &str) -> Result<Self, OwnerError> {
        let err = || OwnerError::parse("PCI selector", selector);
        let body = selector
            .trim()
            .trim_end_matches(':')
            .strip_prefix("pci")
            .ok_or_else(err)?;
        let parts: Vec<&str> = body.split(':').collect();
        let (domain, rest) = match parts.len() {
            4 => (parts[0].parse::<u32>().map_err(|_| err())?, &parts[1..]),
            3 => (0, &parts[..]),
            _ => return Err(err()),
        };
        let bus = rest[0].parse::<u8>().map_err(|_| err())?;
        let slot = rest[1].parse::<u8>().map_err(|_| err())?;
        let func = rest[2].parse::<u8>().map_err(|_| err())?;
        Ok(Self::new(domain, bus, slot, func))
    }

    /// Parse a Windows location string: `PCI bus 24, device 0, function 1`.
    pub fn from_windows_location(location: &str) -> Result<Self, OwnerError> {
        let err = || OwnerError::parse("PCI location", location);
        let caps = WINDOWS_LOCATION_RE.captures(location).ok_or_else(err)?;
        let field = |i: usize| caps[i].parse::<u8>().map_err(|_| err());
        Ok(Self::new(0, field(1)?, field(2)?, field(3)?))
    }
}

impl FromStr for PciAddress {
    type Err = OwnerError;

    /// Accepts `0000:18:00.0`, `18:00.0` and the widened `00000:018:00.0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || OwnerError::parse("PCI address", s);
        let trimmed = s.trim();
        let (head, func) = trimmed.rsplit_once('.').ok_or_else(err)?;
        let parts: Vec<&str> = head.split(':').collect();
        let (domain, bus, slot) = match parts.as_slice() {
            [domain, bus, slot] => (u32::from_str_radix(domain, 16).map_err(|_| err())?, *bus, *slot),
            [bus, slot] => (0, *bus, *slot),
            _ => return Err(err()),
        };
        let bus = u8::from_str_radix(bus, 16).map_err(|_| err())?;
        let slot = u8::from_str_radix(slot, 16).map_err(|_| err())?;
        let func = u8::from_str_radix(func, 16).map_err(|_| err())?;
        if slot > 0x1f || func > 7 {
            return Err(err());
        }
        Ok(Self::new(domain, bus, slot, func))
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.domain, self.bus, self.slot, self.func
        )
    }
}

impl From<PciAddress> for String {
    fn from(addr: PciAddress) -> Self {
        addr.to_string()
    }
}

impl TryFrom<String> for PciAddress {
    type Error = OwnerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Vendor/device identity of a PCI function. Subsystem ids are optional
/// because not every inventory source reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PciDevice {
    pub vendor_id: u16,
    pub device_id: u16,
    pub sub_vendor_id: Option<u16>,
    pub sub_device_id: Option<u16>,
}

impl PciDevice {
    pub fn new(vendor_id: u16, device_id: u16) -> Self {
        Self {
            vendor_id,
            device_id,
            sub_vendor_id: None,
            sub_device_id: None,
        }
    }

    pub fn with_subsystem(mut self, sub_vendor_id: u16, sub_device_id: u16) -> Self {
        self.sub_vendor_id = Some(sub_vendor_id);
        self.sub_device_id = Some(sub_device_id);
        self
    }

    /// True when vendor/device are equal and every subsystem id the query
    /// specifies is equal too.
    pub fn matches(&self, query: &PciDevice) -> bool {
        self.vendor_id == query.vendor_id
            && self.device_id == query.device_id
            && query.sub_vendor_id.map_or(true, |v| self.sub_vendor_id == Some(v))
            && query.sub_device_id.map_or(true, |d| self.sub_device_id == Some(d))
    }

    /// Lowercase four digit device id, the form used by the family/speed tables.
    pub fn device_id_hex(&self) -> String {
        format!("{:04x}", self.device_id)
    }
}

impl FromStr for PciDevice {
    type Err = OwnerError;

    /// Accepts `8086:1572` or `8086:1572:8086:0001`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || OwnerError::parse("PCI device", s);
        let ids = s
            .trim()
            .split(':')
            .map(|p| u16::from_str_radix(p, 16).map_err(|_| err()))
            .collect::<Result<Vec<u16>, _>>()?;
        match ids.as_slice() {
            [vendor, device] => Ok(Self::new(*vendor, *device)),
            [vendor, device, sub_vendor, sub_device] => {
                Ok(Self::new(*vendor, *device).with_subsystem(*sub_vendor, *sub_device))
            }
            _ => Err(err()),
        }
    }
}

impl fmt::Display for PciDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.device_id)?;
        if let (Some(sv), Some(sd)) = (self.sub_vendor_id, self.sub_device_id) {
            write!(f, ":{:04x}:{:04x}", sv, sd)?;
        }
        Ok(())
    }
}

impl From<PciDevice> for String {
    fn from(dev: PciDevice) -> Self {
        dev.to_string()
    }
}

impl TryFrom<String> for PciDevice {
    type Error = OwnerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lspci_address() {
        let addr: PciAddress = "0000:18:00.1".parse().unwrap();
        assert_eq!(addr, PciAddress::new(0, 0x18, 0, 1));
        assert_eq!(addr.to_string(), "0000:18:00.1");
    }

    #[test]
    fn test_parse_address_encodings_agree() {
        let expected = PciAddress::new(0, 0x3b, 0, 0);
        assert_eq!("3b:00.0".parse::<PciAddress>().unwrap(), expected);
        assert_eq!("00000:03b:00.0".parse::<PciAddress>().unwrap(), expected);
        assert_eq!(PciAddress::from_freebsd_selector("pci0:59:0:0").unwrap(), expected);
        assert_eq!(
            PciAddress::from_windows_location("PCI bus 59, device 0, function 0").unwrap(),
            expected
        );
    }

    #[test]
    fn test_parse_address_rejects_garbage() {
        assert!("eth0".parse::<PciAddress>().is_err());
        assert!("0000:18:00".parse::<PciAddress>().is_err());
        assert!("0000:18:00.9".parse::<PciAddress>().is_err());
        assert!(PciAddress::from_freebsd_selector("ixl0").is_err());
    }

    #[test]
    fn test_address_order_is_domain_bus_slot_func() {
        let mut addrs = vec![
            PciAddress::new(1, 0, 0, 0),
            PciAddress::new(0, 0x18, 0, 1),
            PciAddress::new(0, 0x18, 0, 0),
            PciAddress::new(0, 0x05, 0x1f, 7),
        ];
        addrs.sort();
        assert_eq!(
            addrs,
            vec![
                PciAddress::new(0, 0x05, 0x1f, 7),
                PciAddress::new(0, 0x18, 0, 0),
                PciAddress::new(0, 0x18, 0, 1),
                PciAddress::new(1, 0, 0, 0),
            ]
        );
    }

    #[test]
    fn test_device_matching_ignores_unspecified_subsystem() {
        let record = PciDevice::new(0x8086, 0x1572).with_subsystem(0x8086, 0x0001);
        assert!(record.matches(&"8086:1572".parse().unwrap()));
        assert!(record.matches(&"8086:1572:8086:0001".parse().unwrap()));
        assert!(!record.matches(&"8086:1572:8086:0002".parse().unwrap()));
        assert!(!record.matches(&"8086:1583".parse().unwrap()));
    }

    #[test]
    fn test_serde_uses_display_form() {
        let addr = PciAddress::new(0, 0x18, 0, 2);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0000:18:00.2\"");
        let back: PciAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
