//! Interface selection: query validation, filtering and cardinality.
//!
//! Validation never touches the host, so a bad combination of selectors is
//! reported before any discovery command runs.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use rand::seq::IndexedRandom;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::interface::InterfaceInfo;
use crate::domain::pci::{PciAddress, PciDevice};
use crate::error::{OwnerError, Result};

lazy_static! {
    static ref SPEED_RE: Regex = Regex::new(r"(?i)^@?(\d+)\s*(?:g|gb|giga)?$").unwrap();
}

/// Normalize a user supplied speed (`40G`, `40g`, `40`, `40Giga`, `@40Gb`...)
/// to the canonical `@40G` form.
pub fn unify_speed_str(speed: &str) -> Result<String> {
    let caps = SPEED_RE
        .captures(speed.trim())
        .ok_or_else(|| OwnerError::InvalidSpeed(speed.to_string()))?;
    let gigabits: u32 = caps[1]
        .parse()
        .map_err(|_| OwnerError::InvalidSpeed(speed.to_string()))?;
    Ok(format!("@{}G", gigabits))
}

/// Family and speed lookup tables keyed by lowercase device-id prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupTables {
    #[serde(default)]
    pub families: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub speeds: BTreeMap<String, Vec<String>>,
}

fn id_matches(ids: &[String], device: &PciDevice) -> bool {
    let device_id = device.device_id_hex();
    ids.iter()
        .any(|prefix| device_id.starts_with(&prefix.to_ascii_lowercase()))
}

impl LookupTables {
    pub fn family_matches(&self, family: &str, device: &PciDevice) -> bool {
        self.families
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case(family))
            .any(|(_, ids)| id_matches(ids, device))
    }

    /// `speed` must already be in canonical form.
    pub fn speed_matches(&self, speed: &str, device: &PciDevice) -> bool {
        self.speeds
            .iter()
            .filter(|(key, _)| unify_speed_str(key).is_ok_and(|k| k == speed))
            .any(|(_, ids)| id_matches(ids, device))
    }
}

/// How many of the filtered interfaces are returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    First,
    All,
    Index(usize),
    Indexes(Vec<usize>),
    Random,
}

/// Whether the caller wants one interface or a list; some options only
/// make sense for one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Single,
    Multiple,
}

/// Selectors for `get_interface`/`get_interfaces`.
///
/// `pci_address`, the device group (`pci_device`, `family`, `speed`) and
/// `interface_names` are mutually exclusive. At most one of the index
/// options, `random_interface` and `all_interfaces` may be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceQuery {
    pub pci_address: Option<PciAddress>,
    pub pci_device: Option<PciDevice>,
    pub family: Option<String>,
    pub speed: Option<String>,
    pub interface_names: Option<Vec<String>>,
    pub interface_indexes: Option<Vec<usize>>,
    pub interface_index: Option<usize>,
    pub random_interface: bool,
    pub all_interfaces: bool,
}

impl InterfaceQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pci_address(mut self, address: PciAddress) -> Self {
        self.pci_address = Some(address);
        self
    }

    pub fn pci_device(mut self, device: PciDevice) -> Self {
        self.pci_device = Some(device);
        self
    }

    pub fn family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    pub fn speed(mut self, speed: impl Into<String>) -> Self {
        self.speed = Some(speed.into());
        self
    }

    pub fn interface_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interface_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn interface_indexes(mut self, indexes: impl Into<Vec<usize>>) -> Self {
        self.interface_indexes = Some(indexes.into());
        self
    }

    pub fn interface_index(mut self, index: usize) -> Self {
        self.interface_index = Some(index);
        self
    }

    pub fn random_interface(mut self) -> Self {
        self.random_interface = true;
        self
    }

    pub fn all_interfaces(mut self) -> Self {
        self.all_interfaces = true;
        self
    }

    /// Check selector groups and cardinality, normalize the speed.
    pub fn validate(&self, mode: QueryMode) -> Result<ValidatedQuery> {
        let mut groups = Vec::new();
        if self.pci_address.is_some() {
            groups.push("pci_address");
        }
        if self.pci_device.is_some() || self.family.is_some() || self.speed.is_some() {
            groups.push("pci_device/family/speed");
        }
        if self.interface_names.is_some() {
            groups.push("interface_names");
        }
        if groups.len() > 1 {
            return Err(OwnerError::IncorrectFilterCombination(format!(
                "{} cannot be combined",
                groups.join(" and ")
            )));
        }

        match mode {
            QueryMode::Single if self.interface_indexes.is_some() => {
                return Err(OwnerError::IncorrectFilterCombination(
                    "interface_indexes selects several interfaces, use interface_index".into(),
                ));
            }
            QueryMode::Single if self.all_interfaces => {
                return Err(OwnerError::IncorrectFilterCombination(
                    "all_interfaces selects several interfaces".into(),
                ));
            }
            QueryMode::Multiple if self.interface_index.is_some() => {
                return Err(OwnerError::IncorrectFilterCombination(
                    "interface_index selects one interface, use interface_indexes".into(),
                ));
            }
            _ => {}
        }

        let mut cardinality = Vec::new();
        if self.interface_index.is_some() || self.interface_indexes.is_some() {
            cardinality.push("interface index");
        }
        if self.random_interface {
            cardinality.push("random_interface");
        }
        if self.all_interfaces {
            cardinality.push("all_interfaces");
        }
        if cardinality.len() > 1 {
            return Err(OwnerError::IncorrectFilterCombination(format!(
                "only one of {} may be set",
                cardinality.join(", ")
            )));
        }

        let selection = if let Some(index) = self.interface_index {
            Selection::Index(index)
        } else if let Some(indexes) = &self.interface_indexes {
            Selection::Indexes(indexes.clone())
        } else if self.random_interface {
            Selection::Random
        } else if self.all_interfaces {
            Selection::All
        } else {
            match mode {
                QueryMode::Single => Selection::First,
                QueryMode::Multiple => Selection::All,
            }
        };

        Ok(ValidatedQuery {
            pci_address: self.pci_address,
            pci_device: self.pci_device,
            family: self.family.clone(),
            speed: self.speed.as_deref().map(unify_speed_str).transpose()?,
            interface_names: self.interface_names.clone(),
            selection,
        })
    }
}

/// A query that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    pub pci_address: Option<PciAddress>,
    pub pci_device: Option<PciDevice>,
    pub family: Option<String>,
    /// Canonical `@<n>G` form.
    pub speed: Option<String>,
    pub interface_names: Option<Vec<String>>,
    pub selection: Selection,
}

impl ValidatedQuery {
    fn device_filter_matches(&self, info: &InterfaceInfo, tables: &LookupTables) -> bool {
        if self.pci_device.is_none() && self.family.is_none() && self.speed.is_none() {
            return true;
        }
        let Some(device) = &info.pci_device else {
            return false;
        };
        self.pci_device.as_ref().map_or(true, |q| device.matches(q))
            && self
                .family
                .as_deref()
                .map_or(true, |f| tables.family_matches(f, device))
            && self
                .speed
                .as_deref()
                .map_or(true, |s| tables.speed_matches(s, device))
    }

    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(a) = &self.pci_address {
            parts.push(format!("pci_address={}", a));
        }
        if let Some(d) = &self.pci_device {
            parts.push(format!("pci_device={}", d));
        }
        if let Some(f) = &self.family {
            parts.push(format!("family={}", f));
        }
        if let Some(s) = &self.speed {
            parts.push(format!("speed={}", s));
        }
        if parts.is_empty() {
            "no filter".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Narrow `interfaces` to the selectable records the query matches.
    pub fn filter(&self, interfaces: Vec<InterfaceInfo>, tables: &LookupTables) -> Result<Vec<InterfaceInfo>> {
        let candidates: Vec<InterfaceInfo> = interfaces
            .into_iter()
            .filter(InterfaceInfo::is_selectable)
            .collect();

        if let Some(names) = &self.interface_names {
            let missing: Vec<&str> = names
                .iter()
                .filter(|n| !candidates.iter().any(|c| c.name() == Some(n.as_str())))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(OwnerError::InterfaceNotFound(missing.join(", ")));
            }
            return Ok(names
                .iter()
                .filter_map(|n| candidates.iter().find(|c| c.name() == Some(n.as_str())).cloned())
                .collect());
        }

        let filtered: Vec<InterfaceInfo> = candidates
            .into_iter()
            .filter(|i| self.pci_address.map_or(true, |a| i.pci_address == Some(a)))
            .filter(|i| self.device_filter_matches(i, tables))
            .collect();
        if filtered.is_empty() {
            return Err(OwnerError::InterfaceNotFound(format!(
                "no interface matches {}",
                self.describe()
            )));
        }
        Ok(filtered)
    }

    /// Apply the cardinality option to an already filtered set.
    pub fn select(&self, mut filtered: Vec<InterfaceInfo>) -> Result<Vec<InterfaceInfo>> {
        match &self.selection {
            Selection::All => Ok(filtered),
            Selection::First => Ok(filtered.into_iter().take(1).collect()),
            Selection::Random => Ok(filtered.choose(&mut rand::rng()).cloned().into_iter().collect()),
            Selection::Index(index) => {
                sort_by_pci_address(&mut filtered)?;
                Ok(vec![pick(&filtered, *index)?])
            }
            Selection::Indexes(indexes) => {
                sort_by_pci_address(&mut filtered)?;
                indexes.iter().map(|i| pick(&filtered, *i)).collect()
            }
        }
    }
}

fn pick(sorted: &[InterfaceInfo], index: usize) -> Result<InterfaceInfo> {
    sorted.get(index).cloned().ok_or_else(|| {
        OwnerError::InterfaceNotFound(format!(
            "index {} out of range ({} interfaces match)",
            index,
            sorted.len()
        ))
    })
}

/// Ascending PCI address order; a record without an address cannot be placed.
pub fn sort_by_pci_address(interfaces: &mut [InterfaceInfo]) -> Result<()> {
    if let Some(unaddressed) = interfaces.iter().find(|i| i.pci_address.is_none()) {
        return Err(OwnerError::Incomparable(unaddressed.label()));
    }
    interfaces.sort_by_key(|i| i.pci_address);
    Ok(())
}
