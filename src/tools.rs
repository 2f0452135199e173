//! Wrappers around host tools the collectors rely on.
//!
//! A failing tool surfaces as `ToolError`, which is carried through
//! `OwnerError::Tool` without rewording.

use tracing::debug;

use crate::collectors::linux::netns;
use crate::connection::Connection;
use crate::domain::pci::PciAddress;
use crate::error::{OwnerError, Result};
use crate::parsers;

#[derive(Debug, Clone, thiserror::Error)]
#[error("{tool} failed: `{command}` returned {return_code}: {stderr}")]
pub struct ToolError {
    pub tool: &'static str,
    pub command: String,
    pub return_code: i32,
    pub stderr: String,
}

fn run_tool(
    conn: &dyn Connection,
    tool: &'static str,
    command: &str,
) -> Result<String> {
    match conn.execute_command(command, &[0]) {
        Ok(result) => Ok(result.stdout),
        Err(OwnerError::UnexpectedReturnCode {
            command,
            return_code,
            stderr,
            ..
        }) => Err(ToolError {
            tool,
            command,
            return_code,
            stderr,
        }
        .into()),
        Err(e) => Err(e),
    }
}

/// Output of `ethtool -i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverInfo {
    pub driver: String,
    pub version: Option<String>,
    pub firmware_version: Option<String>,
    /// `None` for non-PCI buses (`tap`, `N/A`, empty).
    pub bus_info: Option<PciAddress>,
}

impl DriverInfo {
    pub fn parse(output: &str) -> Self {
        let fields = parsers::parse_colon_fields(output);
        let non_empty = |key: &str| fields.get(key).filter(|v| !v.is_empty()).cloned();
        Self {
            driver: fields.get("driver").cloned().unwrap_or_default(),
            version: non_empty("version"),
            firmware_version: non_empty("firmware-version"),
            bus_info: fields.get("bus-info").and_then(|v| v.parse().ok()),
        }
    }
}

pub struct Ethtool<'a> {
    conn: &'a dyn Connection,
    namespace: Option<&'a str>,
}

impl<'a> Ethtool<'a> {
    pub fn new(conn: &'a dyn Connection, namespace: Option<&'a str>) -> Self {
        Self { conn, namespace }
    }

    pub fn driver_info(&self, interface: &str) -> Result<DriverInfo> {
        let command = netns(&format!("ethtool -i {}", interface), self.namespace);
        let output = run_tool(self.conn, "ethtool", &command)?;
        let info = DriverInfo::parse(&output);
        debug!(interface, driver = %info.driver, "ethtool driver info");
        Ok(info)
    }
}

/// Source of bonding master names.
pub trait BondingQuery: Send + Sync {
    fn get_bond_interfaces(
        &self,
        conn: &dyn Connection,
        namespace: Option<&str>,
    ) -> Result<Vec<String>>;
}

/// Reads `/sys/class/net/bonding_masters`; a missing file (no bonding module)
/// means no bonds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysfsBonding;

impl BondingQuery for SysfsBonding {
    fn get_bond_interfaces(
        &self,
        conn: &dyn Connection,
        namespace: Option<&str>,
    ) -> Result<Vec<String>> {
        let command = netns("cat /sys/class/net/bonding_masters", namespace);
        let result = conn.execute_command(&command, &[0, 1])?;
        if result.return_code != 0 {
            return Ok(Vec::new());
        }
        Ok(result
            .stdout
            .split_whitespace()
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_driver_info() {
        let output = "driver: i40e\n\
                      version: 2.22.18\n\
                      firmware-version: 9.20 0x8000d95e 1.3353.0\n\
                      expansion-rom-version: \n\
                      bus-info: 0000:18:00.1\n\
                      supports-statistics: yes\n";
        let info = DriverInfo::parse(output);
        assert_eq!(info.driver, "i40e");
        assert_eq!(info.version.as_deref(), Some("2.22.18"));
        assert_eq!(info.firmware_version.as_deref(), Some("9.20 0x8000d95e 1.3353.0"));
        assert_eq!(info.bus_info, Some(PciAddress::new(0, 0x18, 0, 1)));
    }

    #[test]
    fn test_parse_driver_info_without_pci_bus() {
        let info = DriverInfo::parse("driver: bonding\nversion: 6.1\nbus-info: \n");
        assert_eq!(info.driver, "bonding");
        assert_eq!(info.bus_info, None);
    }
}
