use std::fmt;
use std::str::FromStr;

use crate::error::OwnerError;

/// Operating system as reported by the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsName {
    Linux,
    Windows,
    Esxi,
    FreeBsd,
    MacOs,
}

impl FromStr for OsName {
    type Err = OwnerError;

    /// Accepts `uname -s` output as well as the .NET/Rust spellings of Windows.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linux" => Ok(OsName::Linux),
            "windows" | "windows_nt" | "win32nt" => Ok(OsName::Windows),
            "vmkernel" | "esxi" => Ok(OsName::Esxi),
            "freebsd" => Ok(OsName::FreeBsd),
            "darwin" | "macos" => Ok(OsName::MacOs),
            other => Err(OwnerError::UnsupportedOs(other.to_string())),
        }
    }
}

impl fmt::Display for OsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsName::Linux => write!(f, "Linux"),
            OsName::Windows => write!(f, "Windows"),
            OsName::Esxi => write!(f, "ESXi"),
            OsName::FreeBsd => write!(f, "FreeBSD"),
            OsName::MacOs => write!(f, "macOS"),
        }
    }
}

/// Platform implementation selected once per Owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Windows,
    Esxi,
    FreeBsd,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Linux => write!(f, "linux"),
            Platform::Windows => write!(f, "windows"),
            Platform::Esxi => write!(f, "esxi"),
            Platform::FreeBsd => write!(f, "freebsd"),
        }
    }
}

pub fn detect(os_name: OsName) -> Result<Platform, OwnerError> {
    match os_name {
        OsName::Linux => Ok(Platform::Linux),
        OsName::Windows => Ok(Platform::Windows),
        OsName::Esxi => Ok(Platform::Esxi),
        OsName::FreeBsd => Ok(Platform::FreeBsd),
        other => Err(OwnerError::UnsupportedOs(format!(
            "no interface owner for {}",
            other
        ))),
    }
}
