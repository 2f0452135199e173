//! Uniform network interface model over Linux, Windows, ESXi and FreeBSD
//! hosts.
//!
//! An [`Owner`] runs the inventory commands of its host's platform over a
//! [`Connection`], reconciles the outputs into one [`InterfaceInfo`] per
//! interface, classifies each one and answers [`InterfaceQuery`] selections
//! against that set.

pub mod collectors;
pub mod config;
pub mod connection;
pub mod domain;
pub mod error;
pub mod owner;
pub mod parsers;
pub mod pipeline;
pub mod platform;
pub mod query;
pub mod stat_checker;
pub mod tools;

pub use connection::{CommandResult, Connection, LocalConnection, SshConnection};
pub use domain::interface::{InterfaceInfo, InterfaceType, PlatformDetails, VlanInfo};
pub use domain::network_interface::{sort_interfaces, NetworkInterface};
pub use domain::pci::{PciAddress, PciDevice};
pub use error::{OwnerError, Result};
pub use owner::Owner;
pub use platform::{OsName, Platform};
pub use query::{unify_speed_str, InterfaceQuery, LookupTables};
pub use stat_checker::{StatChecker, StatCheckerError, StatSource, Trend};
