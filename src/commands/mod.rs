pub mod check;
pub mod discover;
pub mod get;
pub mod trend;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::{ColoredString, Colorize};

use nic_owner::config::Config;
use nic_owner::{Connection, InterfaceInfo, InterfaceType, LocalConnection, Owner, SshConnection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

/// Owner for the configured target: ssh when a host is set, local otherwise.
pub fn connect(config: &Config) -> Result<Owner> {
    let connection: Arc<dyn Connection> = match config.target.host {
        Some(host) => Arc::new(SshConnection::new(host, config.target.user.as_str())),
        None => Arc::new(LocalConnection::new(config.target.source_ip)),
    };
    let owner = Owner::new(connection, config.tables.clone())
        .context("could not determine the target platform")?
        .with_linux_config(config.linux.clone());
    Ok(owner)
}

pub fn describe_target(config: &Config) -> String {
    match config.target.host {
        Some(host) => format!("{}@{}", config.target.user, host),
        None => "localhost".to_string(),
    }
}

pub fn print_interfaces(format: OutputFormat, interfaces: &[InterfaceInfo]) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(interfaces)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(interfaces)?),
        OutputFormat::Table => print_table(interfaces),
    }
    Ok(())
}

fn colored_type(interface_type: InterfaceType) -> ColoredString {
    let label = format!("{:<18}", interface_type.to_string());
    match interface_type {
        InterfaceType::Pf => label.green(),
        InterfaceType::Vf | InterfaceType::Vport => label.cyan(),
        InterfaceType::Management | InterfaceType::ClusterManagement => label.yellow(),
        InterfaceType::EthController => label.dimmed(),
        _ => label.normal(),
    }
}

fn print_table(interfaces: &[InterfaceInfo]) {
    println!(
        "{}",
        format!(
            "{:<20} {:<18} {:<14} {:<20} {:<10} {:<18}",
            "NAME", "TYPE", "PCI ADDRESS", "DEVICE", "DRIVER", "MAC"
        )
        .bold()
    );
    for info in interfaces {
        let dash = || "-".to_string();
        println!(
            "{:<20} {} {:<14} {:<20} {:<10} {:<18}",
            info.name.clone().unwrap_or_else(dash),
            colored_type(info.interface_type),
            info.pci_address.map(|a| a.to_string()).unwrap_or_else(dash),
            info.pci_device.map(|d| d.to_string()).unwrap_or_else(dash),
            info.driver.clone().unwrap_or_else(dash),
            info.mac_address.clone().unwrap_or_else(dash),
        );
        if let Some(vlan) = &info.vlan_info {
            println!("  {} id {} on {}", "vlan".dimmed(), vlan.vlan_id, vlan.parent);
        }
        if let Some(cluster) = info.cluster_info() {
            println!("  {} {}", "cluster network".dimmed(), cluster.network);
        }
    }
    println!("{}", format!("{} interface(s)", interfaces.len()).dimmed());
}
