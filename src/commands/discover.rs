//! `nic-owner discover`
//!
//! Print the full canonical interface set, controllers included.

use anyhow::{Context, Result};

use super::OutputFormat;
use nic_owner::config::Config;

pub fn run(config: &Config, format: OutputFormat) -> Result<()> {
    let owner = super::connect(config)?;
    let interfaces = owner
        .discover()
        .with_context(|| format!("discovery on {} failed", super::describe_target(config)))?;
    super::print_interfaces(format, &interfaces)
}
