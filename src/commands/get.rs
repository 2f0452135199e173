//! `nic-owner get`
//!
//! Select interfaces with the query engine.

use anyhow::Result;
use clap::Args;

use super::OutputFormat;
use nic_owner::config::Config;
use nic_owner::{InterfaceInfo, InterfaceQuery, PciAddress, PciDevice};

#[derive(Args, Debug)]
pub struct GetArgs {
    /// PCI address (`0000:18:00.0`)
    #[arg(long)]
    pub pci_address: Option<PciAddress>,

    /// Vendor:device[:subvendor:subdevice] in hex
    #[arg(long)]
    pub pci_device: Option<PciDevice>,

    /// NIC family from the lookup table (FVL, CVL...)
    #[arg(long)]
    pub family: Option<String>,

    /// Port speed (`10G`, `@25G`, `40`...)
    #[arg(long)]
    pub speed: Option<String>,

    /// Interface name; repeat for several
    #[arg(long = "name")]
    pub names: Vec<String>,

    /// Position in PCI address order; repeat for several
    #[arg(long = "index")]
    pub indexes: Vec<usize>,

    /// Pick one matching interface at random
    #[arg(long)]
    pub random: bool,

    /// Return every match explicitly
    #[arg(long)]
    pub all: bool,

    /// Return exactly one interface
    #[arg(long)]
    pub single: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl GetArgs {
    pub fn to_query(&self) -> InterfaceQuery {
        let mut query = InterfaceQuery::new();
        query.pci_address = self.pci_address;
        query.pci_device = self.pci_device;
        query.family = self.family.clone();
        query.speed = self.speed.clone();
        if !self.names.is_empty() {
            query.interface_names = Some(self.names.clone());
        }
        match self.indexes.as_slice() {
            [] => {}
            [index] if self.single => query.interface_index = Some(*index),
            indexes => query.interface_indexes = Some(indexes.to_vec()),
        }
        query.random_interface = self.random;
        query.all_interfaces = self.all;
        query
    }
}

pub fn run(config: &Config, args: &GetArgs) -> Result<()> {
    let owner = super::connect(config)?;
    let query = args.to_query();
    let selected: Vec<InterfaceInfo> = if args.single {
        vec![owner.get_interface(&query)?.into_info()]
    } else {
        owner
            .get_interfaces(&query)?
            .into_iter()
            .map(|i| i.into_info())
            .collect()
    };
    super::print_interfaces(args.format, &selected)
}
