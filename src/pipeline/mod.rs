//! Canonicalization and classification.
//!
//! A discovery pass threads the interface list through an ordered list of
//! stages. Each stage is a plain function of the current list and the raw
//! inventory, so stages can be tested and reordered in isolation. Later
//! stages overwrite the provisional type set by earlier ones.

pub mod stages;

use tracing::debug;

use crate::collectors::RawInventory;
use crate::domain::interface::InterfaceInfo;
use crate::error::Result;
use crate::platform::Platform;

pub type StageFn = fn(Vec<InterfaceInfo>, &RawInventory) -> Result<Vec<InterfaceInfo>>;

#[derive(Clone, Copy)]
pub struct Stage {
    pub name: &'static str,
    pub run: StageFn,
}

const SEED: Stage = Stage { name: "seed", run: stages::seed };
const MERGE_PCI: Stage = Stage { name: "merge_pci", run: stages::merge_pci };
const VLAN: Stage = Stage { name: "vlan", run: stages::vlan };
const VF: Stage = Stage { name: "vf", run: stages::vf };
const BOND: Stage = Stage { name: "bond", run: stages::bond };
const VMBUS: Stage = Stage { name: "vmbus", run: stages::vmbus };
const MANAGEMENT: Stage = Stage { name: "management", run: stages::management };
const VPORT_BTS: Stage = Stage { name: "vport_bts", run: stages::vport_bts };
const CLUSTER: Stage = Stage { name: "cluster", run: stages::cluster };
const REMOVE_TUNNELS: Stage = Stage { name: "remove_tunnels", run: stages::remove_tunnels };

const LINUX_STAGES: &[Stage] = &[
    SEED,
    MERGE_PCI,
    VLAN,
    VF,
    BOND,
    VMBUS,
    MANAGEMENT,
    VPORT_BTS,
    REMOVE_TUNNELS,
];
const WINDOWS_STAGES: &[Stage] = &[SEED, MERGE_PCI, VLAN, VF, MANAGEMENT, CLUSTER];
// vmnics carry no IP configuration of their own.
const ESXI_STAGES: &[Stage] = &[SEED, MERGE_PCI];
const FREEBSD_STAGES: &[Stage] = &[SEED, MERGE_PCI, VLAN, VF, BOND, MANAGEMENT];

/// Ordered stage list for a platform.
pub fn stages_for(platform: Platform) -> &'static [Stage] {
    match platform {
        Platform::Linux => LINUX_STAGES,
        Platform::Windows => WINDOWS_STAGES,
        Platform::Esxi => ESXI_STAGES,
        Platform::FreeBsd => FREEBSD_STAGES,
    }
}

pub fn run(platform: Platform, inventory: &RawInventory) -> Result<Vec<InterfaceInfo>> {
    let mut interfaces = Vec::new();
    for stage in stages_for(platform) {
        interfaces = (stage.run)(interfaces, inventory)?;
        debug!(stage = stage.name, records = interfaces.len(), "pipeline stage done");
    }
    Ok(interfaces)
}
