pub mod interface;
pub mod network_interface;
pub mod pci;
