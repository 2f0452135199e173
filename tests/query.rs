//! Selection semantics of `get_interface`/`get_interfaces` on a scripted
//! Linux host with three bound X710 ports (eth2, eth3, eth1 at 18:00.0-2).

mod common;

use std::sync::Arc;

use common::{linux_fvl_host, scripted_owner, tables};
use nic_owner::{
    sort_interfaces, unify_speed_str, InterfaceInfo, InterfaceQuery, InterfaceType,
    NetworkInterface, OwnerError, PciAddress, PciDevice, Platform,
};

fn names(found: &[NetworkInterface]) -> Vec<&str> {
    found.iter().filter_map(|i| i.name()).collect()
}

#[test]
fn bad_filter_combinations_fail_before_any_command() {
    let (owner, conn) = scripted_owner(linux_fvl_host());

    let conflicting = [
        InterfaceQuery::new()
            .pci_address(PciAddress::new(0, 0x18, 0, 0))
            .family("FVL"),
        InterfaceQuery::new()
            .interface_names(["eth1"])
            .pci_device(PciDevice::new(0x8086, 0x1572)),
        InterfaceQuery::new().random_interface().all_interfaces(),
        InterfaceQuery::new().interface_indexes(vec![0, 1]).random_interface(),
    ];
    for query in &conflicting {
        let err = owner.get_interfaces(query).unwrap_err();
        assert!(
            matches!(err, OwnerError::IncorrectFilterCombination(_)),
            "{:?} gave {:?}",
            query,
            err
        );
    }

    let single_only = InterfaceQuery::new().interface_index(0);
    assert!(matches!(
        owner.get_interfaces(&single_only),
        Err(OwnerError::IncorrectFilterCombination(_))
    ));
    let multiple_only = InterfaceQuery::new().family("FVL").all_interfaces();
    assert!(matches!(
        owner.get_interface(&multiple_only),
        Err(OwnerError::IncorrectFilterCombination(_))
    ));

    assert!(
        conn.calls().is_empty(),
        "validation ran commands: {:?}",
        conn.calls()
    );
}

#[test]
fn invalid_speed_is_rejected_before_discovery() {
    let (owner, conn) = scripted_owner(linux_fvl_host());
    let err = owner
        .get_interfaces(&InterfaceQuery::new().speed("fast"))
        .unwrap_err();
    assert!(matches!(err, OwnerError::InvalidSpeed(_)), "got {:?}", err);
    assert!(conn.calls().is_empty());
}

#[test]
fn speed_spellings_select_the_same_ports() {
    for spelling in ["10G", "10g", "10", "@10G", "10Gb", "10 giga"] {
        assert_eq!(unify_speed_str(spelling).unwrap(), "@10G", "spelling {}", spelling);
    }

    let (owner, _) = scripted_owner(linux_fvl_host());
    for spelling in ["10g", "@10G", "10"] {
        let found = owner
            .get_interfaces(&InterfaceQuery::new().speed(spelling))
            .unwrap();
        assert_eq!(found.len(), 3, "speed {}", spelling);
    }

    let err = owner
        .get_interfaces(&InterfaceQuery::new().speed("100G"))
        .unwrap_err();
    assert!(matches!(err, OwnerError::InterfaceNotFound(_)));
}

#[test]
fn unknown_family_matches_nothing() {
    let (owner, _) = scripted_owner(linux_fvl_host());
    let err = owner
        .get_interface(&InterfaceQuery::new().family("CPK"))
        .unwrap_err();
    assert!(matches!(err, OwnerError::InterfaceNotFound(_)), "got {:?}", err);
}

#[test]
fn names_keep_caller_order_and_report_missing() {
    let (owner, _) = scripted_owner(linux_fvl_host());
    let found = owner
        .get_interfaces(&InterfaceQuery::new().interface_names(["eth3", "eth1"]))
        .unwrap();
    assert_eq!(names(&found), vec!["eth3", "eth1"]);

    let err = owner
        .get_interfaces(&InterfaceQuery::new().interface_names(["eth1", "eth9", "eth10"]))
        .unwrap_err();
    match err {
        OwnerError::InterfaceNotFound(msg) => assert_eq!(msg, "eth9, eth10"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn indexes_count_in_pci_address_order() {
    let (owner, _) = scripted_owner(linux_fvl_host());
    let by_family = || InterfaceQuery::new().family("fvl");

    let first = owner.get_interface(&by_family().interface_index(0)).unwrap();
    assert_eq!(first.name(), Some("eth2"));

    let picked = owner
        .get_interfaces(&by_family().interface_indexes(vec![2, 0]))
        .unwrap();
    assert_eq!(names(&picked), vec!["eth1", "eth2"]);

    let err = owner
        .get_interface(&by_family().interface_index(3))
        .unwrap_err();
    assert!(matches!(err, OwnerError::InterfaceNotFound(_)));
}

#[test]
fn default_cardinality_depends_on_call() {
    let (owner, _) = scripted_owner(linux_fvl_host());
    let query = InterfaceQuery::new().pci_device(PciDevice::new(0x8086, 0x1572));

    assert_eq!(owner.get_interfaces(&query).unwrap().len(), 3);
    let one = owner.get_interface(&query).unwrap();
    assert_eq!(one.interface_type(), InterfaceType::Pf);
}

#[test]
fn random_pick_is_one_of_the_matches() {
    let (owner, _) = scripted_owner(linux_fvl_host());
    for _ in 0..5 {
        let found = owner
            .get_interfaces(&InterfaceQuery::new().family("FVL").random_interface())
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(["eth1", "eth2", "eth3"].contains(&found[0].name().unwrap()));
    }
}

#[test]
fn sorting_needs_pci_addresses() {
    let (owner, _) = scripted_owner(linux_fvl_host());
    let mut found = owner
        .get_interfaces(&InterfaceQuery::new().interface_names(["eth1", "eth3", "eth2"]))
        .unwrap();
    sort_interfaces(&mut found).unwrap();
    assert_eq!(names(&found), vec!["eth2", "eth3", "eth1"]);
    assert!(found[0] < found[1]);

    let conn = Arc::clone(owner.connection());
    let lo = NetworkInterface::new(
        InterfaceInfo::new(Some("lo".to_string()), InterfaceType::VirtualDevice),
        conn,
        Platform::Linux,
    );
    assert_eq!(found[0].partial_cmp(&lo), None);

    found.push(lo);
    let err = sort_interfaces(&mut found).unwrap_err();
    match err {
        OwnerError::Incomparable(label) => assert_eq!(label, "lo"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn lookup_tables_are_case_insensitive_on_family() {
    let t = tables();
    let x710 = PciDevice::new(0x8086, 0x1572);
    assert!(t.family_matches("fvl", &x710));
    assert!(t.family_matches("FVL", &x710));
    assert!(!t.family_matches("CVL", &x710));
}
