//! In-memory connection replaying canned command output.

#![allow(dead_code)]

use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use nic_owner::{CommandResult, Connection, LookupTables, OsName, Owner, Result};

pub struct ScriptedConnection {
    os: OsName,
    source_ip: Option<IpAddr>,
    responses: Vec<(String, CommandResult)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedConnection {
    pub fn new(os: OsName) -> Self {
        Self {
            os,
            source_ip: None,
            responses: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_source_ip(mut self, ip: &str) -> Self {
        self.source_ip = Some(ip.parse().unwrap());
        self
    }

    /// Answer any command containing `pattern`. First registered match wins.
    pub fn respond(self, pattern: &str, stdout: &str) -> Self {
        self.respond_code(pattern, 0, stdout)
    }

    pub fn respond_code(mut self, pattern: &str, return_code: i32, stdout: &str) -> Self {
        self.responses
            .push((pattern.to_string(), CommandResult::new(return_code, stdout)));
        self
    }

    /// Fail any command containing `pattern`, ahead of earlier registrations.
    pub fn failing(mut self, pattern: &str, return_code: i32, stderr: &str) -> Self {
        let mut result = CommandResult::new(return_code, "");
        result.stderr = stderr.to_string();
        self.responses.insert(0, (pattern.to_string(), result));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, command: &str, expected: &[i32]) -> Result<CommandResult> {
        self.calls.lock().unwrap().push(command.to_string());
        let result = self
            .responses
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| {
                let mut missing = CommandResult::new(127, "");
                missing.stderr = format!("no scripted output for `{}`", command);
                missing
            });
        result.check(command, expected)
    }
}

impl Connection for ScriptedConnection {
    fn execute_command(&self, command: &str, expected: &[i32]) -> Result<CommandResult> {
        self.answer(command, expected)
    }

    fn execute_powershell(&self, command: &str, expected: &[i32]) -> Result<CommandResult> {
        self.answer(command, expected)
    }

    fn get_os_name(&self) -> Result<OsName> {
        Ok(self.os)
    }

    fn source_ip(&self) -> Option<IpAddr> {
        self.source_ip
    }
}

/// Family/speed tables used by the scenarios.
pub fn tables() -> LookupTables {
    LookupTables {
        families: [
            ("FVL".to_string(), vec!["1572".to_string(), "1583".to_string()]),
            ("CVL".to_string(), vec!["1592".to_string()]),
        ]
        .into(),
        speeds: [
            ("@10G".to_string(), vec!["1572".to_string()]),
            ("@40G".to_string(), vec!["1583".to_string()]),
            ("@100G".to_string(), vec!["1592".to_string()]),
        ]
        .into(),
    }
}

pub fn scripted_owner(conn: ScriptedConnection) -> (Owner, Arc<ScriptedConnection>) {
    let conn = Arc::new(conn);
    let owner = Owner::new(conn.clone(), tables()).unwrap();
    (owner, conn)
}

// ─── Linux fixture ──────────────────────────────────────────────

pub const LINUX_LSPCI: &str = "\
Slot:\t0000:18:00.0
Class:\tEthernet controller [0200]
Vendor:\tIntel Corporation [8086]
Device:\tEthernet Controller X710 for 10GbE SFP+ [1572]
SVendor:\tIntel Corporation [8086]
SDevice:\tEthernet Converged Network Adapter X710-4 [0001]
Driver:\ti40e

Slot:\t0000:18:00.1
Class:\tEthernet controller [0200]
Vendor:\tIntel Corporation [8086]
Device:\tEthernet Controller X710 for 10GbE SFP+ [1572]
SVendor:\tIntel Corporation [8086]
SDevice:\tEthernet Converged Network Adapter X710-4 [0001]
Driver:\ti40e

Slot:\t0000:18:00.2
Class:\tEthernet controller [0200]
Vendor:\tIntel Corporation [8086]
Device:\tEthernet Controller X710 for 10GbE SFP+ [1572]
SVendor:\tIntel Corporation [8086]
SDevice:\tEthernet Converged Network Adapter X710-4 [0001]
Driver:\ti40e

Slot:\t0000:18:00.3
Class:\tEthernet controller [0200]
Vendor:\tIntel Corporation [8086]
Device:\tEthernet Controller X710 for 10GbE SFP+ [1572]
SVendor:\tIntel Corporation [8086]
SDevice:\tEthernet Converged Network Adapter X710-4 [0001]

Slot:\t0000:00:1f.6
Class:\tSMBus [0c05]
Vendor:\tIntel Corporation [8086]
Device:\tSMBus Controller [a323]
";

pub const LINUX_SYS_CLASS_NET: &str = "\
total 0
-rw-r--r-- 1 root root 4096 Oct 18 10:00 bonding_masters
lrwxrwxrwx 1 root root    0 Oct 18 10:00 eth1 -> ../../devices/pci0000:17/0000:17:00.0/0000:18:00.2/net/eth1
lrwxrwxrwx 1 root root    0 Oct 18 10:00 eth2 -> ../../devices/pci0000:17/0000:17:00.0/0000:18:00.0/net/eth2
lrwxrwxrwx 1 root root    0 Oct 18 10:00 eth3 -> ../../devices/pci0000:17/0000:17:00.0/0000:18:00.1/net/eth3
lrwxrwxrwx 1 root root    0 Oct 18 10:00 lo -> ../../devices/virtual/net/lo
lrwxrwxrwx 1 root root    0 Oct 18 10:00 vxlan42 -> ../../devices/virtual/net/vxlan42
";

pub const LINUX_IP_LINK: &str = "\
1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN mode DEFAULT group default qlen 1000
    link/loopback 00:00:00:00:00:00 brd 00:00:00:00:00:00 promiscuity 0 minmtu 0 maxmtu 0 addrgenmode eui64
2: eth2: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc mq state UP mode DEFAULT group default qlen 1000
    link/ether 3c:fd:fe:aa:bb:00 brd ff:ff:ff:ff:ff:ff promiscuity 0 minmtu 68 maxmtu 9702 addrgenmode eui64
3: eth3: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc mq state UP mode DEFAULT group default qlen 1000
    link/ether 3c:fd:fe:aa:bb:01 brd ff:ff:ff:ff:ff:ff promiscuity 0 minmtu 68 maxmtu 9702 addrgenmode eui64
4: eth1: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc mq state UP mode DEFAULT group default qlen 1000
    link/ether 3c:fd:fe:aa:bb:02 brd ff:ff:ff:ff:ff:ff promiscuity 0 minmtu 68 maxmtu 9702 addrgenmode eui64
5: vxlan42: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1450 qdisc noqueue state UNKNOWN mode DEFAULT group default qlen 1000
    link/ether 5a:11:22:33:44:55 brd ff:ff:ff:ff:ff:ff promiscuity 0 minmtu 68 maxmtu 65535
    vxlan id 42 remote 10.0.0.2 dev eth2 srcport 0 0 dstport 4789 ageing 300
";

pub const LINUX_IP_ADDR: &str = "\
1: lo    inet 127.0.0.1/8 scope host lo\\       valid_lft forever preferred_lft forever
2: eth2    inet 10.10.10.5/24 brd 10.10.10.255 scope global eth2\\       valid_lft forever preferred_lft forever
3: eth3    inet 192.168.50.5/24 brd 192.168.50.255 scope global eth3\\       valid_lft forever preferred_lft forever
";

fn ethtool_output(bus: &str) -> String {
    format!(
        "driver: i40e\nversion: 2.22.18\nfirmware-version: 9.20 0x8000d95e 1.3353.0\nbus-info: {}\nsupports-statistics: yes\n",
        bus
    )
}

/// Four X710 functions, three bound as eth2/eth3/eth1, one unbound, plus a
/// vxlan tunnel and loopback.
pub fn linux_fvl_host() -> ScriptedConnection {
    ScriptedConnection::new(OsName::Linux)
        .respond("lspci -D -nnvvvmm", LINUX_LSPCI)
        .respond("ls -l /sys/class/net", LINUX_SYS_CLASS_NET)
        .respond("ip -d link show", LINUX_IP_LINK)
        .respond("ip -o -4 addr show", LINUX_IP_ADDR)
        .respond_code("-name physfn", 1, "")
        .respond("cat /sys/class/net/bonding_masters", "")
        .respond("ethtool -i eth1", &ethtool_output("0000:18:00.2"))
        .respond("ethtool -i eth2", &ethtool_output("0000:18:00.0"))
        .respond("ethtool -i eth3", &ethtool_output("0000:18:00.1"))
}
