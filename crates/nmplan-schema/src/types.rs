use std::fmt;

/// Device type of a definition. Each kind owns one section of a layer file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DefinitionKind {
    Ethernet,
    Wifi,
    Modem,
    Bond,
    Bridge,
    Vlan,
    Tunnel,
    Vrf,
    Dummy,
    VirtualEthernet,
    NmDevice,
}

impl DefinitionKind {
    /// All kinds in the order their sections are emitted.
    pub const ALL: [DefinitionKind; 11] = [
        DefinitionKind::Ethernet,
        DefinitionKind::Wifi,
        DefinitionKind::Modem,
        DefinitionKind::Bond,
        DefinitionKind::Bridge,
        DefinitionKind::Vlan,
        DefinitionKind::Tunnel,
        DefinitionKind::Vrf,
        DefinitionKind::Dummy,
        DefinitionKind::VirtualEthernet,
        DefinitionKind::NmDevice,
    ];

    /// Name of the `network:` section holding definitions of this kind.
    pub fn section(self) -> &'static str {
        match self {
            DefinitionKind::Ethernet => "ethernets",
            DefinitionKind::Wifi => "wifis",
            DefinitionKind::Modem => "modems",
            DefinitionKind::Bond => "bonds",
            DefinitionKind::Bridge => "bridges",
            DefinitionKind::Vlan => "vlans",
            DefinitionKind::Tunnel => "tunnels",
            DefinitionKind::Vrf => "vrfs",
            DefinitionKind::Dummy => "dummy-devices",
            DefinitionKind::VirtualEthernet => "virtual-ethernets",
            DefinitionKind::NmDevice => "nm-devices",
        }
    }

    pub fn from_section(section: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.section() == section)
    }

    /// Map a NetworkManager `connection.type` onto a kind. Types without a
    /// native counterpart are carried as opaque `nm-devices`.
    pub fn from_nm_type(nm_type: &str) -> Self {
        match nm_type {
            "ethernet" | "802-3-ethernet" => DefinitionKind::Ethernet,
            "wifi" | "802-11-wireless" => DefinitionKind::Wifi,
            "gsm" | "cdma" => DefinitionKind::Modem,
            "bond" => DefinitionKind::Bond,
            "bridge" => DefinitionKind::Bridge,
            "vlan" => DefinitionKind::Vlan,
            "ip-tunnel" | "wireguard" => DefinitionKind::Tunnel,
            "vrf" => DefinitionKind::Vrf,
            "dummy" => DefinitionKind::Dummy,
            "veth" => DefinitionKind::VirtualEthernet,
            _ => DefinitionKind::NmDevice,
        }
    }

    /// Physical devices are matched by properties instead of being created.
    pub fn is_physical(self) -> bool {
        matches!(
            self,
            DefinitionKind::Ethernet | DefinitionKind::Wifi | DefinitionKind::Modem
        )
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DefinitionKind::Ethernet => "ethernet",
            DefinitionKind::Wifi => "wifi",
            DefinitionKind::Modem => "modem",
            DefinitionKind::Bond => "bond",
            DefinitionKind::Bridge => "bridge",
            DefinitionKind::Vlan => "vlan",
            DefinitionKind::Tunnel => "tunnel",
            DefinitionKind::Vrf => "vrf",
            DefinitionKind::Dummy => "dummy",
            DefinitionKind::VirtualEthernet => "veth",
            DefinitionKind::NmDevice => "nm-device",
        };
        f.write_str(name)
    }
}

/// Position of a definition inside its `DefinitionSet`.
///
/// Only meaningful for the set that handed it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DefIndex(pub(crate) usize);

impl DefIndex {
    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}
