use crate::definition::{Definition, DefinitionSet};
use crate::identity::derive_id;
use crate::keyfile::KeyFile;
use crate::types::DefinitionKind;
use crate::SchemaError;
use serde_yaml::{Mapping, Value};
use std::path::Path;
use tracing::debug;

const RENDERER: &str = "NetworkManager";

/// Parse one keyfile into exactly one definition.
///
/// `context` is the set the definition is about to join; it is only consulted
/// to keep the id of a connection that was imported before.
pub fn import_keyfile(
    path: &Path,
    context: Option<&DefinitionSet>,
) -> Result<Definition, SchemaError> {
    let kf = KeyFile::parse_file(path)?;
    definition_from_keyfile(&kf, path, context)
}

/// Like [`import_keyfile`], with the keyfile content already in memory.
/// `path` still feeds id derivation.
pub fn import_keyfile_str(
    input: &str,
    path: &Path,
    context: Option<&DefinitionSet>,
) -> Result<Definition, SchemaError> {
    let kf = KeyFile::parse_str(input)?;
    definition_from_keyfile(&kf, path, context)
}

/// Identity fields of a keyfile, as needed to find its definition again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyfileIdentity {
    /// Only set for wireless profiles; a stray `[wifi]` group on another
    /// connection type does not take part in id derivation.
    pub network_name: Option<String>,
    pub uuid: Option<String>,
}

impl KeyfileIdentity {
    /// The fields import and delete both feed into [`derive_id`].
    fn of(kf: &KeyFile) -> Self {
        let field = |group: &str, key: &str| {
            kf.get(group, key)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        let wireless = kf
            .get("connection", "type")
            .is_some_and(|t| DefinitionKind::from_nm_type(t) == DefinitionKind::Wifi);
        Self {
            network_name: if wireless { field("wifi", "ssid") } else { None },
            uuid: field("connection", "uuid"),
        }
    }
}

/// Read only the identity fields of a keyfile.
///
/// A missing file yields an empty identity: the profile may already be gone
/// by the time its deletion is processed.
pub fn read_identity(path: &Path) -> Result<KeyfileIdentity, SchemaError> {
    let kf = match KeyFile::parse_file(path) {
        Ok(kf) => kf,
        Err(SchemaError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("keyfile {} no longer exists", path.display());
            return Ok(KeyfileIdentity::default());
        }
        Err(e) => return Err(e),
    };
    Ok(KeyfileIdentity::of(&kf))
}

fn definition_from_keyfile(
    kf: &KeyFile,
    path: &Path,
    context: Option<&DefinitionSet>,
) -> Result<Definition, SchemaError> {
    let nm_type = kf
        .get("connection", "type")
        .filter(|t| !t.is_empty())
        .ok_or(SchemaError::MissingField("connection.type"))?;
    let kind = DefinitionKind::from_nm_type(nm_type);

    let identity = KeyfileIdentity::of(kf);
    if kind == DefinitionKind::Wifi && identity.network_name.is_none() {
        return Err(SchemaError::MissingField("wifi.ssid"));
    }

    let id = derive_id(
        path,
        identity.network_name.as_deref(),
        identity.uuid.as_deref(),
        context,
    )?;
    debug!("keyfile {} maps to {kind} '{id}'", path.display());

    let mut def = Definition::new(id, kind);
    def.renderer = Some(RENDERER.to_owned());
    def.backend_origin_uuid = identity.uuid;
    def.connection_name = kf.get("connection", "id").map(str::to_owned);
    def.network_name = identity.network_name;

    let parent = kf
        .get("connection", "controller")
        .or_else(|| kf.get("connection", "master"))
        .filter(|p| !p.is_empty());
    let parent_type = kf
        .get("connection", "port-type")
        .or_else(|| kf.get("connection", "slave-type"));
    let parent_consumed = match (parent, parent_type) {
        (Some(p), Some("bond")) => {
            def.bond = Some(p.to_owned());
            true
        }
        (Some(p), Some("bridge")) => {
            def.bridge = Some(p.to_owned());
            true
        }
        _ => false,
    };

    let interface_name = kf
        .get("connection", "interface-name")
        .filter(|n| !n.is_empty());
    if kind.is_physical() {
        let mut matcher = Mapping::new();
        if let Some(name) = interface_name {
            matcher.insert("name".into(), name.into());
        }
        def.settings.insert("match".into(), Value::Mapping(matcher));
    }

    let ip = IpSettings::collect(kf);
    if ip.dhcp4 {
        def.settings.insert("dhcp4".into(), true.into());
    }
    if ip.dhcp6 {
        def.settings.insert("dhcp6".into(), true.into());
    }
    if !ip.addresses.is_empty() {
        let seq = ip.addresses.iter().map(|a| Value::from(a.as_str())).collect();
        def.settings.insert("addresses".into(), Value::Sequence(seq));
    }

    for (group, key, value) in kf.entries() {
        let group = KeyFile::canonical_group(group);
        let consumed = match (group, key) {
            ("connection", "type") => kind != DefinitionKind::NmDevice,
            ("connection", "uuid" | "id") => true,
            ("connection", "interface-name") => kind.is_physical(),
            ("connection", "master" | "controller" | "slave-type" | "port-type") => {
                parent_consumed
            }
            ("wifi", "ssid") => kind == DefinitionKind::Wifi,
            ("ipv4" | "ipv6", _) => ip.consumed(group, key),
            _ => false,
        };
        if !consumed {
            def.passthrough
                .insert(format!("{group}.{key}"), value.to_owned());
        }
    }
    for (key, gateway) in &ip.gateways {
        def.passthrough.insert(key.clone(), gateway.clone());
    }

    Ok(def)
}

/// IP settings with a native representation.
#[derive(Default)]
struct IpSettings {
    dhcp4: bool,
    dhcp6: bool,
    addresses: Vec<String>,
    /// `ipvX.address<N>` keys whose address was taken over.
    address_keys: Vec<(String, String)>,
    /// Gateways split off address entries, keyed `ipvX.gateway`.
    gateways: Vec<(String, String)>,
    method_consumed: [bool; 2],
}

impl IpSettings {
    fn collect(kf: &KeyFile) -> Self {
        let mut ip = IpSettings::default();
        for (slot, family) in ["ipv4", "ipv6"].into_iter().enumerate() {
            for (group, key, value) in kf.entries() {
                if group != family || !is_address_key(key) {
                    continue;
                }
                let (address, gateway) = match value.split_once(',') {
                    Some((a, gw)) => (a.trim(), Some(gw.trim())),
                    None => (value.trim(), None),
                };
                if address.is_empty() {
                    continue;
                }
                ip.addresses.push(address.to_owned());
                ip.address_keys.push((family.to_owned(), key.to_owned()));
                if let Some(gw) = gateway.filter(|g| !g.is_empty()) {
                    ip.gateways.push((format!("{family}.gateway"), gw.to_owned()));
                }
            }

            let has_addresses = ip.address_keys.iter().any(|(f, _)| f == family);
            match (family, kf.get(family, "method")) {
                ("ipv4", Some("auto")) => {
                    ip.dhcp4 = true;
                    ip.method_consumed[slot] = true;
                }
                ("ipv6", Some("auto" | "dhcp")) => {
                    ip.dhcp6 = true;
                    ip.method_consumed[slot] = true;
                }
                (_, Some("manual")) => ip.method_consumed[slot] = has_addresses,
                _ => {}
            }
        }
        ip
    }

    fn consumed(&self, group: &str, key: &str) -> bool {
        if key == "method" {
            return match group {
                "ipv4" => self.method_consumed[0],
                _ => self.method_consumed[1],
            };
        }
        self.address_keys.iter().any(|(g, k)| g == group && k == key)
    }
}

fn is_address_key(key: &str) -> bool {
    key.strip_prefix("address")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const UUID: &str = "87749f1d-334f-40b2-98d4-55db58965f5f";

    fn nm_path() -> PathBuf {
        PathBuf::from("/etc/NetworkManager/system-connections/profile.nmconnection")
    }

    #[test]
    fn ethernet_profile_maps_native_fields() {
        let input = format!(
            "[connection]\nid=Wired\nuuid={UUID}\ntype=ethernet\ninterface-name=eth0\n\
             permissions=\n\n[ipv4]\nmethod=auto\n\n[ipv6]\nmethod=ignore\n"
        );
        let def = import_keyfile_str(&input, &nm_path(), None).unwrap();

        assert_eq!(def.id, format!("NM-{UUID}"));
        assert_eq!(def.kind, DefinitionKind::Ethernet);
        assert_eq!(def.renderer.as_deref(), Some("NetworkManager"));
        assert_eq!(def.backend_origin_uuid.as_deref(), Some(UUID));
        assert_eq!(def.connection_name.as_deref(), Some("Wired"));
        assert_eq!(def.settings.get("dhcp4"), Some(&Value::Bool(true)));
        let matcher = def.settings.get("match").unwrap().as_mapping().unwrap();
        assert_eq!(matcher.get("name"), Some(&Value::from("eth0")));

        assert_eq!(
            def.passthrough.get("connection.permissions").map(String::as_str),
            Some("")
        );
        assert_eq!(
            def.passthrough.get("ipv6.method").map(String::as_str),
            Some("ignore")
        );
        assert!(!def.passthrough.contains_key("connection.uuid"));
        assert!(!def.passthrough.contains_key("ipv4.method"));
    }

    #[test]
    fn wifi_profile_requires_ssid() {
        let input = format!("[connection]\nuuid={UUID}\ntype=wifi\n");
        let err = import_keyfile_str(&input, &nm_path(), None).unwrap_err();
        assert!(matches!(err, SchemaError::MissingField("wifi.ssid")));
    }

    #[test]
    fn wifi_profile_carries_network_name() {
        let input = format!(
            "[connection]\nuuid={UUID}\ntype=802-11-wireless\n\n[802-11-wireless]\n\
             ssid=MyWifi\nmode=infrastructure\n"
        );
        let def = import_keyfile_str(&input, &nm_path(), None).unwrap();
        assert_eq!(def.kind, DefinitionKind::Wifi);
        assert_eq!(def.network_name.as_deref(), Some("MyWifi"));
        assert_eq!(
            def.passthrough.get("wifi.mode").map(String::as_str),
            Some("infrastructure")
        );
        assert!(!def.passthrough.contains_key("wifi.ssid"));
    }

    #[test]
    fn member_profile_declares_parent() {
        let input = format!(
            "[connection]\nuuid={UUID}\ntype=ethernet\nmaster=bond0\nslave-type=bond\n"
        );
        let def = import_keyfile_str(&input, &nm_path(), None).unwrap();
        assert_eq!(def.bond.as_deref(), Some("bond0"));
        assert_eq!(def.bridge, None);
        assert!(!def.passthrough.contains_key("connection.master"));

        let input = format!(
            "[connection]\nuuid={UUID}\ntype=ethernet\ncontroller=br0\nport-type=bridge\n"
        );
        let def = import_keyfile_str(&input, &nm_path(), None).unwrap();
        assert_eq!(def.bridge.as_deref(), Some("br0"));
    }

    #[test]
    fn unknown_parent_type_stays_in_passthrough() {
        let input = format!(
            "[connection]\nuuid={UUID}\ntype=ethernet\nmaster=team0\nslave-type=team\n"
        );
        let def = import_keyfile_str(&input, &nm_path(), None).unwrap();
        assert_eq!(def.bond, None);
        assert_eq!(
            def.passthrough.get("connection.master").map(String::as_str),
            Some("team0")
        );
    }

    #[test]
    fn manual_addresses_split_gateway() {
        let input = format!(
            "[connection]\nuuid={UUID}\ntype=ethernet\n\n[ipv4]\nmethod=manual\n\
             address1=10.0.0.5/24,10.0.0.1\naddress2=10.0.1.5/24\n"
        );
        let def = import_keyfile_str(&input, &nm_path(), None).unwrap();
        let addresses: Vec<_> = def
            .settings
            .get("addresses")
            .unwrap()
            .as_sequence()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(addresses, ["10.0.0.5/24", "10.0.1.5/24"]);
        assert_eq!(
            def.passthrough.get("ipv4.gateway").map(String::as_str),
            Some("10.0.0.1")
        );
        assert!(!def.passthrough.contains_key("ipv4.method"));
        assert!(!def.passthrough.contains_key("ipv4.address1"));
    }

    #[test]
    fn unmapped_type_keeps_connection_type() {
        let input = format!("[connection]\nuuid={UUID}\ntype=loopback\n");
        let def = import_keyfile_str(&input, &nm_path(), None).unwrap();
        assert_eq!(def.kind, DefinitionKind::NmDevice);
        assert_eq!(
            def.passthrough.get("connection.type").map(String::as_str),
            Some("loopback")
        );
        assert!(!def.settings.contains_key("match"));
    }

    #[test]
    fn missing_type_is_rejected() {
        let input = format!("[connection]\nuuid={UUID}\n");
        assert!(matches!(
            import_keyfile_str(&input, &nm_path(), None),
            Err(SchemaError::MissingField("connection.type"))
        ));
    }

    #[test]
    fn read_identity_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.nmconnection");
        assert_eq!(read_identity(&path).unwrap(), KeyfileIdentity::default());

        std::fs::write(
            &path,
            format!("[connection]\ntype=wifi\nuuid={UUID}\n[wifi]\nssid=MyWifi\n"),
        )
        .unwrap();
        let identity = read_identity(&path).unwrap();
        assert_eq!(identity.network_name.as_deref(), Some("MyWifi"));
        assert_eq!(identity.uuid.as_deref(), Some(UUID));
    }

    #[test]
    fn read_identity_ignores_ssid_of_wired_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wired.nmconnection");
        std::fs::write(&path, "[connection]\ntype=ethernet\n\n[wifi]\nssid=Stray\n").unwrap();
        let identity = read_identity(&path).unwrap();
        assert_eq!(identity.network_name, None);

        let def = import_keyfile(&path, None);
        assert!(matches!(def, Err(SchemaError::UnderivableId(_))));
    }

    #[test]
    fn read_identity_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.nmconnection");
        std::fs::write(&path, "ssid=no-group\n").unwrap();
        assert!(read_identity(&path).is_err());
    }
}
