//! End-to-end import and deletion against a temporary hierarchy.

use nmplan_core::{CoreError, Engine, ImportConfig, Mode};
use nmplan_schema::{Upsert, NM_CONNECTIONS_PREFIX};
use nmplan_store::{Hierarchy, HierarchyLayout};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};

const ETH_UUID: &str = "a1b2c3d4-0000-4000-8000-000000000001";

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn keyfile(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join("keyfiles").join(name);
    write(&path, content);
    path
}

fn import(root: &Path, keyfile: &Path) -> Result<nmplan_core::ImportOutcome, CoreError> {
    Engine::new(ImportConfig::new(root, keyfile)).import()
}

/// Contents of every layer file, keyed by path.
fn snapshot(root: &Path) -> Vec<(PathBuf, String)> {
    let layout = HierarchyLayout::new(root);
    layout
        .discover()
        .unwrap()
        .into_iter()
        .map(|p| {
            let c = fs::read_to_string(&p).unwrap();
            (p, c)
        })
        .collect()
}

fn member_keyfile(uuid: &str, bond: &str) -> String {
    format!("[connection]\nid=member\nuuid={uuid}\ntype=ethernet\ninterface-name=eth0\nmaster={bond}\nslave-type=bond\n")
}

#[test]
fn import_writes_highest_layer_file() {
    let root = tempfile::tempdir().unwrap();
    let kf = keyfile(
        root.path(),
        "wired.nmconnection",
        &format!("[connection]\nid=Wired\nuuid={ETH_UUID}\ntype=ethernet\n\n[ipv4]\nmethod=auto\n"),
    );

    let outcome = import(root.path(), &kf).unwrap();
    assert_eq!(outcome.id, format!("NM-{ETH_UUID}"));
    assert_eq!(outcome.filename, format!("90-NM-{ETH_UUID}.yaml"));
    assert_eq!(outcome.change, Upsert::Created);

    let written = HierarchyLayout::new(root.path())
        .etc_dir()
        .join(&outcome.filename);
    let doc: Value = serde_yaml::from_str(&fs::read_to_string(written).unwrap()).unwrap();
    let def = &doc["network"]["ethernets"][outcome.id.as_str()];
    assert_eq!(def["renderer"], Value::from("NetworkManager"));
    assert_eq!(def["dhcp4"], Value::from(true));
    assert_eq!(def["networkmanager"]["uuid"], Value::from(ETH_UUID));
    assert_eq!(def["networkmanager"]["name"], Value::from("Wired"));
}

#[test]
fn forward_resolution_links_member_to_existing_bond() {
    let root = tempfile::tempdir().unwrap();
    let layout = HierarchyLayout::new(root.path());
    write(
        &layout.etc_dir().join("10-bond.yaml"),
        "network:\n  version: 2\n  bonds:\n    bond0: {}\n",
    );
    let kf = keyfile(root.path(), "m.nmconnection", &member_keyfile(ETH_UUID, "bond0"));

    let outcome = import(root.path(), &kf).unwrap();
    assert_eq!(outcome.resolution.forward, 1);

    let h = Hierarchy::load(root.path()).unwrap();
    let set = h.definitions();
    assert_eq!(set.by_id(&outcome.id).unwrap().bond_link, set.lookup("bond0"));
}

#[test]
fn reverse_resolution_links_existing_member_to_new_bond() {
    let root = tempfile::tempdir().unwrap();
    let layout = HierarchyLayout::new(root.path());
    write(
        &layout.etc_dir().join("10-eth.yaml"),
        "network:\n  version: 2\n  ethernets:\n    eth1:\n      bond: bond0\n",
    );
    // A generated-path keyfile keeps its plain id, so members can name it.
    let generated = PathBuf::from(format!(
        "{}{NM_CONNECTIONS_PREFIX}bond0.nmconnection",
        root.path().display()
    ));
    write(&generated, "[connection]\nid=bond0\nuuid=b0\ntype=bond\n");

    let outcome = import(root.path(), &generated).unwrap();
    assert_eq!(outcome.id, "bond0");
    assert_eq!(outcome.resolution.reverse, 1);

    let h = Hierarchy::load(root.path()).unwrap();
    let set = h.definitions();
    assert_eq!(set.by_id("eth1").unwrap().bond_link, set.lookup("bond0"));
}

#[test]
fn reimport_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let kf = keyfile(
        root.path(),
        "wired.nmconnection",
        &format!("[connection]\nid=Wired\nuuid={ETH_UUID}\ntype=ethernet\n"),
    );

    let first = import(root.path(), &kf).unwrap();
    let after_first = snapshot(root.path());
    let second = import(root.path(), &kf).unwrap();
    let after_second = snapshot(root.path());

    assert_eq!(first.filename, second.filename);
    assert_eq!(first.id, second.id);
    assert_eq!(second.change, Upsert::Updated);
    assert_eq!(after_first, after_second);

    let h = Hierarchy::load(root.path()).unwrap();
    assert_eq!(h.definitions().len(), 1);
}

#[test]
fn existing_definitions_survive_import() {
    let root = tempfile::tempdir().unwrap();
    let layout = HierarchyLayout::new(root.path());
    write(
        &layout.lib_dir().join("00-base.yaml"),
        "network:\n  version: 2\n  ethernets:\n    lo0:\n      dhcp4: false\n      mtu: 9000\n  vlans:\n    vlan10:\n      id: 10\n      link: lo0\n",
    );
    let before = Hierarchy::load(root.path()).unwrap();

    let kf = keyfile(
        root.path(),
        "wired.nmconnection",
        &format!("[connection]\nuuid={ETH_UUID}\ntype=ethernet\n"),
    );
    import(root.path(), &kf).unwrap();

    let after = Hierarchy::load(root.path()).unwrap();
    for id in ["lo0", "vlan10"] {
        assert_eq!(
            before.definitions().by_id(id),
            after.definitions().by_id(id),
            "{id} must be unchanged"
        );
    }
    assert_eq!(after.definitions().len(), 3);
}

#[test]
fn parse_failure_writes_nothing() {
    let root = tempfile::tempdir().unwrap();
    let layout = HierarchyLayout::new(root.path());
    write(
        &layout.etc_dir().join("10-a.yaml"),
        "network:\n  ethernets:\n    eth0: {}\n",
    );
    let before = snapshot(root.path());

    let kf = keyfile(root.path(), "broken.nmconnection", "type=ethernet\n");
    assert!(matches!(import(root.path(), &kf), Err(CoreError::Schema(_))));
    assert_eq!(snapshot(root.path()), before);
}

#[test]
fn kind_change_is_rejected_without_writes() {
    let root = tempfile::tempdir().unwrap();
    let layout = HierarchyLayout::new(root.path());
    write(
        &layout.etc_dir().join("10-a.yaml"),
        &format!("network:\n  bonds:\n    NM-{ETH_UUID}: {{}}\n"),
    );
    let before = snapshot(root.path());

    let kf = keyfile(
        root.path(),
        "wired.nmconnection",
        &format!("[connection]\nuuid={ETH_UUID}\ntype=ethernet\n"),
    );
    assert!(import(root.path(), &kf).is_err());
    assert_eq!(snapshot(root.path()), before);
}

#[test]
fn broken_hierarchy_aborts_import() {
    let root = tempfile::tempdir().unwrap();
    let layout = HierarchyLayout::new(root.path());
    write(&layout.etc_dir().join("10-a.yaml"), "network: [\n");
    let kf = keyfile(
        root.path(),
        "wired.nmconnection",
        &format!("[connection]\nuuid={ETH_UUID}\ntype=ethernet\n"),
    );
    let err = import(root.path(), &kf).unwrap_err();
    assert!(matches!(err, CoreError::Store(ref e) if e.is_parse()));
    assert!(!layout.etc_dir().join(format!("90-NM-{ETH_UUID}.yaml")).exists());
}

#[test]
fn delete_removes_exactly_the_imported_wifi() {
    let root = tempfile::tempdir().unwrap();
    let layout = HierarchyLayout::new(root.path());
    write(
        &layout.etc_dir().join("10-a.yaml"),
        "network:\n  ethernets:\n    eth0: {dhcp4: true}\n",
    );
    let generated = PathBuf::from(format!(
        "{}{NM_CONNECTIONS_PREFIX}wl0-MyWifi.nmconnection",
        root.path().display()
    ));
    write(
        &generated,
        "[connection]\nid=MyWifi\nuuid=f00d\ntype=wifi\n\n[wifi]\nssid=MyWifi\nmode=infrastructure\n",
    );

    let imported = import(root.path(), &generated).unwrap();
    assert_eq!(imported.id, "wl0");
    assert_eq!(imported.filename, "90-NM-f00d.yaml");

    let outcome = Engine::new(ImportConfig::new(root.path(), &generated).with_mode(Mode::Delete))
        .delete()
        .unwrap();
    assert_eq!(outcome.id, imported.id);

    let h = Hierarchy::load(root.path()).unwrap();
    assert!(h.definitions().by_id("wl0").is_none());
    assert!(h.definitions().by_id("eth0").is_some());
    assert!(!layout.etc_dir().join("90-NM-f00d.yaml").exists());
}

#[test]
fn delete_of_unknown_definition_is_lookup_error() {
    let root = tempfile::tempdir().unwrap();
    let generated = PathBuf::from(format!(
        "{}{NM_CONNECTIONS_PREFIX}eth5.nmconnection",
        root.path().display()
    ));
    let err = Engine::new(ImportConfig::new(root.path(), &generated).with_mode(Mode::Delete))
        .run()
        .unwrap_err();
    assert!(matches!(err, CoreError::DefinitionNotFound(id) if id == "eth5"));
}
