//! Hierarchy write-back tests against a real directory tree.

use nmplan_schema::{resolve_imported, Definition, DefinitionKind};
use nmplan_store::{Hierarchy, HierarchyLayout, PlannedChange};
use serde_yaml::Value;
use std::fs;
use std::path::Path;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read_yaml(path: &Path) -> Value {
    serde_yaml::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn imported_parent_lists_existing_member() {
    let dir = tempfile::tempdir().unwrap();
    let layout = HierarchyLayout::new(dir.path());
    let base = layout.etc_dir().join("10-base.yaml");
    write(&base, "network:\n  ethernets:\n    eth1:\n      bond: bond0\n");

    let mut h = Hierarchy::load(dir.path()).unwrap();
    let mut bond = Definition::new("bond0", DefinitionKind::Bond);
    bond.backend_origin_uuid = Some("u-1".to_owned());
    let (idx, _) = h.upsert(bond, "90-NM-u-1.yaml").unwrap();
    resolve_imported(h.definitions_mut(), idx);
    h.plan().unwrap().apply().unwrap();

    let written = read_yaml(&layout.etc_dir().join("90-NM-u-1.yaml"));
    let interfaces = &written["network"]["bonds"]["bond0"]["interfaces"];
    assert_eq!(interfaces, &Value::from(vec![Value::from("eth1")]));

    // The member file now relies on the parent's list.
    let member = read_yaml(&base);
    assert!(member["network"]["ethernets"]["eth1"].get("bond").is_none());

    let reloaded = Hierarchy::load(dir.path()).unwrap();
    let set = reloaded.definitions();
    assert_eq!(set.by_id("eth1").unwrap().bond_link, set.lookup("bond0"));
}

#[test]
fn unrelated_files_are_left_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let layout = HierarchyLayout::new(dir.path());
    let hand = layout.lib_dir().join("01-hand.yaml");
    let original = "# keep me\nnetwork:\n  version: 2\n  ethernets:\n    lo0: {dhcp4: false}\n";
    write(&hand, original);

    let mut h = Hierarchy::load(dir.path()).unwrap();
    h.upsert(
        Definition::new("eth3", DefinitionKind::Ethernet),
        "10-netplan-eth3.yaml",
    )
    .unwrap();
    let plan = h.plan().unwrap();
    assert!(plan.changes().iter().all(|c| c.path() != hand.as_path()));
    plan.apply().unwrap();

    assert_eq!(fs::read_to_string(&hand).unwrap(), original);
}

#[test]
fn removing_last_definition_unlinks_file() {
    let dir = tempfile::tempdir().unwrap();
    let layout = HierarchyLayout::new(dir.path());
    let file = layout.run_dir().join("90-NM-abc.yaml");
    write(
        &file,
        "network:\n  ethernets:\n    NM-abc:\n      renderer: NetworkManager\n      networkmanager:\n        uuid: abc\n",
    );

    let mut h = Hierarchy::load(dir.path()).unwrap();
    assert!(h.remove("NM-abc").is_some());
    let plan = h.plan().unwrap();
    assert_eq!(plan.changes(), [PlannedChange::Remove { path: file.clone() }]);
    plan.apply().unwrap();
    assert!(!file.exists());
}

#[test]
fn plan_is_not_written_until_applied() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Hierarchy::load(dir.path()).unwrap();
    h.upsert(
        Definition::new("eth0", DefinitionKind::Ethernet),
        "10-netplan-eth0.yaml",
    )
    .unwrap();
    let plan = h.plan().unwrap();
    assert_eq!(plan.changes().len(), 1);
    assert!(!HierarchyLayout::new(dir.path()).etc_dir().exists());
}
