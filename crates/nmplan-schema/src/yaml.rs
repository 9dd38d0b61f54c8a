//! YAML codec for one layer file of the hierarchy.
//!
//! ```yaml
//! network:
//!   version: 2
//!   ethernets:
//!     eth0: {dhcp4: true}
//!   bonds:
//!     bond0:
//!       interfaces: [eth0]
//! ```
//!
//! Aggregation devices list their resolved members under `interfaces`. A
//! member whose parent is not resolved keeps the declared name as `bond:` or
//! `bridge:` so nothing is lost on write-back. Keys under `network:` that are
//! not definition sections are kept opaque and written back unchanged.

use crate::definition::{Definition, DefinitionSet};
use crate::types::{DefIndex, DefinitionKind};
use crate::SchemaError;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct LayerDocument {
    #[serde(default)]
    network: Option<Mapping>,
}

/// One definition as read from a single layer file.
#[derive(Debug, Clone)]
pub struct LayerEntry {
    pub definition: Definition,
    /// Member ids listed under `interfaces` of a bond or bridge.
    pub interfaces: Vec<String>,
}

/// Content of one layer file.
#[derive(Debug, Clone, Default)]
pub struct Layer {
    pub entries: Vec<LayerEntry>,
    /// `network:` keys that are neither definition sections nor `version`
    /// or `renderer`.
    pub extra: Mapping,
}

/// Parse a layer file. Every definition's origin is set to `origin`.
pub fn parse_layer_str(input: &str, origin: &Path) -> Result<Layer, SchemaError> {
    if input.trim().is_empty() {
        return Ok(Layer::default());
    }
    let doc: LayerDocument = serde_yaml::from_str(input)?;
    let Some(network) = doc.network else {
        return Ok(Layer::default());
    };

    let mut default_renderer = None;
    let mut sections = Vec::new();
    let mut extra = Mapping::new();
    for (key, value) in network {
        let name = key
            .as_str()
            .ok_or_else(|| invalid("non-string key under 'network'"))?;
        match name {
            "version" => match value.as_u64() {
                Some(2) => {}
                _ => return Err(invalid("only 'version: 2' is supported")),
            },
            "renderer" => default_renderer = Some(scalar_string(&value)?),
            section => match DefinitionKind::from_section(section) {
                Some(kind) => sections.push((kind, value)),
                None => {
                    debug!("keeping opaque key 'network.{section}'");
                    extra.insert(key, value);
                }
            },
        }
    }

    let mut seen = BTreeSet::new();
    let mut entries = Vec::new();
    for (kind, value) in sections {
        for (id, body) in mapping_or_empty(value, kind.section())? {
            let id = id
                .as_str()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| invalid(&format!("invalid id under '{}'", kind.section())))?
                .to_owned();
            if !seen.insert(id.clone()) {
                return Err(SchemaError::DuplicateDefinition(id));
            }
            let mut entry = entry_from_body(id, kind, body, origin)?;
            if entry.definition.renderer.is_none() {
                entry.definition.renderer.clone_from(&default_renderer);
            }
            entries.push(entry);
        }
    }
    Ok(Layer { entries, extra })
}

fn entry_from_body(
    id: String,
    kind: DefinitionKind,
    body: Value,
    origin: &Path,
) -> Result<LayerEntry, SchemaError> {
    let mut def = Definition::new(id, kind);
    def.origin = Some(origin.to_path_buf());
    let mut interfaces = Vec::new();

    let label = def.id.clone();
    for (key, value) in mapping_or_empty(body, &label)? {
        match key.as_str() {
            Some("renderer") => def.renderer = Some(scalar_string(&value)?),
            Some("bond") => def.bond = Some(scalar_string(&value)?),
            Some("bridge") => def.bridge = Some(scalar_string(&value)?),
            Some("interfaces")
                if matches!(kind, DefinitionKind::Bond | DefinitionKind::Bridge) =>
            {
                interfaces = string_list(&value, &label)?;
            }
            Some("networkmanager") => lift_backend(&mut def, value)?,
            Some("access-points") if kind == DefinitionKind::Wifi => {
                let aps = lift_access_points(&mut def, value)?;
                def.settings.insert(key, aps);
            }
            _ => {
                def.settings.insert(key, value);
            }
        }
    }

    Ok(LayerEntry {
        definition: def,
        interfaces,
    })
}

fn lift_backend(def: &mut Definition, value: Value) -> Result<(), SchemaError> {
    let label = format!("{}.networkmanager", def.id);
    for (key, value) in mapping_or_empty(value, &label)? {
        match key.as_str() {
            Some("uuid") => def.backend_origin_uuid = Some(scalar_string(&value)?),
            Some("name") => def.connection_name = Some(scalar_string(&value)?),
            Some("passthrough") => {
                for (group, inner) in mapping_or_empty(value, &label)? {
                    let group = scalar_string(&group)?;
                    if let Value::Mapping(keys) = inner {
                        for (k, v) in keys {
                            def.passthrough
                                .insert(format!("{group}.{}", scalar_string(&k)?), scalar_string(&v)?);
                        }
                    } else {
                        def.passthrough.insert(group, scalar_string(&inner)?);
                    }
                }
            }
            _ => {
                return Err(invalid(&format!(
                    "unknown key '{}' in {label}",
                    scalar_string(&key)?
                )))
            }
        }
    }
    Ok(())
}

/// Take the backend block out of the access point that carries it, and pick
/// the network name: that access point, or the only one defined.
fn lift_access_points(def: &mut Definition, value: Value) -> Result<Value, SchemaError> {
    let label = format!("{}.access-points", def.id);
    let aps = mapping_or_empty(value, &label)?;
    let only = if aps.len() == 1 {
        aps.iter().next().map(|(k, _)| k.clone())
    } else {
        None
    };

    let mut out = Mapping::new();
    let mut lifted = false;
    for (ssid, ap) in aps {
        let ap = match ap {
            Value::Mapping(ap) => ap,
            other => {
                out.insert(ssid, other);
                continue;
            }
        };
        let mut rest = Mapping::new();
        for (key, value) in ap {
            if !lifted && key.as_str() == Some("networkmanager") {
                lift_backend(def, value)?;
                def.network_name = Some(scalar_string(&ssid)?);
                lifted = true;
            } else {
                rest.insert(key, value);
            }
        }
        out.insert(ssid, Value::Mapping(rest));
    }
    if !lifted {
        if let Some(ssid) = only {
            def.network_name = Some(scalar_string(&ssid)?);
        }
    }
    Ok(Value::Mapping(out))
}

/// Render the given definitions of `set` as one layer file, followed by the
/// file's opaque `extra` keys.
///
/// `entries` must all belong to the same file; membership lists are computed
/// from links across the whole set.
pub fn render_layer(
    set: &DefinitionSet,
    entries: &[DefIndex],
    extra: &Mapping,
) -> Result<String, SchemaError> {
    let mut network = Mapping::new();
    network.insert("version".into(), Value::from(2u64));
    for kind in DefinitionKind::ALL {
        let mut section = Mapping::new();
        for &idx in entries.iter().filter(|&&i| set.get(i).kind == kind) {
            let def = set.get(idx);
            section.insert(def.id.as_str().into(), Value::Mapping(body_for(set, idx)));
        }
        if !section.is_empty() {
            network.insert(kind.section().into(), Value::Mapping(section));
        }
    }
    for (key, value) in extra {
        network.insert(key.clone(), value.clone());
    }

    let mut doc = Mapping::new();
    doc.insert("network".into(), Value::Mapping(network));
    Ok(serde_yaml::to_string(&Value::Mapping(doc))?)
}

fn body_for(set: &DefinitionSet, idx: DefIndex) -> Mapping {
    let def = set.get(idx);
    let wifi_ap = def.kind == DefinitionKind::Wifi && def.network_name.is_some();
    let mut body = Mapping::new();

    if let Some(renderer) = &def.renderer {
        body.insert("renderer".into(), renderer.as_str().into());
    }

    let mut wrote_aps = false;
    for (key, value) in &def.settings {
        if wifi_ap && key.as_str() == Some("access-points") {
            body.insert(key.clone(), access_points_for(def, Some(value)));
            wrote_aps = true;
        } else {
            body.insert(key.clone(), value.clone());
        }
    }
    if wifi_ap && !wrote_aps {
        body.insert("access-points".into(), access_points_for(def, None));
    }

    if let Some(bond) = &def.bond {
        if !linked_to(set, def.bond_link, DefinitionKind::Bond) {
            body.insert("bond".into(), bond.as_str().into());
        }
    }
    if let Some(bridge) = &def.bridge {
        if !linked_to(set, def.bridge_link, DefinitionKind::Bridge) {
            body.insert("bridge".into(), bridge.as_str().into());
        }
    }

    let members: Vec<Value> = set
        .iter()
        .filter(|(_, d)| match def.kind {
            DefinitionKind::Bond => d.bond_link == Some(idx),
            DefinitionKind::Bridge => d.bridge_link == Some(idx),
            _ => false,
        })
        .map(|(_, d)| Value::from(d.id.as_str()))
        .collect();
    if !members.is_empty() {
        body.insert("interfaces".into(), Value::Sequence(members));
    }

    if def.has_backend_settings() && !wifi_ap {
        body.insert("networkmanager".into(), backend_block(def));
    }
    body
}

fn linked_to(set: &DefinitionSet, link: Option<DefIndex>, kind: DefinitionKind) -> bool {
    link.is_some_and(|parent| set.get(parent).kind == kind)
}

fn access_points_for(def: &Definition, existing: Option<&Value>) -> Value {
    let mut aps = existing
        .and_then(Value::as_mapping)
        .cloned()
        .unwrap_or_default();
    if let Some(ssid) = &def.network_name {
        let key = Value::from(ssid.as_str());
        let mut ap = aps
            .get(&key)
            .and_then(Value::as_mapping)
            .cloned()
            .unwrap_or_default();
        if def.has_backend_settings() {
            ap.insert("networkmanager".into(), backend_block(def));
        }
        aps.insert(key, Value::Mapping(ap));
    }
    Value::Mapping(aps)
}

fn backend_block(def: &Definition) -> Value {
    let mut nm = Mapping::new();
    if let Some(uuid) = &def.backend_origin_uuid {
        nm.insert("uuid".into(), uuid.as_str().into());
    }
    if let Some(name) = &def.connection_name {
        nm.insert("name".into(), name.as_str().into());
    }
    if !def.passthrough.is_empty() {
        let passthrough = def
            .passthrough
            .iter()
            .map(|(k, v)| (Value::from(k.as_str()), Value::from(v.as_str())))
            .collect();
        nm.insert("passthrough".into(), Value::Mapping(passthrough));
    }
    Value::Mapping(nm)
}

fn mapping_or_empty(value: Value, what: &str) -> Result<Mapping, SchemaError> {
    match value {
        Value::Mapping(m) => Ok(m),
        Value::Null => Ok(Mapping::new()),
        _ => Err(invalid(&format!("'{what}' must be a mapping"))),
    }
}

fn string_list(value: &Value, what: &str) -> Result<Vec<String>, SchemaError> {
    let Some(seq) = value.as_sequence() else {
        return Err(invalid(&format!("'{what}.interfaces' must be a list")));
    };
    seq.iter().map(scalar_string).collect()
}

fn scalar_string(value: &Value) -> Result<String, SchemaError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(invalid("expected a scalar value")),
    }
}

fn invalid(reason: &str) -> SchemaError {
    SchemaError::InvalidDocument(reason.to_owned())
}
