use crate::types::{DefIndex, DefinitionKind};
use crate::SchemaError;
use serde_yaml::Mapping;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One interface's configuration.
///
/// `bond` and `bridge` are the parent names as declared by the owner of this
/// definition. `bond_link` and `bridge_link` are the resolved parents; they
/// index into the enclosing `DefinitionSet` and are never written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub id: String,
    pub kind: DefinitionKind,
    pub renderer: Option<String>,
    pub bond: Option<String>,
    pub bridge: Option<String>,
    pub bond_link: Option<DefIndex>,
    pub bridge_link: Option<DefIndex>,
    /// Set when the definition came from a NetworkManager keyfile.
    pub backend_origin_uuid: Option<String>,
    /// NetworkManager's human readable `connection.id`.
    pub connection_name: Option<String>,
    /// Foreign settings without a native counterpart, keyed `group.key`.
    pub passthrough: BTreeMap<String, String>,
    /// Wireless network name (SSID). Only meaningful for wifi definitions.
    pub network_name: Option<String>,
    /// Keys the model does not interpret, preserved verbatim in file order.
    pub settings: Mapping,
    /// Layer file this definition was loaded from or will be written to.
    pub origin: Option<PathBuf>,
}

impl Definition {
    pub fn new(id: impl Into<String>, kind: DefinitionKind) -> Self {
        Self {
            id: id.into(),
            kind,
            renderer: None,
            bond: None,
            bridge: None,
            bond_link: None,
            bridge_link: None,
            backend_origin_uuid: None,
            connection_name: None,
            passthrough: BTreeMap::new(),
            network_name: None,
            settings: Mapping::new(),
            origin: None,
        }
    }

    /// Whether any NetworkManager backend settings are present.
    pub fn has_backend_settings(&self) -> bool {
        self.backend_origin_uuid.is_some()
            || self.connection_name.is_some()
            || !self.passthrough.is_empty()
    }

    /// Apply a higher-precedence layer's view of the same definition.
    ///
    /// Fields set in `higher` win; preserved settings are merged key by key.
    pub fn overlay(&mut self, higher: Definition) -> Result<(), SchemaError> {
        if higher.kind != self.kind {
            return Err(SchemaError::ConflictingDefinition {
                id: self.id.clone(),
                existing: self.kind,
                incoming: higher.kind,
            });
        }
        if higher.renderer.is_some() {
            self.renderer = higher.renderer;
        }
        if higher.bond.is_some() {
            self.bond = higher.bond;
        }
        if higher.bridge.is_some() {
            self.bridge = higher.bridge;
        }
        if higher.backend_origin_uuid.is_some() {
            self.backend_origin_uuid = higher.backend_origin_uuid;
        }
        if higher.connection_name.is_some() {
            self.connection_name = higher.connection_name;
        }
        if higher.network_name.is_some() {
            self.network_name = higher.network_name;
        }
        self.passthrough.extend(higher.passthrough);
        for (key, value) in higher.settings {
            self.settings.insert(key, value);
        }
        self.origin = higher.origin;
        Ok(())
    }
}

/// Outcome of `DefinitionSet::upsert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
}

/// Ordered arena of definitions with an id index.
///
/// Insertion order is preserved and significant. Links between definitions
/// are `DefIndex` values into this arena.
#[derive(Debug, Clone, Default)]
pub struct DefinitionSet {
    defs: Vec<Definition>,
    index: BTreeMap<String, DefIndex>,
}

impl DefinitionSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DefIndex, &Definition)> {
        self.defs.iter().enumerate().map(|(i, d)| (DefIndex(i), d))
    }

    pub fn indices(&self) -> impl Iterator<Item = DefIndex> {
        (0..self.defs.len()).map(DefIndex)
    }

    #[inline]
    pub fn get(&self, idx: DefIndex) -> &Definition {
        &self.defs[idx.0]
    }

    #[inline]
    pub fn get_mut(&mut self, idx: DefIndex) -> &mut Definition {
        &mut self.defs[idx.0]
    }

    pub fn lookup(&self, id: &str) -> Option<DefIndex> {
        self.index.get(id).copied()
    }

    pub fn by_id(&self, id: &str) -> Option<&Definition> {
        self.lookup(id).map(|idx| self.get(idx))
    }

    /// The most recently added definition.
    pub fn last(&self) -> Option<DefIndex> {
        self.defs.len().checked_sub(1).map(DefIndex)
    }

    /// Add a definition with a fresh id. A colliding id is an error.
    pub fn insert(&mut self, def: Definition) -> Result<DefIndex, SchemaError> {
        if self.index.contains_key(&def.id) {
            return Err(SchemaError::DuplicateDefinition(def.id));
        }
        let idx = DefIndex(self.defs.len());
        self.index.insert(def.id.clone(), idx);
        self.defs.push(def);
        Ok(idx)
    }

    /// Add a definition, or replace the stored content of the same id.
    ///
    /// Replacement happens in place so existing links stay valid. The
    /// replaced definition's own links are cleared; changing the kind of an
    /// existing id is a conflict.
    pub fn upsert(&mut self, mut def: Definition) -> Result<(DefIndex, Upsert), SchemaError> {
        let Some(idx) = self.lookup(&def.id) else {
            return Ok((self.insert(def)?, Upsert::Created));
        };
        let existing = self.get(idx);
        if existing.kind != def.kind {
            return Err(SchemaError::ConflictingDefinition {
                id: def.id,
                existing: existing.kind,
                incoming: def.kind,
            });
        }
        def.bond_link = None;
        def.bridge_link = None;
        self.defs[idx.0] = def;
        Ok((idx, Upsert::Updated))
    }

    /// Remove a definition by id.
    ///
    /// Links pointing at the removed definition are cleared; members keep
    /// their declared parent name. Indices after the removed slot shift down.
    pub fn remove(&mut self, id: &str) -> Option<Definition> {
        let removed_at = self.index.remove(id)?.0;
        let removed = self.defs.remove(removed_at);

        let shift = |link: Option<DefIndex>| match link {
            Some(DefIndex(i)) if i == removed_at => None,
            Some(DefIndex(i)) if i > removed_at => Some(DefIndex(i - 1)),
            other => other,
        };
        for def in &mut self.defs {
            def.bond_link = shift(def.bond_link);
            def.bridge_link = shift(def.bridge_link);
        }
        for idx in self.index.values_mut() {
            if idx.0 > removed_at {
                idx.0 -= 1;
            }
        }
        Some(removed)
    }
}
