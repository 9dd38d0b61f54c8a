use crate::layout::HierarchyLayout;
use crate::plan::{PlannedChange, WritePlan};
use crate::StoreError;
use nmplan_schema::{
    parse_layer_str, render_layer, resolve_all, DefIndex, Definition, DefinitionKind,
    DefinitionSet, Layer, LayerEntry, SchemaError, Upsert,
};
use serde_yaml::Mapping;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A loaded layer file, the ids it mentions in file order, and its opaque
/// top-level keys.
#[derive(Debug, Clone)]
struct LayerFile {
    path: PathBuf,
    ids: Vec<String>,
    extra: Mapping,
}

/// Membership declared by a parent's `interfaces` list.
struct Membership {
    parent: String,
    kind: DefinitionKind,
    member: String,
    path: PathBuf,
}

/// In-memory snapshot of the whole hierarchy.
///
/// Every definition's `origin` is the highest-precedence file that defines
/// it, which is also where it is written back. The rendering captured right
/// after loading is the baseline that [`plan`](Self::plan) diffs against.
#[derive(Debug)]
pub struct Hierarchy {
    layout: HierarchyLayout,
    files: Vec<LayerFile>,
    definitions: DefinitionSet,
    baseline: BTreeMap<PathBuf, String>,
    touched: BTreeSet<String>,
}

impl Hierarchy {
    /// Load every layer below `root` into one definition set.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let layout = HierarchyLayout::new(root);
        let mut definitions = DefinitionSet::new();
        let mut files = Vec::new();
        let mut memberships = Vec::new();

        for path in layout.discover()? {
            let content = fs::read_to_string(&path)?;
            let Layer { entries, extra } =
                parse_layer_str(&content, &path).map_err(|source| StoreError::Parse {
                    path: path.clone(),
                    source,
                })?;

            let mut ids = Vec::with_capacity(entries.len());
            for LayerEntry {
                definition,
                interfaces,
            } in entries
            {
                ids.push(definition.id.clone());
                memberships.extend(interfaces.into_iter().map(|member| Membership {
                    parent: definition.id.clone(),
                    kind: definition.kind,
                    member,
                    path: path.clone(),
                }));
                let merged = match definitions.lookup(&definition.id) {
                    Some(idx) => definitions.get_mut(idx).overlay(definition),
                    None => definitions.insert(definition).map(|_| ()),
                };
                merged.map_err(|source| StoreError::Parse {
                    path: path.clone(),
                    source,
                })?;
            }
            debug!("loaded {} definition(s) from {}", ids.len(), path.display());
            files.push(LayerFile { path, ids, extra });
        }

        for membership in memberships {
            apply_membership(&mut definitions, membership)?;
        }
        resolve_all(&mut definitions);

        let baseline = render_files(&definitions, &files)?;
        Ok(Self {
            layout,
            files,
            definitions,
            baseline,
            touched: BTreeSet::new(),
        })
    }

    #[inline]
    pub fn layout(&self) -> &HierarchyLayout {
        &self.layout
    }

    #[inline]
    pub fn definitions(&self) -> &DefinitionSet {
        &self.definitions
    }

    /// Mutable access for link resolution. Content changes made through
    /// this handle are picked up by [`plan`](Self::plan) only if they change
    /// a file's rendering.
    #[inline]
    pub fn definitions_mut(&mut self) -> &mut DefinitionSet {
        &mut self.definitions
    }

    /// Layer files found at load time, in application order.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path.as_path())
    }

    /// Path a layer file called `filename` is written to: the existing file
    /// of that name if the hierarchy has one, otherwise a new file in
    /// `etc/netplan`.
    pub fn target_path(&self, filename: &str) -> Result<PathBuf, StoreError> {
        let plain = Path::new(filename).file_name().and_then(|n| n.to_str()) == Some(filename);
        if !plain || !filename.ends_with(".yaml") {
            return Err(StoreError::InvalidFilename(filename.to_owned()));
        }
        let existing = self
            .files
            .iter()
            .find(|f| f.path.file_name().and_then(|n| n.to_str()) == Some(filename));
        Ok(match existing {
            Some(file) => file.path.clone(),
            None => self.layout.etc_dir().join(filename),
        })
    }

    /// Add or replace a definition and place it in the layer file `filename`.
    pub fn upsert(
        &mut self,
        mut def: Definition,
        filename: &str,
    ) -> Result<(DefIndex, Upsert), StoreError> {
        def.origin = Some(self.target_path(filename)?);
        let id = def.id.clone();
        let result = self.definitions.upsert(def)?;
        self.touched.insert(id);
        Ok(result)
    }

    /// Drop a definition from every layer. Returns `None` if `id` is unknown.
    pub fn remove(&mut self, id: &str) -> Option<Definition> {
        let removed = self.definitions.remove(id)?;
        self.touched.insert(id.to_owned());
        Some(removed)
    }

    /// Compute the file changes that bring the disk in line with the set.
    ///
    /// A file is rewritten when its rendering differs from the baseline, or
    /// when it still carries a lower-precedence entry for a changed id.
    /// Rewriting a file drops such overridden entries, so the files owning
    /// them are rewritten as well to keep the merged content.
    pub fn plan(&self) -> Result<WritePlan, StoreError> {
        let mut rendered = render_files(&self.definitions, &self.files)?;

        let mut dirty: BTreeSet<PathBuf> = rendered
            .keys()
            .chain(self.baseline.keys())
            .filter(|path| rendered.get(*path) != self.baseline.get(*path))
            .cloned()
            .collect();
        for file in &self.files {
            let stale = file.ids.iter().any(|id| {
                self.touched.contains(id) && self.owner(id) != Some(file.path.as_path())
            });
            if stale {
                dirty.insert(file.path.clone());
            }
        }

        let mut queue: Vec<PathBuf> = dirty.iter().cloned().collect();
        while let Some(path) = queue.pop() {
            let Some(file) = self.files.iter().find(|f| f.path == path) else {
                continue;
            };
            for id in &file.ids {
                if let Some(owner) = self.owner(id) {
                    if owner != path.as_path() && dirty.insert(owner.to_path_buf()) {
                        queue.push(owner.to_path_buf());
                    }
                }
            }
        }

        let mut changes = Vec::new();
        for path in dirty {
            match rendered.remove(&path) {
                Some(contents) => changes.push(PlannedChange::Write { path, contents }),
                None if self.files.iter().any(|f| f.path == path) => {
                    changes.push(PlannedChange::Remove { path });
                }
                None => {}
            }
        }
        debug!("write plan: {} change(s)", changes.len());
        Ok(WritePlan::new(changes))
    }

    fn owner(&self, id: &str) -> Option<&Path> {
        self.definitions
            .by_id(id)
            .and_then(|d| d.origin.as_deref())
    }
}

fn apply_membership(set: &mut DefinitionSet, m: Membership) -> Result<(), StoreError> {
    let fail = |source: SchemaError| StoreError::Parse {
        path: m.path.clone(),
        source,
    };
    let Some(idx) = set.lookup(&m.member) else {
        return Err(fail(SchemaError::UndefinedMember {
            parent: m.parent.clone(),
            member: m.member.clone(),
        }));
    };
    let def = set.get_mut(idx);
    let slot = if m.kind == DefinitionKind::Bond {
        &mut def.bond
    } else {
        &mut def.bridge
    };
    if let Some(existing) = slot.as_deref() {
        if existing != m.parent {
            return Err(fail(SchemaError::MemberReassigned {
                member: m.member.clone(),
                existing: existing.to_owned(),
                parent: m.parent.clone(),
            }));
        }
    }
    *slot = Some(m.parent);
    Ok(())
}

/// Render each origin file from the definitions it owns. Files with opaque
/// keys are rendered even when they own no definition.
fn render_files(
    set: &DefinitionSet,
    files: &[LayerFile],
) -> Result<BTreeMap<PathBuf, String>, StoreError> {
    let mut groups: BTreeMap<PathBuf, Vec<DefIndex>> = BTreeMap::new();
    for (idx, def) in set.iter() {
        let origin = def
            .origin
            .clone()
            .ok_or_else(|| StoreError::Unplaced(def.id.clone()))?;
        groups.entry(origin).or_default().push(idx);
    }
    for file in files.iter().filter(|f| !f.extra.is_empty()) {
        groups.entry(file.path.clone()).or_default();
    }

    let empty = Mapping::new();
    groups
        .into_iter()
        .map(|(path, entries)| {
            let extra = files
                .iter()
                .find(|f| f.path == path)
                .map_or(&empty, |f| &f.extra);
            Ok((path, render_layer(set, &entries, extra)?))
        })
        .collect()
}
