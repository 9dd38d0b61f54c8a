//! Parent/member link resolution.
//!
//! Members name their bond or bridge by id. Resolution turns those names into
//! `DefIndex` links so writers can list an aggregation device's members
//! without searching by name. Name comparison is exact and case-sensitive.

use crate::definition::DefinitionSet;
use crate::types::DefIndex;
use tracing::debug;

/// Links established by [`resolve_imported`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Links from the imported definition to an existing parent.
    pub forward: usize,
    /// Links from existing members to the imported definition.
    pub reverse: usize,
}

/// Resolve links around a freshly imported definition.
///
/// The import may bring in a member whose parent already exists (forward),
/// or a parent that existing members already name (reverse). Both are
/// handled in one call.
pub fn resolve_imported(set: &mut DefinitionSet, imported: DefIndex) -> Resolution {
    let mut resolution = Resolution::default();

    let (bond, bridge) = {
        let def = set.get(imported);
        (def.bond.clone(), def.bridge.clone())
    };
    let bond_link = bond.and_then(|name| parent_of(set, imported, &name));
    let bridge_link = bridge.and_then(|name| parent_of(set, imported, &name));
    resolution.forward += usize::from(bond_link.is_some()) + usize::from(bridge_link.is_some());
    {
        let def = set.get_mut(imported);
        def.bond_link = bond_link;
        def.bridge_link = bridge_link;
    }

    let imported_id = set.get(imported).id.clone();
    let others: Vec<DefIndex> = set.indices().filter(|&i| i != imported).collect();
    for idx in others {
        let def = set.get_mut(idx);
        if def.bond.as_deref() == Some(imported_id.as_str()) {
            def.bond_link = Some(imported);
            resolution.reverse += 1;
        }
        if def.bridge.as_deref() == Some(imported_id.as_str()) {
            def.bridge_link = Some(imported);
            resolution.reverse += 1;
        }
    }

    debug!(
        "resolved '{imported_id}': {} forward, {} reverse link(s)",
        resolution.forward, resolution.reverse
    );
    resolution
}

/// Resolve every declared parent in the set from scratch.
pub fn resolve_all(set: &mut DefinitionSet) {
    let all: Vec<DefIndex> = set.indices().collect();
    for idx in all {
        let (bond, bridge) = {
            let def = set.get(idx);
            (def.bond.clone(), def.bridge.clone())
        };
        let bond_link = bond.and_then(|name| parent_of(set, idx, &name));
        let bridge_link = bridge.and_then(|name| parent_of(set, idx, &name));
        let def = set.get_mut(idx);
        def.bond_link = bond_link;
        def.bridge_link = bridge_link;
    }
}

fn parent_of(set: &DefinitionSet, member: DefIndex, name: &str) -> Option<DefIndex> {
    set.lookup(name).filter(|&parent| parent != member)
}
