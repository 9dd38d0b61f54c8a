use crate::CoreError;
use nmplan_schema::{derive_id, read_identity, DefinitionSet};
use std::path::Path;
use tracing::debug;

/// Id of the definition a deletion request for `keyfile` refers to.
///
/// Uses the same derivation as import, so a profile that was imported from
/// this path maps back to the same definition. The keyfile may already be
/// gone; then only the generated-path rule can apply. Any failure aborts the
/// deletion.
pub fn deletion_target(keyfile: &Path, context: &DefinitionSet) -> Result<String, CoreError> {
    let identity = read_identity(keyfile)?;
    let id = derive_id(
        keyfile,
        identity.network_name.as_deref(),
        identity.uuid.as_deref(),
        Some(context),
    )?;
    debug!("deletion of {} targets '{id}'", keyfile.display());
    Ok(id)
}
