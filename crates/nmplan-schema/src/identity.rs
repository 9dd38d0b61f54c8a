//! Definition id derivation shared by import and delete.
//!
//! Both directions must agree on the id for a given keyfile path, otherwise a
//! delete request targets the wrong definition or none at all. Everything that
//! maps a path to an id goes through [`id_from_connection_path`].

use crate::definition::DefinitionSet;
use crate::naming::validate_component;
use crate::{NamingError, SchemaError};
use std::path::Path;
use tracing::debug;

/// Location prefix of connection profiles generated from the hierarchy.
pub const NM_CONNECTIONS_PREFIX: &str = "/run/NetworkManager/system-connections/netplan-";
const NM_CONNECTION_SUFFIX: &str = ".nmconnection";

/// URI-escape ASCII outside the unreserved set (`A-Z a-z 0-9 - . _ ~`).
/// Non-ASCII characters are kept as UTF-8, the way NetworkManager names the
/// profiles it writes.
pub fn percent_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if !c.is_ascii() || c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~') {
            out.push(c);
        } else {
            let byte = c as u8;
            out.push('%');
            out.push(char::from(HEX[usize::from(byte >> 4)]));
            out.push(char::from(HEX[usize::from(byte & 0x0f)]));
        }
    }
    out
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Extract the definition id from a generated connection path.
///
/// `<...>/run/NetworkManager/system-connections/netplan-<ID>[-<SSID>].nmconnection`
/// where `<SSID>` is percent-escaped and only present for wireless profiles.
pub fn id_from_connection_path(path: &Path, ssid: Option<&str>) -> Result<String, NamingError> {
    let not_generated = || NamingError::NotGeneratedPath(path.display().to_string());

    let text = path.to_str().ok_or_else(not_generated)?;
    let start = text.rfind(NM_CONNECTIONS_PREFIX).ok_or_else(not_generated)?
        + NM_CONNECTIONS_PREFIX.len();
    let tail = &text[start..];

    let id = match ssid {
        Some(ssid) => {
            let suffix = format!("-{}{NM_CONNECTION_SUFFIX}", percent_escape(ssid));
            tail.strip_suffix(suffix.as_str())
        }
        None => tail.strip_suffix(NM_CONNECTION_SUFFIX),
    }
    .ok_or_else(not_generated)?;

    validate_component("id", id)?;
    Ok(id.to_owned())
}

/// Derive the id an imported keyfile maps to.
///
/// Rules, first match wins: the generated-path rule, an existing definition
/// in `context` carrying the same `uuid`, then `NM-<uuid>`.
pub fn derive_id(
    path: &Path,
    ssid: Option<&str>,
    uuid: Option<&str>,
    context: Option<&DefinitionSet>,
) -> Result<String, SchemaError> {
    match id_from_connection_path(path, ssid) {
        Ok(id) => return Ok(id),
        Err(NamingError::NotGeneratedPath(_)) => {}
        Err(e) => return Err(e.into()),
    }

    let Some(uuid) = uuid.filter(|u| !u.is_empty()) else {
        return Err(SchemaError::UnderivableId(path.display().to_string()));
    };

    if let Some(set) = context {
        let existing = set
            .iter()
            .find(|(_, d)| d.backend_origin_uuid.as_deref() == Some(uuid));
        if let Some((_, def)) = existing {
            debug!("uuid {uuid} already belongs to '{}'", def.id);
            return Ok(def.id.clone());
        }
    }

    let id = format!("NM-{uuid}");
    validate_component("id", &id)?;
    Ok(id)
}
