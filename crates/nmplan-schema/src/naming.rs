//! Output file naming.
//!
//! Definitions that came from a NetworkManager keyfile are written to the
//! highest-precedence layer (`90-NM-<uuid>.yaml`) so they override statically
//! authored configuration; everything else goes to the default layer
//! (`10-netplan-<id>.yaml`). Names are never truncated: anything that does not
//! fit is a [`NamingError`].

use crate::definition::Definition;
use crate::identity::percent_escape;
use crate::NamingError;

/// Longest file name most Linux filesystems accept.
pub const NAME_MAX: usize = 255;

/// Growable name buffer that refuses to exceed its bound.
struct NameBuilder {
    buf: String,
    max: usize,
}

impl NameBuilder {
    fn new(max: usize) -> Self {
        Self {
            buf: String::new(),
            max,
        }
    }

    fn push(mut self, part: &str) -> Result<Self, NamingError> {
        let len = self.buf.len() + part.len();
        if len > self.max {
            return Err(NamingError::TooLong { len, max: self.max });
        }
        self.buf.push_str(part);
        Ok(self)
    }

    fn finish(self) -> String {
        self.buf
    }
}

/// Check that `value` can be embedded in a single path component.
pub(crate) fn validate_component(field: &'static str, value: &str) -> Result<(), NamingError> {
    if value.is_empty() {
        return Err(NamingError::EmptyField(field));
    }
    if value.contains('/') || value.chars().any(char::is_control) || value == "." || value == ".."
    {
        return Err(NamingError::InvalidCharacter(value.to_owned()));
    }
    if value.len() > NAME_MAX {
        return Err(NamingError::TooLong {
            len: value.len(),
            max: NAME_MAX,
        });
    }
    Ok(())
}

/// Compute the layer file name a definition is persisted to.
pub fn filename_for(def: &Definition) -> Result<String, NamingError> {
    let builder = NameBuilder::new(NAME_MAX);
    let name = if let Some(uuid) = def.backend_origin_uuid.as_deref() {
        validate_component("uuid", uuid)?;
        builder.push("90-NM-")?.push(uuid)?.push(".yaml")?
    } else {
        validate_component("id", &def.id)?;
        builder.push("10-netplan-")?.push(&def.id)?.push(".yaml")?
    };
    Ok(name.finish())
}

/// File name of the connection profile generated for `id`, the inverse of
/// [`crate::id_from_connection_path`].
pub fn nm_connection_filename(id: &str, ssid: Option<&str>) -> Result<String, NamingError> {
    validate_component("id", id)?;
    let mut builder = NameBuilder::new(NAME_MAX).push("netplan-")?.push(id)?;
    if let Some(ssid) = ssid {
        if ssid.is_empty() {
            return Err(NamingError::EmptyField("ssid"));
        }
        builder = builder.push("-")?.push(&percent_escape(ssid))?;
    }
    Ok(builder.push(".nmconnection")?.finish())
}
