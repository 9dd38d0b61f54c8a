//! Definition model, keyfile grammar, naming rules, and hierarchy codec for nmplan.
//!
//! This crate defines the schema layer: the `Definition` record and the
//! `DefinitionSet` arena that holds one per id, the NetworkManager keyfile
//! grammar (`KeyFile`) and its mapping onto a `Definition`, the shared
//! identity derivation used by both import and delete, the output filename
//! policy, parent/member link resolution, and the YAML codec for one layer
//! file of the hierarchy.

pub mod definition;
pub mod identity;
pub mod import;
pub mod keyfile;
pub mod naming;
pub mod resolve;
pub mod types;
pub mod yaml;

pub use definition::{Definition, DefinitionSet, Upsert};
pub use identity::{derive_id, id_from_connection_path, percent_escape, NM_CONNECTIONS_PREFIX};
pub use import::{import_keyfile, import_keyfile_str, read_identity, KeyfileIdentity};
pub use keyfile::KeyFile;
pub use naming::{filename_for, nm_connection_filename, NAME_MAX};
pub use resolve::{resolve_all, resolve_imported, Resolution};
pub use types::{DefIndex, DefinitionKind};
pub use yaml::{parse_layer_str, render_layer, Layer, LayerEntry};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read keyfile: {0}")]
    Io(#[from] std::io::Error),
    #[error("keyfile parse error at line {line}: {reason}")]
    KeyfileSyntax { line: usize, reason: String },
    #[error("keyfile is missing mandatory field '{0}'")]
    MissingField(&'static str),
    #[error("cannot derive a definition id for keyfile '{0}'")]
    UnderivableId(String),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid hierarchy document: {0}")]
    InvalidDocument(String),
    #[error("definition '{0}' is already present in the set")]
    DuplicateDefinition(String),
    #[error("definition '{id}' changes type from {existing} to {incoming}")]
    ConflictingDefinition {
        id: String,
        existing: DefinitionKind,
        incoming: DefinitionKind,
    },
    #[error("{parent}: interface '{member}' is not defined")]
    UndefinedMember { parent: String, member: String },
    #[error("{member}: interface is already assigned to '{existing}', cannot join '{parent}'")]
    MemberReassigned {
        member: String,
        existing: String,
        parent: String,
    },
    #[error(transparent)]
    Naming(#[from] NamingError),
}

/// Failure to compute an output or identity name within bounds.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamingError {
    #[error("cannot compute a name: field '{0}' is empty")]
    EmptyField(&'static str),
    #[error("'{0}' contains a character that is not allowed in a file name")]
    InvalidCharacter(String),
    #[error("computed name is {len} bytes, limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("'{0}' is not a netplan-generated NetworkManager connection path")]
    NotGeneratedPath(String),
}
