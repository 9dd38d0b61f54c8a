//! Import and deletion orchestration for nmplan.
//!
//! This crate ties the keyfile importer, the hierarchy store and the sandbox
//! together into the `Engine`: one linear transaction per invocation that
//! loads the hierarchy, merges or removes one definition, resolves
//! parent/member links and writes back only what changed.

pub mod config;
pub mod delete;
pub mod engine;

pub use config::{ImportConfig, Mode};
pub use delete::deletion_target;
pub use engine::{DeleteOutcome, Engine, ImportOutcome, Outcome};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("parse error: {0}")]
    Schema(#[from] nmplan_schema::SchemaError),
    #[error("naming error: {0}")]
    Naming(#[from] nmplan_schema::NamingError),
    #[error("store error: {0}")]
    Store(#[from] nmplan_store::StoreError),
    #[error("sandbox error: {0}")]
    Sandbox(#[from] nmplan_sandbox::SandboxError),
    #[error("definition not found: {0}")]
    DefinitionNotFound(String),
}
