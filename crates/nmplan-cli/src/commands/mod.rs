pub mod delete;
pub mod import;

use nmplan_core::{CoreError, Engine, Outcome};
use nmplan_schema::SchemaError;
use std::io;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_PARSE_ERROR: u8 = 2;
pub const EXIT_STORE_ERROR: u8 = 3;
pub const EXIT_SANDBOX_ERROR: u8 = 4;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("failed to write to stdout: {0}")]
    Output(#[from] io::Error),
}

impl CommandError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Core(e) => exit_code(e),
            Self::Output(_) => EXIT_FAILURE,
        }
    }
}

/// Run the engine's configured operation and report its outcome.
pub fn run(engine: &Engine) -> Result<u8, CommandError> {
    match engine.run()? {
        Outcome::Imported(outcome) => Ok(import::report(&outcome)?),
        Outcome::Deleted(outcome) => Ok(delete::report(&outcome)),
    }
}

pub fn exit_code(err: &CoreError) -> u8 {
    match err {
        CoreError::Schema(SchemaError::Naming(_))
        | CoreError::Naming(_)
        | CoreError::DefinitionNotFound(_) => EXIT_FAILURE,
        CoreError::Schema(_) => EXIT_PARSE_ERROR,
        CoreError::Store(e) if e.is_parse() => EXIT_PARSE_ERROR,
        CoreError::Store(_) => EXIT_STORE_ERROR,
        CoreError::Sandbox(_) => EXIT_SANDBOX_ERROR,
    }
}
