use std::path::PathBuf;

/// What an invocation does with its keyfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Import,
    Delete,
}

/// Immutable settings for one invocation, built once from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    /// Root the hierarchy lives under (`/` in production).
    pub root_dir: PathBuf,
    pub keyfile: PathBuf,
    pub mode: Mode,
    /// Install the syscall filter before touching any file.
    pub confine: bool,
}

impl ImportConfig {
    pub fn new(root_dir: impl Into<PathBuf>, keyfile: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            keyfile: keyfile.into(),
            mode: Mode::Import,
            confine: false,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn confined(mut self, confine: bool) -> Self {
        self.confine = confine;
        self
    }
}
