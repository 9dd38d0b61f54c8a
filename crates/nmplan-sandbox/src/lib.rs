//! Seccomp-BPF sandbox for nmplan.
//!
//! A `SandboxProfile` is a declarative list of `SyscallGroup`s. Installing
//! it compiles the groups into a classic BPF program and loads it with
//! `prctl(PR_SET_SECCOMP)`. Any syscall outside the profile kills the whole
//! process at syscall entry. Installation is one-way and covers every thread
//! created afterwards.

mod bpf;
pub mod profile;

pub use bpf::BPF_MAXINSNS;
pub use profile::{import_profile, SandboxProfile, SyscallGroup};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("seccomp filtering is not supported on {0}")]
    UnsupportedArch(&'static str),
    #[error("filter program has {len} instructions, limit is {max}")]
    ProgramTooLarge { len: usize, max: usize },
    #[error("failed to set no_new_privs: {0}")]
    NoNewPrivs(#[source] std::io::Error),
    #[error("failed to install seccomp filter: {0}")]
    Install(#[source] std::io::Error),
}
