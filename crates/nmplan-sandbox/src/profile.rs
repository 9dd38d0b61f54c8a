use crate::SandboxError;
use libc::c_long;
use std::collections::BTreeSet;

/// A named family of syscalls the process may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SyscallGroup {
    Write,
    Read,
    Open,
    Close,
    Stat,
    Seek,
    DirList,
    Unlink,
    Mkdir,
    Memory,
    DupFd,
    Futex,
    Umask,
    GetPid,
    Exit,
    /// Atomic replacement of layer files.
    Rename,
    Sync,
    /// Hash seeds and temporary file names.
    Random,
    /// Signal state torn down by the runtime at exit.
    SignalStack,
    Fcntl,
}

impl SyscallGroup {
    pub fn syscalls(self) -> &'static [c_long] {
        match self {
            SyscallGroup::Write => &[libc::SYS_write, libc::SYS_writev],
            SyscallGroup::Read => &[libc::SYS_read, libc::SYS_readv],
            SyscallGroup::Open => &[
                libc::SYS_openat,
                #[cfg(target_arch = "x86_64")]
                libc::SYS_open,
            ],
            SyscallGroup::Close => &[libc::SYS_close],
            SyscallGroup::Stat => &[
                libc::SYS_fstat,
                libc::SYS_newfstatat,
                libc::SYS_statx,
                #[cfg(target_arch = "x86_64")]
                libc::SYS_stat,
                #[cfg(target_arch = "x86_64")]
                libc::SYS_lstat,
            ],
            SyscallGroup::Seek => &[libc::SYS_lseek],
            SyscallGroup::DirList => &[
                libc::SYS_getdents64,
                #[cfg(target_arch = "x86_64")]
                libc::SYS_getdents,
            ],
            SyscallGroup::Unlink => &[
                libc::SYS_unlinkat,
                #[cfg(target_arch = "x86_64")]
                libc::SYS_unlink,
            ],
            SyscallGroup::Mkdir => &[
                libc::SYS_mkdirat,
                #[cfg(target_arch = "x86_64")]
                libc::SYS_mkdir,
            ],
            SyscallGroup::Memory => &[
                libc::SYS_brk,
                libc::SYS_mmap,
                libc::SYS_munmap,
                libc::SYS_mremap,
                libc::SYS_mprotect,
                libc::SYS_madvise,
            ],
            SyscallGroup::DupFd => &[
                libc::SYS_dup,
                libc::SYS_dup3,
                #[cfg(target_arch = "x86_64")]
                libc::SYS_dup2,
            ],
            SyscallGroup::Futex => &[libc::SYS_futex],
            SyscallGroup::Umask => &[libc::SYS_umask],
            SyscallGroup::GetPid => &[libc::SYS_getpid],
            SyscallGroup::Exit => &[libc::SYS_exit, libc::SYS_exit_group],
            SyscallGroup::Rename => &[
                libc::SYS_renameat,
                libc::SYS_renameat2,
                #[cfg(target_arch = "x86_64")]
                libc::SYS_rename,
            ],
            SyscallGroup::Sync => &[libc::SYS_fsync, libc::SYS_fdatasync],
            SyscallGroup::Random => &[libc::SYS_getrandom],
            SyscallGroup::SignalStack => &[
                libc::SYS_sigaltstack,
                libc::SYS_rt_sigprocmask,
                libc::SYS_rt_sigreturn,
            ],
            SyscallGroup::Fcntl => &[libc::SYS_fcntl],
        }
    }
}

/// Set of syscall groups a process is confined to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxProfile {
    groups: BTreeSet<SyscallGroup>,
}

impl SandboxProfile {
    pub fn new(groups: impl IntoIterator<Item = SyscallGroup>) -> Self {
        Self {
            groups: groups.into_iter().collect(),
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = SyscallGroup> + '_ {
        self.groups.iter().copied()
    }

    /// Allowed syscall numbers, sorted and deduplicated.
    pub fn syscalls(&self) -> Vec<c_long> {
        let set: BTreeSet<c_long> = self
            .groups
            .iter()
            .flat_map(|g| g.syscalls().iter().copied())
            .collect();
        set.into_iter().collect()
    }

    pub fn allows(&self, nr: c_long) -> bool {
        self.groups.iter().any(|g| g.syscalls().contains(&nr))
    }

    /// Confine the calling process to this profile. Irreversible.
    pub fn install(&self) -> Result<(), SandboxError> {
        crate::bpf::install(self)
    }
}

/// Profile for importing or deleting one keyfile against the hierarchy.
pub fn import_profile() -> SandboxProfile {
    SandboxProfile::new([
        SyscallGroup::Write,
        SyscallGroup::Read,
        SyscallGroup::Open,
        SyscallGroup::Close,
        SyscallGroup::Stat,
        SyscallGroup::Seek,
        SyscallGroup::DirList,
        SyscallGroup::Unlink,
        SyscallGroup::Mkdir,
        SyscallGroup::Memory,
        SyscallGroup::DupFd,
        SyscallGroup::Futex,
        SyscallGroup::Umask,
        SyscallGroup::GetPid,
        SyscallGroup::Exit,
        SyscallGroup::Rename,
        SyscallGroup::Sync,
        SyscallGroup::Random,
        SyscallGroup::SignalStack,
        SyscallGroup::Fcntl,
    ])
}
