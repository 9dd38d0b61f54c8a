use crate::profile::SandboxProfile;
use crate::SandboxError;
use tracing::debug;

/// Kernel limit on classic BPF program length.
pub const BPF_MAXINSNS: usize = 4096;

const BPF_LD_W_ABS: u16 = 0x20;
const BPF_JMP_JEQ_K: u16 = 0x15;
const BPF_RET_K: u16 = 0x06;

const SECCOMP_RET_KILL_PROCESS: u32 = 0x8000_0000;
const SECCOMP_RET_ALLOW: u32 = 0x7fff_0000;

// Offsets into `struct seccomp_data`.
const DATA_NR: u32 = 0;
const DATA_ARCH: u32 = 4;

#[cfg(target_arch = "x86_64")]
const AUDIT_ARCH: Result<u32, &str> = Ok(0xC000_003E);
#[cfg(target_arch = "aarch64")]
const AUDIT_ARCH: Result<u32, &str> = Ok(0xC000_00B7);
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
const AUDIT_ARCH: Result<u32, &str> = Err(std::env::consts::ARCH);

fn stmt(code: u16, k: u32) -> libc::sock_filter {
    libc::sock_filter {
        code,
        jt: 0,
        jf: 0,
        k,
    }
}

fn jump(code: u16, k: u32, jt: u8, jf: u8) -> libc::sock_filter {
    libc::sock_filter { code, jt, jf, k }
}

/// Compile `profile` into a seccomp program.
///
/// A foreign audit architecture is killed before the syscall number is
/// looked at, since numbers differ between ABIs.
pub(crate) fn compile(profile: &SandboxProfile) -> Result<Vec<libc::sock_filter>, SandboxError> {
    let arch = AUDIT_ARCH.map_err(SandboxError::UnsupportedArch)?;
    let syscalls = profile.syscalls();

    let mut prog = Vec::with_capacity(4 + 2 * syscalls.len());
    prog.push(stmt(BPF_LD_W_ABS, DATA_ARCH));
    prog.push(jump(BPF_JMP_JEQ_K, arch, 1, 0));
    prog.push(stmt(BPF_RET_K, SECCOMP_RET_KILL_PROCESS));
    prog.push(stmt(BPF_LD_W_ABS, DATA_NR));
    for nr in syscalls {
        prog.push(jump(BPF_JMP_JEQ_K, nr as u32, 0, 1));
        prog.push(stmt(BPF_RET_K, SECCOMP_RET_ALLOW));
    }
    prog.push(stmt(BPF_RET_K, SECCOMP_RET_KILL_PROCESS));

    if prog.len() > BPF_MAXINSNS {
        return Err(SandboxError::ProgramTooLarge {
            len: prog.len(),
            max: BPF_MAXINSNS,
        });
    }
    Ok(prog)
}

#[allow(unsafe_code)]
pub(crate) fn install(profile: &SandboxProfile) -> Result<(), SandboxError> {
    let mut prog = compile(profile)?;
    let fprog = libc::sock_fprog {
        // compile() bounds the length by BPF_MAXINSNS.
        len: prog.len() as libc::c_ushort,
        filter: prog.as_mut_ptr(),
    };

    // prctl is variadic; unused arguments must be full-width zeros.
    let (one, zero): (libc::c_ulong, libc::c_ulong) = (1, 0);
    // SAFETY: PR_SET_NO_NEW_PRIVS takes integer arguments only and touches no memory.
    let rc = unsafe { libc::prctl(libc::PR_SET_NO_NEW_PRIVS, one, zero, zero, zero) };
    if rc != 0 {
        return Err(SandboxError::NoNewPrivs(std::io::Error::last_os_error()));
    }

    // SAFETY: `fprog` points at `prog`, which is alive for the duration of the
    // call. The kernel copies the program before returning.
    let rc = unsafe {
        libc::prctl(
            libc::PR_SET_SECCOMP,
            libc::c_ulong::from(libc::SECCOMP_MODE_FILTER),
            &raw const fprog,
        )
    };
    if rc != 0 {
        return Err(SandboxError::Install(std::io::Error::last_os_error()));
    }

    debug!("seccomp filter installed ({} instructions)", prog.len());
    Ok(())
}
