//! Process liveness probing via the null signal. Sending signal 0 performs
//! the kernel's permission and existence checks without delivering anything,
//! so it is safe to repeat against the same PID.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Dead,
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("liveness probe of pid {pid} failed: {reason}")]
    Probe { pid: u32, reason: String },
}

/// Probe `pid` with the null signal. ESRCH means the process is gone and
/// classifies as `Dead`; any other errno (EPERM included) is an error the
/// caller must treat as fatal, not a liveness verdict.
#[cfg(unix)]
pub fn probe(pid: u32) -> Result<Liveness, ProbeError> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => Ok(Liveness::Alive),
        Err(Errno::ESRCH) => Ok(Liveness::Dead),
        Err(errno) => Err(ProbeError::Probe {
            pid,
            reason: errno.to_string(),
        }),
    }
}

/// Non-unix platforms have no null signal; fall back to a process-table
/// lookup. No error channel here.
#[cfg(not(unix))]
pub fn probe(pid: u32) -> Result<Liveness, ProbeError> {
    use sysinfo::{Pid, System};

    let mut sys = System::new();
    sys.refresh_processes();
    Ok(if sys.process(Pid::from_u32(pid)).is_some() {
        Liveness::Alive
    } else {
        Liveness::Dead
    })
}
