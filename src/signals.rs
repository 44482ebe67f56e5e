//! Signal delivery by name. Commands and the reload watcher speak in signal
//! names ("SIGUSR2", "SIGQUIT", ...) so configuration stays textual; parsing
//! happens here at the edge.

use anyhow::{Context, Result};

#[cfg(unix)]
pub fn parse(name: &str) -> Result<nix::sys::signal::Signal> {
    use std::str::FromStr;
    nix::sys::signal::Signal::from_str(name)
        .with_context(|| format!("unknown signal name '{}'", name))
}

/// Deliver the named signal to `pid`.
#[cfg(unix)]
pub fn send(pid: u32, name: &str) -> Result<()> {
    let sig = parse(name)?;
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), sig)
        .with_context(|| format!("failed to send {} to pid {}", name, pid))?;
    Ok(())
}

#[cfg(not(unix))]
pub fn send(pid: u32, name: &str) -> Result<()> {
    anyhow::bail!("cannot send {} to pid {}: signals are not supported on this platform", name, pid)
}

/// Configure-time check that a signal name is deliverable, so a typo in the
/// watcher config fails at startup instead of on the first file change.
pub fn validate(name: &str) -> Result<()> {
    #[cfg(unix)]
    {
        parse(name).map(|_| ())
    }
    #[cfg(not(unix))]
    {
        let _ = name;
        Ok(())
    }
}
