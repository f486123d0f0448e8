/*
 * process.rs
 *
 * A tracked process is just its pid plus the image path we matched it on.
 * We never own the target (it isn't our child), so there is nothing to
 * wait on or close. The pid is the handle.
 */

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{LimitError, Result};
use crate::signal::errno;

pub type Pid = libc::pid_t;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pid: Pid,
    /* None in pid mode or when matching everything */
    exe: Option<PathBuf>,
}

impl ProcessHandle {
    #[must_use]
    pub fn new(pid: Pid) -> Self {
        Self { pid, exe: None }
    }

    #[must_use]
    pub fn with_exe(pid: Pid, exe: PathBuf) -> Self {
        Self { pid, exe: Some(exe) }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn exe(&self) -> Option<&Path> {
        self.exe.as_deref()
    }
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.exe {
            Some(exe) => write!(f, "{} ({})", self.pid, exe.display()),
            None => write!(f, "{}", self.pid),
        }
    }
}

/// Check that `pid` names a live process, using the null signal.
///
/// EPERM means it exists but belongs to someone else. That still counts:
/// the controller will find out for real on the first STOP.
///
/// # Errors
///
/// [`LimitError::ProcessNotFound`] for ESRCH or a non-positive pid.
pub fn probe(pid: Pid) -> Result<()> {
    if pid <= 0 {
        return Err(LimitError::ProcessNotFound(pid));
    }

    // SAFETY: signal 0 performs only the existence/permission check
    let ret = unsafe { libc::kill(pid, 0) };
    if ret == 0 {
        return Ok(());
    }

    match errno() {
        libc::EPERM => Ok(()),
        _ => Err(LimitError::ProcessNotFound(pid)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_and_without_exe() {
        assert_eq!(ProcessHandle::new(42).to_string(), "42");
        let h = ProcessHandle::with_exe(42, PathBuf::from("/usr/bin/yes"));
        assert_eq!(h.to_string(), "42 (/usr/bin/yes)");
        assert_eq!(h.exe(), Some(Path::new("/usr/bin/yes")));
    }

    #[test]
    fn test_probe_self() {
        assert!(probe(std::process::id() as Pid).is_ok());
    }

    #[test]
    fn test_probe_rejects_missing_and_bogus_pids() {
        assert!(matches!(probe(0), Err(LimitError::ProcessNotFound(0))));
        assert!(matches!(probe(-5), Err(LimitError::ProcessNotFound(-5))));
        assert!(probe(i32::MAX - 1).is_err());
    }
}
