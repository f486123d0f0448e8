/*
 * error.rs
 *
 * Two classes of failure. Fatal ones end up here and abort the run
 * (after tracked processes are resumed). Per-process hiccups during a scan
 * or a signal burst never become a LimitError at the top level, they are
 * logged and the process is dropped from the tracked set.
 *
 * Exit codes: 0 ok, 1 runtime failure, 2 usage, 127 not found,
 * 128+N killed by signal N. Scripts wrap this tool, keep them stable.
 */

use std::io;
use std::path::PathBuf;

use crate::process::Pid;
use crate::signal::Signal;

/// exit codes. don't change these.
pub mod exit_codes {
    /// Lazy timeout, target gone, or a clean stop
    pub const SUCCESS: u8 = 0;
    /// Runtime failure (process listing unusable, pipe setup, ...)
    pub const FAILURE: u8 = 1;
    /// Bad invocation (no targets, limit out of range)
    pub const USAGE: u8 = 2;
    /// Executable or pid not found at startup
    pub const NOT_FOUND: u8 = 127;
    /// Base for "terminated by signal N" (128 + N)
    pub const SIGNAL_BASE: u8 = 128;
}

/* everything that can go wrong */
#[derive(Debug, thiserror::Error)]
pub enum LimitError {
    #[error("nothing to limit: give a pid (-p) or at least one executable (-e / EXE...)")]
    NoTargets,

    #[error("invalid limit: {0} (must be between 1 and 100)")]
    InvalidLimit(u32),

    #[error("cannot find full path for executable(s): {}", .0.join(", "))]
    ExecutableNotFound(Vec<String>),

    #[error("cannot find process {0}")]
    ProcessNotFound(Pid),

    #[error("cannot read process list {}: {source}", .path.display())]
    ProcList {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no such process: {0}")]
    NoSuchProcess(Pid),

    #[error("error signaling {pid} with {}: errno {errno}", .signal.name())]
    Signal { pid: Pid, signal: Signal, errno: i32 },

    #[error("lost control of process {pid}: {} was refused", .signal.name())]
    TargetUnreachable { pid: Pid, signal: Signal },

    #[error("cannot set up wake-up pipe: {0}")]
    WakeupPipe(#[source] io::Error),

    #[error("cannot spawn discovery thread: {0}")]
    Thread(#[source] io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LimitError {
    /* map errors to exit codes */
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::NoTargets | Self::InvalidLimit(_) => exit_codes::USAGE,
            Self::ExecutableNotFound(_) | Self::ProcessNotFound(_) => exit_codes::NOT_FOUND,
            Self::ProcList { .. }
            | Self::NoSuchProcess(_)
            | Self::Signal { .. }
            | Self::TargetUnreachable { .. }
            | Self::WakeupPipe(_)
            | Self::Thread(_)
            | Self::Internal(_) => exit_codes::FAILURE,
        }
    }

    /// True when a signal delivery failed because the target is gone.
    #[must_use]
    pub fn is_vanished(&self) -> bool {
        matches!(self, Self::NoSuchProcess(_))
    }
}

pub type Result<T> = std::result::Result<T, LimitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_errors_exit_code() {
        assert_eq!(LimitError::NoTargets.exit_code(), exit_codes::USAGE);
        assert_eq!(LimitError::InvalidLimit(0).exit_code(), exit_codes::USAGE);
    }

    #[test]
    fn test_not_found_exit_code() {
        let err = LimitError::ExecutableNotFound(vec!["nope".to_string()]);
        assert_eq!(err.exit_code(), exit_codes::NOT_FOUND);
        assert_eq!(LimitError::ProcessNotFound(42).exit_code(), exit_codes::NOT_FOUND);
    }

    #[test]
    fn test_proc_list_error_mentions_path() {
        let err = LimitError::ProcList {
            path: PathBuf::from("/nonexistent/proc"),
            source: io::Error::from_raw_os_error(libc::ENOENT),
        };
        let msg = err.to_string();
        assert!(msg.contains("/nonexistent/proc"), "got: {msg}");
        assert_eq!(err.exit_code(), exit_codes::FAILURE);
    }

    #[test]
    fn test_signal_error_display() {
        let err = LimitError::Signal {
            pid: 1234,
            signal: Signal::Stop,
            errno: libc::EPERM,
        };
        let msg = err.to_string();
        assert!(msg.contains("1234"));
        assert!(msg.contains("SIGSTOP"));
        assert!(!err.is_vanished());
    }

    #[test]
    fn test_unreachable_target_is_a_failure() {
        let err = LimitError::TargetUnreachable {
            pid: 77,
            signal: Signal::Stop,
        };
        assert_eq!(err.exit_code(), exit_codes::FAILURE);
        assert!(!err.is_vanished());
        assert!(err.to_string().contains("SIGSTOP"));
    }

    #[test]
    fn test_vanished_classification() {
        assert!(LimitError::NoSuchProcess(7).is_vanished());
        assert!(!LimitError::ProcessNotFound(7).is_vanished());
    }

    #[test]
    fn test_executable_not_found_lists_names() {
        let err = LimitError::ExecutableNotFound(vec!["foo".into(), "bar".into()]);
        assert!(err.to_string().contains("foo, bar"));
    }
}
