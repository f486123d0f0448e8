/*
 * runner.rs
 *
 * Wires the pieces together for one run and owns teardown.
 *
 * pid mode: probe the pid, seed the tracked set with it, no discovery.
 * exe mode: start the discovery thread, let it fill the set.
 * Either way the controller runs on the calling thread until something
 * wakes it. Then, whatever the reason, every tracked process gets a
 * SIGCONT before we return. Nothing is left frozen behind us.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use tracing::{debug, info};

use crate::config::{LimitConfig, TargetSpec};
use crate::discovery::{Discovery, DiscoveryExit};
use crate::error::{LimitError, Result, exit_codes};
use crate::process::{self, ProcessHandle};
use crate::shutdown::{WakeReason, Wakeup};
use crate::signal::{KillSignaller, Signal, Signaller};
use crate::throttle::{Controller, StopReason};
use crate::tracker::ProcessTracker;

/// How a run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A termination signal arrived. Targets were resumed.
    Interrupted(Signal),
    /// Lazy mode gave up waiting for a match.
    LazyTimeout,
    /// pid mode: the process is gone.
    TargetGone,
}

impl RunOutcome {
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::LazyTimeout | Self::TargetGone => exit_codes::SUCCESS,
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            Self::Interrupted(sig) => exit_codes::SIGNAL_BASE.saturating_add(sig.as_raw() as u8),
        }
    }
}

/// Run with real kill(2) delivery.
///
/// `wakeup` should already have signal handlers installed if Ctrl-C is
/// supposed to work; the runner only listens on it.
///
/// # Errors
///
/// `ProcessNotFound` (pid mode, bad pid), `TargetUnreachable` (pid mode,
/// the target refused a signal), `Thread`, or whatever made discovery give
/// up (`ProcList`).
pub fn run(config: &LimitConfig, wakeup: Arc<Wakeup>) -> Result<RunOutcome> {
    run_with(config, wakeup, KillSignaller)
}

/// [`run`] with a custom signaller.
///
/// # Errors
///
/// See [`run`].
pub fn run_with<S: Signaller>(
    config: &LimitConfig,
    wakeup: Arc<Wakeup>,
    signaller: S,
) -> Result<RunOutcome> {
    let tracker = Arc::new(ProcessTracker::new());
    let stop = Arc::new(AtomicBool::new(false));

    let discovery = match &config.targets {
        TargetSpec::Pid(pid) => {
            process::probe(*pid)?;
            tracker.insert(ProcessHandle::new(*pid));
            info!(pid, limit = config.limit.get(), "limiting process");
            None
        }
        TargetSpec::Executables(paths) => {
            info!(
                targets = ?paths,
                limit = config.limit.get(),
                policy = ?config.policy,
                "watching executables"
            );
            let discovery = Discovery::new(config, Arc::clone(&tracker));
            Some(discovery.spawn(Arc::clone(&stop), Arc::clone(&wakeup))?)
        }
    };

    let mut controller = Controller::from_config(config, Arc::clone(&tracker), signaller);
    let reason = controller.run(&wakeup);

    stop.store(true, Ordering::SeqCst);
    let resumed = controller.release();
    debug!(resumed, reason = ?reason, "controller stopped");

    match reason {
        StopReason::TargetsGone => {
            info!("target process exited");
            Ok(RunOutcome::TargetGone)
        }
        StopReason::TargetUnreachable { pid, signal } => {
            Err(LimitError::TargetUnreachable { pid, signal })
        }
        StopReason::Woken(WakeReason::Signal(sig)) => {
            info!(signal = sig.name(), resumed, "interrupted, targets resumed");
            Ok(RunOutcome::Interrupted(sig))
        }
        StopReason::Woken(WakeReason::DiscoveryDone) => finish_discovery(discovery),
    }
}

fn finish_discovery(handle: Option<JoinHandle<Result<DiscoveryExit>>>) -> Result<RunOutcome> {
    let Some(handle) = handle else {
        return Err(LimitError::Internal(
            "discovery wake-up without a discovery thread".to_string(),
        ));
    };
    match handle.join() {
        Ok(Ok(DiscoveryExit::LazyTimeout { .. })) => Ok(RunOutcome::LazyTimeout),
        Ok(Ok(DiscoveryExit::Stopped)) => Err(LimitError::Internal(
            "discovery stopped on its own".to_string(),
        )),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(LimitError::Internal("discovery thread panicked".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitPercent;
    use crate::process::Pid;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::time::Duration;

    /* every delivery is EPERM, like a process owned by another user */
    struct DenyAll;

    impl Signaller for DenyAll {
        fn send(&self, pid: Pid, signal: Signal) -> Result<()> {
            Err(LimitError::Signal {
                pid,
                signal,
                errno: libc::EPERM,
            })
        }
    }

    /* accepts and records everything */
    #[derive(Default)]
    struct Recorder {
        sent: Arc<Mutex<Vec<(Pid, Signal)>>>,
    }

    impl Signaller for Recorder {
        fn send(&self, pid: Pid, signal: Signal) -> Result<()> {
            self.sent.lock().push((pid, signal));
            Ok(())
        }
    }

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(RunOutcome::LazyTimeout.exit_code(), 0);
        assert_eq!(RunOutcome::TargetGone.exit_code(), 0);
        assert_eq!(RunOutcome::Interrupted(Signal::Term).exit_code(), 143);
        assert_eq!(RunOutcome::Interrupted(Signal::Int).exit_code(), 130);
    }

    #[test]
    fn test_missing_pid_fails_before_anything_starts() {
        let config = LimitConfig::new(TargetSpec::Pid(i32::MAX - 1));
        let wakeup = Arc::new(Wakeup::new().unwrap());
        let err = run(&config, wakeup).unwrap_err();
        assert!(matches!(err, LimitError::ProcessNotFound(_)));
    }

    #[test]
    fn test_finish_without_thread_is_internal_error() {
        assert!(matches!(
            finish_discovery(None),
            Err(LimitError::Internal(_))
        ));
    }

    #[test]
    fn test_pid_target_refusing_signals_is_an_error() {
        let me = std::process::id() as Pid;
        let config = LimitConfig::new(TargetSpec::Pid(me));
        let wakeup = Arc::new(Wakeup::new().unwrap());

        let err = run_with(&config, wakeup, DenyAll).unwrap_err();
        assert!(
            matches!(err, LimitError::TargetUnreachable { pid, signal: Signal::Stop } if pid == me),
            "got {err:?}"
        );
        assert_eq!(err.exit_code(), exit_codes::FAILURE);
    }

    #[test]
    fn test_lazy_timeout_sends_no_signals() {
        let root = tempfile::tempdir().unwrap();
        let mut config = LimitConfig::new(TargetSpec::Executables(vec![PathBuf::from(
            "/nonexistent/mcpulimit/bin",
        )]));
        config.limit = LimitPercent::new(10).unwrap();
        config.proc_root = root.path().to_path_buf();
        config.lazy_timeout = Some(3);
        config.scan_interval = Duration::from_millis(10);

        let recorder = Recorder::default();
        let sent = Arc::clone(&recorder.sent);
        let outcome = run_with(&config, Arc::new(Wakeup::new().unwrap()), recorder).unwrap();

        assert_eq!(outcome, RunOutcome::LazyTimeout);
        let sent = sent.lock();
        assert!(sent.is_empty(), "sent {sent:?}");
    }
}
