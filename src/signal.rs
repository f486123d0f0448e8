/*
 * signal.rs
 *
 * The only signals we ever send are SIGSTOP and SIGCONT. They are the two
 * a target can't trap its way out of (STOP can't be caught at all, CONT
 * always resumes). The termination signals are here because the shutdown
 * pipe carries their numbers back to the controller.
 *
 * Delivery is plain kill(2) by pid. ESRCH gets its own error variant so the
 * controller can tell "process gone" from "not allowed".
 */

use std::io;

use crate::error::{LimitError, Result};
use crate::process::Pid;

/* Signals we send or react to, as libc values */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Signal {
    Hup = libc::SIGHUP,
    Int = libc::SIGINT,
    Quit = libc::SIGQUIT,
    Term = libc::SIGTERM,
    Cont = libc::SIGCONT,
    Stop = libc::SIGSTOP,
}

impl Signal {
    /* convert from raw signal number */
    pub fn try_from_raw(num: i32) -> Option<Self> {
        match num {
            libc::SIGHUP => Some(Self::Hup),
            libc::SIGINT => Some(Self::Int),
            libc::SIGQUIT => Some(Self::Quit),
            libc::SIGTERM => Some(Self::Term),
            libc::SIGCONT => Some(Self::Cont),
            libc::SIGSTOP => Some(Self::Stop),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Hup => "SIGHUP",
            Self::Int => "SIGINT",
            Self::Quit => "SIGQUIT",
            Self::Term => "SIGTERM",
            Self::Cont => "SIGCONT",
            Self::Stop => "SIGSTOP",
        }
    }
}

/// Something that can deliver a signal to a pid.
///
/// The controller is generic over this so tests can watch what it sends
/// (and make deliveries fail) without stopping real processes.
pub trait Signaller: Send + Sync {
    fn send(&self, pid: Pid, signal: Signal) -> Result<()>;
}

/// Real delivery through kill(2).
#[derive(Debug, Default, Clone, Copy)]
pub struct KillSignaller;

impl Signaller for KillSignaller {
    fn send(&self, pid: Pid, signal: Signal) -> Result<()> {
        send_signal(pid, signal)
    }
}

/// Send `signal` to exactly `pid` (never a group, pid must be > 0).
///
/// # Errors
///
/// [`LimitError::NoSuchProcess`] when the process is gone (ESRCH),
/// [`LimitError::Signal`] for anything else (EPERM mostly).
pub fn send_signal(pid: Pid, signal: Signal) -> Result<()> {
    /* kill(0, ..) and kill(-1, ..) hit whole groups. never do that. */
    if pid <= 0 {
        return Err(LimitError::Signal {
            pid,
            signal,
            errno: libc::EINVAL,
        });
    }

    // SAFETY: kill() is safe with any pid/signal combo, returns -1 on error
    let ret = unsafe { libc::kill(pid, signal.as_raw()) };
    if ret == 0 {
        return Ok(());
    }

    match errno() {
        libc::ESRCH => Err(LimitError::NoSuchProcess(pid)),
        errno => Err(LimitError::Signal { pid, signal, errno }),
    }
}

#[inline]
pub(crate) fn errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}
