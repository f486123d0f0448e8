/*
 * shutdown.rs
 *
 * Self-pipe wake-up for the controller.
 *
 * The controller spends its life asleep between phase changes. Two things
 * must cut that sleep short: a termination signal (so we can SIGCONT
 * everything before dying - a target left in SIGSTOP stays frozen forever)
 * and the discovery thread finishing (lazy timeout, or /proc went away).
 *
 * Signal handlers can only write(2), so: handler writes the signal number
 * to a pipe, discovery writes 0, controller poll(2)s the read end with the
 * phase length as timeout. Sleep and wake-up in one syscall.
 */

use std::io;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::{Duration, Instant};

use crate::error::{LimitError, Result};
use crate::signal::{Signal, errno};

type RawFd = i32;

/* byte written by the discovery thread when it stops */
const DISCOVERY_DONE: u8 = 0;

/* signals that end the run */
const HANDLED: [i32; 4] = [libc::SIGTERM, libc::SIGINT, libc::SIGHUP, libc::SIGQUIT];

/* write end for the signal handler, -1 when no handlers are installed */
static SIGNAL_WRITE_FD: AtomicI32 = AtomicI32::new(-1);

/// Why the controller woke up early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    Signal(Signal),
    DiscoveryDone,
}

#[derive(Debug)]
pub struct Wakeup {
    read_fd: RawFd,
    write_fd: RawFd,
    handlers: AtomicBool,
}

impl Wakeup {
    /// # Errors
    ///
    /// [`LimitError::WakeupPipe`] if pipe2 fails (fd exhaustion).
    pub fn new() -> Result<Self> {
        let mut fds = [0 as RawFd; 2];
        // SAFETY: fds is a valid 2-element array, pipe2() writes exactly 2 fds
        let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
        if ret != 0 {
            return Err(LimitError::WakeupPipe(io::Error::last_os_error()));
        }
        Ok(Self {
            read_fd: fds[0],
            write_fd: fds[1],
            handlers: AtomicBool::new(false),
        })
    }

    /// Route SIGTERM, SIGINT, SIGHUP and SIGQUIT into this pipe.
    ///
    /// One process, one set of handlers: fails if another `Wakeup`
    /// already owns them.
    ///
    /// # Errors
    ///
    /// [`LimitError::Internal`] when handlers are already installed.
    pub fn install_signal_handlers(&self) -> Result<()> {
        if SIGNAL_WRITE_FD
            .compare_exchange(-1, self.write_fd, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(LimitError::Internal(
                "signal handlers already installed".to_string(),
            ));
        }

        set_handlers(signal_handler as *const () as libc::sighandler_t);
        self.handlers.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Tell the controller discovery has stopped.
    pub fn notify_discovery_done(&self) {
        write_byte(self.write_fd, DISCOVERY_DONE);
    }

    /// Same as a delivered signal. For library users without handlers.
    pub fn notify_signal(&self, signal: Signal) {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        write_byte(self.write_fd, signal.as_raw() as u8);
    }

    /// Sleep up to `timeout`. Returns early with the reason if woken.
    pub fn wait(&self, timeout: Duration) -> Option<WakeReason> {
        let deadline = Instant::now() + timeout;
        loop {
            /* drain first - a zero timeout still sees pending wake-ups */
            if let Some(reason) = self.try_read() {
                return Some(reason);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }

            let mut pfd = libc::pollfd {
                fd: self.read_fd,
                events: libc::POLLIN,
                revents: 0,
            };
            // SAFETY: pfd is a valid pollfd for our own read end, nfds = 1
            let ret = unsafe { libc::poll(&raw mut pfd, 1, poll_timeout_ms(remaining)) };
            if ret < 0 && errno() != libc::EINTR {
                /* poll itself broke; still honour the sleep */
                std::thread::sleep(remaining);
                return self.try_read();
            }
        }
    }

    fn try_read(&self) -> Option<WakeReason> {
        let mut buf = [0u8; 1];
        // SAFETY: buf is a valid 1-byte buffer, read_fd is our non-blocking
        // read end. -1/EAGAIN just means nothing pending.
        let n = unsafe { libc::read(self.read_fd, buf.as_mut_ptr().cast(), 1) };
        (n == 1).then(|| decode(buf[0]))
    }
}

impl Drop for Wakeup {
    fn drop(&mut self) {
        if self.handlers.load(Ordering::SeqCst) {
            set_handlers(libc::SIG_DFL);
            SIGNAL_WRITE_FD.store(-1, Ordering::SeqCst);
        }
        // SAFETY: read_fd came from pipe2() and is closed exactly once here
        unsafe { libc::close(self.read_fd) };
        // SAFETY: same for write_fd
        unsafe { libc::close(self.write_fd) };
    }
}

/* point every handled signal at `handler`: ours, or SIG_DFL on teardown */
fn set_handlers(handler: libc::sighandler_t) {
    // SAFETY: all-zero is a valid sigaction (no flags, empty mask)
    let mut sa: libc::sigaction = unsafe { std::mem::zeroed() };
    sa.sa_sigaction = handler;
    sa.sa_flags = libc::SA_RESTART;
    // SAFETY: sa_mask is a valid sigset_t owned by `sa`
    unsafe { libc::sigemptyset(&raw mut sa.sa_mask) };
    for sig in HANDLED {
        // SAFETY: `sa` is fully initialized, the old action isn't requested.
        // handler is SIG_DFL or an extern "C" fn(i32) that only calls write().
        unsafe { libc::sigaction(sig, &raw const sa, std::ptr::null_mut()) };
    }
}

/* Minimal signal handler - write the signal number to the pipe */
extern "C" fn signal_handler(sig: i32) {
    let fd = SIGNAL_WRITE_FD.load(Ordering::SeqCst);
    if fd >= 0 {
        /* SIGTERM=15, SIGINT=2, SIGHUP=1, SIGQUIT=3 all fit in u8 */
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        write_byte(fd, sig as u8);
    }
}

#[inline]
fn write_byte(fd: RawFd, byte: u8) {
    // SAFETY: fd is our pipe's write end; write() with a 1-byte buffer is
    // async-signal-safe per POSIX. A full pipe (EAGAIN) already holds a
    // pending wake-up, so the error is ignored.
    let _ = unsafe { libc::write(fd, (&raw const byte).cast(), 1) };
}

fn decode(byte: u8) -> WakeReason {
    if byte == DISCOVERY_DONE {
        return WakeReason::DiscoveryDone;
    }
    WakeReason::Signal(Signal::try_from_raw(i32::from(byte)).unwrap_or(Signal::Term))
}

/* round up so a 0.4ms remainder doesn't spin */
fn poll_timeout_ms(d: Duration) -> i32 {
    let ms = d.as_nanos().div_ceil(1_000_000);
    i32::try_from(ms).unwrap_or(i32::MAX)
}
