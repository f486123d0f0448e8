/*
 * shared helpers for the process-level tests.
 *
 * Targets are private copies of `sleep` in a temp dir, so matching by exe
 * path only ever hits processes these tests started - never a real
 * sleep somewhere else on the machine.
 */

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

/// A private `sleep` binary. Named `sleep` so busybox still dispatches it.
pub struct Sleeper {
    _dir: TempDir,
    pub path: PathBuf,
}

impl Sleeper {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = which::which("sleep").expect("sleep on PATH");
        let src = fs::canonicalize(src).expect("canonicalize sleep");
        let path = dir.path().join("sleep");
        fs::copy(&src, &path).expect("copy sleep");
        let path = fs::canonicalize(path).expect("canonicalize copy");
        Self { _dir: dir, path }
    }

    pub fn spawn(&self, secs: u32) -> Child {
        Command::new(&self.path)
            .arg(secs.to_string())
            .spawn()
            .expect("spawn sleeper")
    }
}

/// Any sleep child, from PATH.
pub fn spawn_sleep(secs: u32) -> Child {
    Command::new("sleep")
        .arg(secs.to_string())
        .spawn()
        .expect("spawn sleep")
}

/// Scheduler state letter from /proc/<pid>/stat ('R', 'S', 'T', ...).
pub fn proc_state(pid: u32) -> Option<char> {
    let stat = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    let (_, rest) = stat.rsplit_once(')')?;
    rest.trim_start().chars().next()
}

pub fn is_stopped(pid: u32) -> bool {
    matches!(proc_state(pid), Some('T'))
}

/// Poll `cond` for up to `limit`.
pub fn wait_until(limit: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

/// SIGCONT + SIGKILL + reap. SIGKILL works on stopped processes too.
pub fn reap(mut child: Child) {
    // SAFETY: signalling our own child pid
    unsafe {
        libc::kill(child.id() as i32, libc::SIGCONT);
    }
    let _ = child.kill();
    let _ = child.wait();
}
