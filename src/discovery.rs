/*
 * discovery.rs
 *
 * Background scanner. Once per interval: scan /proc, merge into the
 * tracked set, sleep. Runs on its own thread so a slow /proc walk never
 * delays a phase change.
 *
 * Lazy mode counts consecutive empty scans. One scan per second, so the
 * count is also seconds; more than `timeout` of them in a row ends the
 * run. Any match resets the count.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::{LimitConfig, TargetSpec};
use crate::error::{LimitError, Result};
use crate::proc_info::ProcessMatcher;
use crate::process::ProcessHandle;
use crate::shutdown::Wakeup;
use crate::tracker::ProcessTracker;

/// Why discovery stopped (when it stopped without an error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryExit {
    /// Lazy timeout: this many empty scans in a row.
    LazyTimeout { idle_scans: u32 },
    /// The stop flag was raised.
    Stopped,
}

pub struct Discovery {
    matcher: ProcessMatcher,
    targets: TargetSpec,
    tracker: Arc<ProcessTracker>,
    lazy_timeout: Option<u32>,
    interval: Duration,
    idle_scans: u32,
    ever_found: bool,
    /* scan buffer, reused every round */
    found: Vec<ProcessHandle>,
}

impl Discovery {
    pub fn new(config: &LimitConfig, tracker: Arc<ProcessTracker>) -> Self {
        Self {
            matcher: ProcessMatcher::new(&config.proc_root),
            targets: config.targets.clone(),
            tracker,
            lazy_timeout: config.lazy_timeout,
            interval: config.scan_interval,
            idle_scans: 0,
            ever_found: false,
            found: Vec::new(),
        }
    }

    pub fn idle_scans(&self) -> u32 {
        self.idle_scans
    }

    /// One scan + merge. Some(exit) when the lazy timeout just ran out.
    ///
    /// # Errors
    ///
    /// Propagates [`LimitError::ProcList`]; the caller treats it as fatal.
    pub fn step(&mut self) -> Result<Option<DiscoveryExit>> {
        let found = std::mem::take(&mut self.found);
        self.found = self.matcher.scan(found, &self.targets)?;

        if self.found.is_empty() {
            let Some(timeout) = self.lazy_timeout else {
                return Ok(None);
            };
            self.idle_scans = self.idle_scans.saturating_add(1);
            if self.idle_scans > timeout {
                if self.ever_found {
                    info!(seconds = timeout, "no more processes to watch, timeout reached - exiting");
                } else {
                    info!(seconds = timeout, "no target process was ever found, timeout reached - exiting");
                }
                return Ok(Some(DiscoveryExit::LazyTimeout {
                    idle_scans: self.idle_scans,
                }));
            }
            debug!(idle_scans = self.idle_scans, timeout, "no matching process");
            return Ok(None);
        }

        self.idle_scans = 0;
        self.ever_found = true;
        self.tracker.merge(&self.found);
        Ok(None)
    }

    /// Scan until the lazy timeout fires, `stop` is raised, or /proc fails.
    ///
    /// # Errors
    ///
    /// Same as [`Discovery::step`].
    pub fn run(mut self, stop: &AtomicBool) -> Result<DiscoveryExit> {
        loop {
            if stop.load(Ordering::SeqCst) {
                return Ok(DiscoveryExit::Stopped);
            }
            if let Some(exit) = self.step()? {
                return Ok(exit);
            }
            thread::sleep(self.interval);
        }
    }

    /// Run on a named thread. Whatever way it ends, the controller is woken.
    ///
    /// # Errors
    ///
    /// [`LimitError::Thread`] if the thread can't be spawned.
    pub fn spawn(
        self,
        stop: Arc<AtomicBool>,
        wakeup: Arc<Wakeup>,
    ) -> Result<JoinHandle<Result<DiscoveryExit>>> {
        thread::Builder::new()
            .name("discovery".to_string())
            .spawn(move || {
                let result = self.run(&stop);
                if let Err(e) = &result {
                    error!(error = %e, "discovery failed");
                }
                wakeup.notify_discovery_done();
                result
            })
            .map_err(LimitError::Thread)
    }
}
