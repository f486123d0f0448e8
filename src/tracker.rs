/*
 * tracker.rs
 *
 * The tracked set: pid -> handle, behind one mutex. Discovery writes it
 * once a second, the controller reads it every phase and prunes what it
 * couldn't signal.
 *
 * Nobody gets the raw map. The lock is held for the map operation only,
 * never across kill(2) - the controller works off a snapshot copy.
 */

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::info;

use crate::process::{Pid, ProcessHandle};

/// What a merge changed. Pids sorted ascending.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub added: Vec<Pid>,
    pub exited: Vec<Pid>,
}

impl MergeReport {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.exited.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ProcessTracker {
    procs: Mutex<HashMap<Pid, ProcessHandle>>,
}

impl ProcessTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tracked set with a fresh scan.
    ///
    /// An empty scan is ignored: a listing hiccup must not look like
    /// every target exiting at once. Handles already tracked are
    /// overwritten silently, only genuinely new pids are logged.
    pub fn merge(&self, found: &[ProcessHandle]) -> MergeReport {
        let mut report = MergeReport::default();
        if found.is_empty() {
            return report;
        }

        let live: HashSet<Pid> = found.iter().map(ProcessHandle::pid).collect();
        let mut procs = self.procs.lock();

        procs.retain(|pid, handle| {
            let still_there = live.contains(pid);
            if !still_there {
                info!(pid, process = %handle, "process exited");
                report.exited.push(*pid);
            }
            still_there
        });

        for handle in found {
            if procs.insert(handle.pid(), handle.clone()).is_none() {
                info!(pid = handle.pid(), process = %handle, "new process");
                report.added.push(handle.pid());
            }
        }

        drop(procs);
        report.added.sort_unstable();
        report.added.dedup();
        report.exited.sort_unstable();
        report
    }

    /// Copy of the current set. Cheap: a handful of pids and paths.
    pub fn snapshot(&self) -> Vec<ProcessHandle> {
        self.procs.lock().values().cloned().collect()
    }

    /// Track one handle directly (pid mode).
    pub fn insert(&self, handle: ProcessHandle) -> bool {
        self.procs.lock().insert(handle.pid(), handle).is_none()
    }

    /// Drop pids the controller failed to signal. Returns how many went.
    pub fn remove(&self, pids: &[Pid]) -> usize {
        if pids.is_empty() {
            return 0;
        }
        let mut procs = self.procs.lock();
        pids.iter().filter(|pid| procs.remove(pid).is_some()).count()
    }

    /// Empty the set and hand back what was in it (teardown).
    pub fn drain(&self) -> Vec<ProcessHandle> {
        self.procs.lock().drain().map(|(_, h)| h).collect()
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.procs.lock().contains_key(&pid)
    }

    /// Tracked pids, sorted.
    pub fn pids(&self) -> Vec<Pid> {
        let mut pids: Vec<Pid> = self.procs.lock().keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    pub fn len(&self) -> usize {
        self.procs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.procs.lock().is_empty()
    }
}
