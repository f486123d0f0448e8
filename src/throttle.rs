/*
 * throttle.rs
 *
 * cpu percent throttling via SIGSTOP/SIGCONT duty cycling.
 *
 * Out of every base period (1s) the targets run for limit% and are frozen
 * for the rest. No cpu accounting, no feedback: a process that is stopped
 * can't use cpu, a process that runs 10*limit ms per second can't use
 * more than limit%. Idle targets just get less than their budget.
 *
 * NOTE: with the aggregate policy the running slice is divided by the
 * number of tracked processes, so n busy processes together stay near
 * limit% of one core. The frozen slice is never divided.
 *
 * NOTE: Uses SIGSTOP (not catchable) and SIGCONT (catchable). Targets may
 * observe SIGCONT. Only the matched pids are signalled, not their groups.
 */

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::{LimitConfig, LimitPercent, SharePolicy};
use crate::process::Pid;
use crate::shutdown::{WakeReason, Wakeup};
use crate::signal::{Signal, Signaller};
use crate::tracker::ProcessTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Frozen,
}

/// One controller decision: what to send (if anything) and how long to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub signal: Option<Signal>,
    pub sleep: Duration,
}

/*
 * Pure state machine. Knows nothing about processes except how many there
 * are. Starts Running: targets were running before we attached, so the
 * first real step is a STOP.
 */
#[derive(Debug, Clone)]
pub struct DutyCycle {
    period: Duration,
    running: Duration,
    frozen: Duration,
    policy: SharePolicy,
    phase: Phase,
}

impl DutyCycle {
    #[must_use]
    pub fn new(limit: LimitPercent, period: Duration, policy: SharePolicy) -> Self {
        let (running, frozen) = phase_lengths(limit, period);
        Self {
            period,
            running,
            frozen,
            policy,
            phase: Phase::Running,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn running_len(&self) -> Duration {
        self.running
    }

    pub fn frozen_len(&self) -> Duration {
        self.frozen
    }

    /// Advance one phase given how many processes are tracked right now.
    ///
    /// Nothing tracked: no signal, no transition, wait a full period.
    /// Limit 100 has no frozen slice, so it never stops anything.
    pub fn advance(&mut self, tracked: usize) -> Step {
        if tracked == 0 || self.frozen.is_zero() {
            return Step {
                signal: None,
                sleep: self.period,
            };
        }

        match self.phase {
            Phase::Frozen => {
                self.phase = Phase::Running;
                Step {
                    signal: Some(Signal::Cont),
                    sleep: self.running_share(tracked),
                }
            }
            Phase::Running => {
                self.phase = Phase::Frozen;
                Step {
                    signal: Some(Signal::Stop),
                    sleep: self.frozen,
                }
            }
        }
    }

    fn running_share(&self, tracked: usize) -> Duration {
        match self.policy {
            SharePolicy::PerProcess => self.running,
            SharePolicy::Aggregate => {
                let n = u32::try_from(tracked).unwrap_or(u32::MAX);
                self.running / n
            }
        }
    }
}

/// Running slice is 10*limit ms out of a 1000 ms period, scaled to `period`.
#[must_use]
pub fn phase_lengths(limit: LimitPercent, period: Duration) -> (Duration, Duration) {
    let running = period * limit.get() / 100;
    (running, period.saturating_sub(running))
}

/// Outcome of one controller cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub signal: Option<Signal>,
    pub sleep: Duration,
    pub signalled: usize,
    pub removed: Vec<Pid>,
    /// Subset of `removed` that still existed but refused the signal.
    pub failed: Vec<Pid>,
}

/// Why [`Controller::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Woken(WakeReason),
    /* pid mode: the only target is gone and nothing can replace it */
    TargetsGone,
    /* pid mode: the target still exists but refused `signal` */
    TargetUnreachable { pid: Pid, signal: Signal },
}

pub struct Controller<S: Signaller> {
    tracker: Arc<ProcessTracker>,
    duty: DutyCycle,
    signaller: S,
    stop_when_empty: bool,
}

impl<S: Signaller> Controller<S> {
    pub fn new(tracker: Arc<ProcessTracker>, duty: DutyCycle, signaller: S) -> Self {
        Self {
            tracker,
            duty,
            signaller,
            stop_when_empty: false,
        }
    }

    pub fn from_config(config: &LimitConfig, tracker: Arc<ProcessTracker>, signaller: S) -> Self {
        let duty = DutyCycle::new(config.limit, config.period, config.policy);
        Self::new(tracker, duty, signaller).stop_when_empty(config.targets.is_pid())
    }

    /// End [`Controller::run`] once the tracked set is empty. Used in pid
    /// mode where discovery never refills it.
    #[must_use]
    pub fn stop_when_empty(mut self, yes: bool) -> Self {
        self.stop_when_empty = yes;
        self
    }

    pub fn duty(&self) -> &DutyCycle {
        &self.duty
    }

    pub fn signaller(&self) -> &S {
        &self.signaller
    }

    /// Snapshot, decide, signal everyone, prune failures. Lock is only
    /// held for the snapshot and the prune, never across kill(2).
    pub fn cycle(&mut self) -> CycleReport {
        let procs = self.tracker.snapshot();
        let step = self.duty.advance(procs.len());

        let mut report = CycleReport {
            signal: step.signal,
            sleep: step.sleep,
            signalled: 0,
            removed: Vec::new(),
            failed: Vec::new(),
        };
        let Some(signal) = step.signal else {
            return report;
        };

        for handle in &procs {
            match self.signaller.send(handle.pid(), signal) {
                Ok(()) => report.signalled += 1,
                Err(e) if e.is_vanished() => {
                    info!(pid = handle.pid(), process = %handle, "process vanished");
                    report.removed.push(handle.pid());
                }
                Err(e) => {
                    error!(pid = handle.pid(), process = %handle, error = %e, "error signaling process");
                    report.removed.push(handle.pid());
                    report.failed.push(handle.pid());
                }
            }
        }
        self.tracker.remove(&report.removed);

        debug!(
            signal = signal.name(),
            tracked = procs.len(),
            sleep_ms = u64::try_from(step.sleep.as_millis()).unwrap_or(u64::MAX),
            "phase change"
        );
        report
    }

    /// Cycle until woken (signal, discovery done) or, in pid mode, until
    /// the target is gone. Does not resume anything: see [`Controller::release`].
    pub fn run(&mut self, wakeup: &Wakeup) -> StopReason {
        loop {
            let report = self.cycle();

            if self.stop_when_empty && self.tracker.is_empty() {
                return match (report.signal, report.failed.first()) {
                    (Some(signal), Some(&pid)) => StopReason::TargetUnreachable { pid, signal },
                    _ => StopReason::TargetsGone,
                };
            }

            if let Some(reason) = wakeup.wait(report.sleep) {
                return StopReason::Woken(reason);
            }
        }
    }

    /// SIGCONT every tracked process and stop tracking them. Called on the
    /// way out so nothing stays frozen. Returns how many were resumed.
    pub fn release(&mut self) -> usize {
        let mut resumed = 0;
        for handle in self.tracker.drain() {
            match self.signaller.send(handle.pid(), Signal::Cont) {
                Ok(()) => resumed += 1,
                Err(e) if e.is_vanished() => {}
                Err(e) => error!(pid = handle.pid(), error = %e, "cannot resume process"),
            }
        }
        self.duty.phase = Phase::Running;
        resumed
    }
}
