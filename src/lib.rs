/*
 * lib.rs
 *
 * Exists mostly for testing. Integration tests need our types, doc tests
 * need a lib. The binary is a thin shell over runner::run.
 */

//! # mcpulimit
//!
//! Soft CPU cap for already-running processes on Linux.
//!
//! Targets are found by pid or by executable path (`/proc/<pid>/exe`),
//! tracked as they start and exit, and duty-cycled with `SIGSTOP` /
//! `SIGCONT` so they run for `limit`% of every second.
//!
//! ## Quick Start
//!
//! ```rust
//! use mcpulimit::config::{LimitPercent, SharePolicy};
//! use mcpulimit::signal::Signal;
//! use mcpulimit::throttle::DutyCycle;
//! use std::time::Duration;
//!
//! let limit = LimitPercent::new(20).unwrap();
//! let mut duty = DutyCycle::new(limit, Duration::from_secs(1), SharePolicy::Aggregate);
//!
//! /* one tracked process: frozen 800ms, running 200ms */
//! let stop = duty.advance(1);
//! assert_eq!(stop.signal, Some(Signal::Stop));
//! assert_eq!(stop.sleep, Duration::from_millis(800));
//! let cont = duty.advance(1);
//! assert_eq!(cont.signal, Some(Signal::Cont));
//! assert_eq!(cont.sleep, Duration::from_millis(200));
//! ```

pub mod args;
pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod proc_info;
pub mod process;
pub mod runner;
pub mod shutdown;
pub mod signal;
pub mod throttle;
pub mod tracker;

pub use args::Args;
pub use config::{LimitConfig, LimitPercent, SharePolicy, TargetSpec};
pub use error::{LimitError, Result, exit_codes};
pub use proc_info::ProcessMatcher;
pub use process::{Pid, ProcessHandle};
pub use runner::{RunOutcome, run, run_with};
pub use shutdown::{WakeReason, Wakeup};
pub use throttle::{Controller, DutyCycle, Phase};
pub use tracker::{MergeReport, ProcessTracker};
