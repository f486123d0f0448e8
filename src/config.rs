/*
 * config.rs
 *
 * Args in, validated run configuration out. Everything the discovery loop
 * and the controller need is decided here, once, before any thread starts.
 *
 * Executable names resolve to absolute paths up front. /proc/<pid>/exe is
 * always the fully resolved image, so targets are canonicalized too
 * (python3 -> python3.12). A path that doesn't exist yet is kept verbatim,
 * it may show up later.
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::args::Args;
use crate::error::{LimitError, Result};
use crate::process::Pid;

/// Reference period the running/frozen split is carved out of.
pub const BASE_PERIOD: Duration = Duration::from_millis(1000);

/// Discovery cadence. Lazy timeouts count in these.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(1);

pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Integer percent of one CPU, 1..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitPercent(u32);

impl LimitPercent {
    /// # Errors
    ///
    /// [`LimitError::InvalidLimit`] outside 1..=100.
    pub fn new(percent: u32) -> Result<Self> {
        if (1..=100).contains(&percent) {
            Ok(Self(percent))
        } else {
            Err(LimitError::InvalidLimit(percent))
        }
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for LimitPercent {
    fn default() -> Self {
        Self(50)
    }
}

/// How the running slice is split when several processes are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SharePolicy {
    /// The whole group stays near the limit: running slice / n.
    #[default]
    Aggregate,
    /// Each process gets the full running slice.
    PerProcess,
}

/// What to limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// One literal pid. No discovery.
    Pid(Pid),
    /// Absolute executable paths, matched against /proc/<pid>/exe.
    Executables(Vec<PathBuf>),
}

impl TargetSpec {
    /// Path filter for the matcher. None means "every pid matches".
    pub fn paths(&self) -> Option<&[PathBuf]> {
        match self {
            Self::Pid(_) => None,
            Self::Executables(paths) => Some(paths),
        }
    }

    pub fn is_pid(&self) -> bool {
        matches!(self, Self::Pid(_))
    }
}

#[derive(Debug, Clone)]
pub struct LimitConfig {
    pub targets: TargetSpec,
    pub limit: LimitPercent,
    /* None = wait forever */
    pub lazy_timeout: Option<u32>,
    pub policy: SharePolicy,
    pub proc_root: PathBuf,
    pub period: Duration,
    pub scan_interval: Duration,
}

impl LimitConfig {
    /// Config with defaults for everything but the targets.
    #[must_use]
    pub fn new(targets: TargetSpec) -> Self {
        Self {
            targets,
            limit: LimitPercent::default(),
            lazy_timeout: None,
            policy: SharePolicy::default(),
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            period: BASE_PERIOD,
            scan_interval: SCAN_INTERVAL,
        }
    }

    /// # Errors
    ///
    /// `NoTargets` when neither a pid nor an executable was given,
    /// `ExecutableNotFound` when none of the executables resolve,
    /// `InvalidLimit` if the limit slipped past clap.
    pub fn from_args(args: &Args) -> Result<Self> {
        let limit = LimitPercent::new(args.limit)?;

        let targets = match args.pid {
            Some(pid) => {
                let ignored: Vec<&str> = args.executables().collect();
                if !ignored.is_empty() {
                    debug!(pid, ignored = ?ignored, "pid given, executables ignored");
                }
                TargetSpec::Pid(pid)
            }
            None => {
                let names: Vec<&str> = args.executables().collect();
                if names.is_empty() {
                    return Err(LimitError::NoTargets);
                }
                TargetSpec::Executables(resolve_executables(&names)?)
            }
        };

        Ok(Self {
            targets,
            limit,
            lazy_timeout: (args.timeout > 0).then_some(args.timeout),
            policy: if args.per_process {
                SharePolicy::PerProcess
            } else {
                SharePolicy::Aggregate
            },
            proc_root: args.proc_root.clone(),
            period: BASE_PERIOD,
            scan_interval: SCAN_INTERVAL,
        })
    }
}

/// Resolve every name, skipping (and logging) the ones that don't.
///
/// # Errors
///
/// `ExecutableNotFound` listing all names when nothing resolved.
pub fn resolve_executables(names: &[&str]) -> Result<Vec<PathBuf>> {
    let mut resolved: Vec<PathBuf> = Vec::with_capacity(names.len());
    for name in names {
        match resolve_executable(name) {
            Some(path) => {
                debug!(name, path = %path.display(), "resolved executable");
                if !resolved.contains(&path) {
                    resolved.push(path);
                }
            }
            None => warn!(name, "cannot find full path for executable"),
        }
    }

    if resolved.is_empty() {
        return Err(LimitError::ExecutableNotFound(
            names.iter().map(|n| (*n).to_string()).collect(),
        ));
    }
    Ok(resolved)
}

/// Absolute names are taken as is, bare names go through PATH. Existing
/// paths are then canonicalized: the kernel's exe link never points at a
/// symlink, so `/usr/bin/python3 -> python3.12` must match as `python3.12`.
pub fn resolve_executable(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    if path.is_absolute() {
        return Some(canonical_or_verbatim(path));
    }
    which::which(name).ok().map(|found| canonical_or_verbatim(&found))
}

fn canonical_or_verbatim(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
