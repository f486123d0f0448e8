/*
 * proc_info.rs
 *
 * Process matcher. One pass over /proc via procfs: numeric directories are
 * pids, <pid>/exe is a symlink to the running image. A pid matches when
 * that link equals one of the target paths byte for byte.
 *
 * Per-pid failures are normal and silent: processes exit mid-scan, and
 * other users' exe links are EACCES unless we're root. Failing to list
 * /proc itself is not - without it nothing here works.
 */

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

use procfs::process::{Process, all_processes_with_root};

use crate::config::{DEFAULT_PROC_ROOT, TargetSpec};
use crate::error::{LimitError, Result};
use crate::process::{Pid, ProcessHandle};

#[derive(Debug, Clone)]
pub struct ProcessMatcher {
    root: PathBuf,
}

impl Default for ProcessMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl ProcessMatcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan once and return every live process matching `targets`.
    ///
    /// `found` is cleared and reused so the discovery loop doesn't
    /// reallocate every second. Order follows the directory listing.
    ///
    /// # Errors
    ///
    /// [`LimitError::ProcList`] when the listing can't be opened.
    pub fn scan(
        &self,
        mut found: Vec<ProcessHandle>,
        targets: &TargetSpec,
    ) -> Result<Vec<ProcessHandle>> {
        found.clear();

        let processes = all_processes_with_root(&self.root).map_err(|e| LimitError::ProcList {
            path: self.root.clone(),
            source: io::Error::other(e),
        })?;

        /* Err entries: gone between readdir and open, or not a directory */
        for process in processes.flatten() {
            let Some(pid) = live_pid(&process) else {
                continue;
            };

            match targets.paths() {
                None => found.push(ProcessHandle::new(pid)),
                Some(paths) => {
                    if let Some(exe) = matching_exe(&process, paths) {
                        found.push(ProcessHandle::with_exe(pid, exe));
                    }
                }
            }
        }

        Ok(found)
    }
}

/* procfs parses names with str::parse; keep to plain positive decimal pids */
fn live_pid(process: &Process) -> Option<Pid> {
    parse_pid(OsStr::new(&process.pid().to_string()))
}

/* readlink <pid>/exe and compare it against every target */
fn matching_exe(process: &Process, paths: &[PathBuf]) -> Option<PathBuf> {
    let image = process.exe().ok()?;
    paths
        .iter()
        .any(|target| target.as_os_str() == image.as_os_str())
        .then_some(image)
}

/// True for a non-empty name made only of ASCII digits 0 through 9.
#[inline]
pub fn is_pid_name(name: &[u8]) -> bool {
    !name.is_empty() && name.iter().all(u8::is_ascii_digit)
}

/// Directory name -> pid. None for "self", "sys", overflowing numbers, ...
pub fn parse_pid(name: &OsStr) -> Option<Pid> {
    let bytes = name.as_encoded_bytes();
    if !is_pid_name(bytes) {
        return None;
    }
    let pid: Pid = name.to_str()?.parse().ok()?;
    (pid > 0).then_some(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    /* fake /proc: <pid>/exe -> image */
    fn fake_proc(entries: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, image) in entries {
            let pid_dir = dir.path().join(name);
            fs::create_dir(&pid_dir).unwrap();
            symlink(image, pid_dir.join("exe")).unwrap();
        }
        dir
    }

    fn pids(found: &[ProcessHandle]) -> Vec<Pid> {
        let mut pids: Vec<Pid> = found.iter().map(ProcessHandle::pid).collect();
        pids.sort_unstable();
        pids
    }

    #[test]
    fn test_is_pid_name_accepts_all_digits() {
        assert!(is_pid_name(b"0123456789"));
        assert!(is_pid_name(b"9"));
        assert!(is_pid_name(b"99"));
        assert!(is_pid_name(b"1"));
    }

    #[test]
    fn test_is_pid_name_rejects_others() {
        assert!(!is_pid_name(b""));
        assert!(!is_pid_name(b"self"));
        assert!(!is_pid_name(b"12a"));
        assert!(!is_pid_name(b"-12"));
        assert!(!is_pid_name(b"1 2"));
        assert!(!is_pid_name(b":"));
        assert!(!is_pid_name(b"/"));
    }

    #[test]
    fn test_parse_pid_edges() {
        assert_eq!(parse_pid(OsStr::new("919")), Some(919));
        assert_eq!(parse_pid(OsStr::new("0")), None);
        assert_eq!(parse_pid(OsStr::new("99999999999999")), None);
        assert_eq!(parse_pid(OsStr::new("thread-self")), None);
    }

    #[test]
    fn test_scan_filters_by_exe() {
        let proc = fake_proc(&[
            ("100", "/usr/bin/yes"),
            ("101", "/usr/bin/sleep"),
            ("109", "/usr/bin/yes"),
            ("990", "/usr/bin/yes"),
            ("self", "/usr/bin/yes"),
            ("acpi", "/usr/bin/yes"),
        ]);
        let matcher = ProcessMatcher::new(proc.path());
        let targets = TargetSpec::Executables(vec![PathBuf::from("/usr/bin/yes")]);

        let found = matcher.scan(Vec::new(), &targets).unwrap();
        assert_eq!(pids(&found), vec![100, 109, 990]);
        assert!(
            found
                .iter()
                .all(|h| h.exe() == Some(Path::new("/usr/bin/yes")))
        );
    }

    #[test]
    fn test_scan_multiple_targets() {
        let proc = fake_proc(&[
            ("10", "/a/one"),
            ("11", "/a/two"),
            ("12", "/a/three"),
        ]);
        let matcher = ProcessMatcher::new(proc.path());
        let targets =
            TargetSpec::Executables(vec![PathBuf::from("/a/one"), PathBuf::from("/a/three")]);
        let found = matcher.scan(Vec::new(), &targets).unwrap();
        assert_eq!(pids(&found), vec![10, 12]);
    }

    #[test]
    fn test_scan_is_byte_exact_and_case_sensitive() {
        let proc = fake_proc(&[("20", "/usr/bin/Yes"), ("21", "/usr//bin/yes")]);
        let matcher = ProcessMatcher::new(proc.path());
        let targets = TargetSpec::Executables(vec![PathBuf::from("/usr/bin/yes")]);
        let found = matcher.scan(Vec::new(), &targets).unwrap();
        assert!(found.is_empty(), "got {found:?}");
    }

    #[test]
    fn test_scan_without_filter_matches_every_pid() {
        let proc = fake_proc(&[("1", "/sbin/init"), ("2", "/x"), ("39", "/y")]);
        fs::create_dir(proc.path().join("sys")).unwrap();
        let matcher = ProcessMatcher::new(proc.path());
        let found = matcher.scan(Vec::new(), &TargetSpec::Pid(1)).unwrap();
        assert_eq!(pids(&found), vec![1, 2, 39]);
        assert!(found.iter().all(|h| h.exe().is_none()));
    }

    #[test]
    fn test_scan_skips_numeric_files_and_missing_links() {
        let proc = fake_proc(&[("30", "/bin/target")]);
        fs::write(proc.path().join("31"), b"not a dir").unwrap();
        fs::create_dir(proc.path().join("32")).unwrap(); /* no exe link, like a kernel thread */
        let matcher = ProcessMatcher::new(proc.path());

        let targets = TargetSpec::Executables(vec![PathBuf::from("/bin/target")]);
        assert_eq!(pids(&matcher.scan(Vec::new(), &targets).unwrap()), vec![30]);

        /* pid-only mode still sees 32 (a dir) but never the plain file */
        let all = matcher.scan(Vec::new(), &TargetSpec::Pid(1)).unwrap();
        assert_eq!(pids(&all), vec![30, 32]);
    }

    #[test]
    fn test_scan_reuses_buffer() {
        let proc = fake_proc(&[("40", "/bin/t")]);
        let matcher = ProcessMatcher::new(proc.path());
        let targets = TargetSpec::Executables(vec![PathBuf::from("/bin/t")]);

        let stale = vec![ProcessHandle::new(1), ProcessHandle::new(2)];
        let found = matcher.scan(stale, &targets).unwrap();
        assert_eq!(pids(&found), vec![40]);
    }

    #[test]
    fn test_scan_missing_root_is_fatal() {
        let matcher = ProcessMatcher::new("/nonexistent/proc/root");
        let err = matcher
            .scan(Vec::new(), &TargetSpec::Pid(1))
            .unwrap_err();
        assert!(matches!(err, LimitError::ProcList { .. }));
    }

    #[test]
    fn test_real_proc_finds_self() {
        let me = std::process::id() as Pid;
        let exe = fs::read_link(format!("/proc/{me}/exe")).unwrap();
        let found = ProcessMatcher::default()
            .scan(Vec::new(), &TargetSpec::Executables(vec![exe]))
            .unwrap();
        assert!(found.iter().any(|h| h.pid() == me));
    }
}
