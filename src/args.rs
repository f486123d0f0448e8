/*
 * args.rs
 *
 * Command line surface, declared with clap derive. -l, -t and --proc-root
 * also read MCPULIMIT_* environment variables.
 *
 * Flags follow the classic cpulimit surface: -e/-p/-l/-t. Positional
 * arguments are extra executables, combined with -e. Range checks on -l
 * happen here so a bad limit never reaches the controller.
 */

use std::io;
use std::path::PathBuf;

use clap::CommandFactory;
use clap::Parser;
use clap_complete::Shell;

use crate::process::Pid;

#[derive(Parser, Debug)]
#[command(
    name = "mcpulimit",
    version,
    about = "Cap the CPU usage of running processes with SIGSTOP/SIGCONT",
    long_about = "Keep a set of already-running processes near LIMIT percent of one CPU.\n\n\
                  Targets are either a single pid (-p) or one or more executables\n\
                  (-e and/or positional EXE arguments). Executables are matched\n\
                  against /proc/<pid>/exe every second, so processes started later\n\
                  are picked up and exited ones are dropped.\n\n\
                  By default the limit applies to the whole group: with two matching\n\
                  processes each gets roughly half the running slice. Use\n\
                  --per-process to give every process the full slice.\n\n\
                  Examples:\n\
                    mcpulimit -l 20 -e ffmpeg        # all ffmpeg processes, 20% total\n\
                    mcpulimit -p 4242                # one pid, 50%\n\
                    mcpulimit -t 30 make cc1         # exit after 30s with no match",
    after_help = "Exit status:\n\
                  0   lazy timeout reached, or the -p target exited\n\
                  1   runtime failure (process list unreadable, ...)\n\
                  2   usage error\n\
                  127 executable or pid not found\n\
                  128+N when stopped by signal N (tracked processes are resumed first)"
)]
pub struct Args {
    /// Executable to watch and limit.
    ///
    /// Absolute paths are used as is, bare names are looked up in PATH.
    #[arg(short = 'e', long = "exe", value_name = "NAME")]
    pub exe: Option<String>,

    /// Pid of the process to limit. Disables executable discovery.
    #[arg(
        short = 'p',
        long = "pid",
        value_name = "PID",
        value_parser = clap::value_parser!(i32).range(1..)
    )]
    pub pid: Option<Pid>,

    /// Percent of one CPU (1-100) the targets may use.
    ///
    /// Falls back to MCPULIMIT_LIMIT environment variable.
    #[arg(
        short = 'l',
        long = "limit",
        value_name = "PERCENT",
        default_value_t = 50,
        value_parser = clap::value_parser!(u32).range(1..=100),
        env = "MCPULIMIT_LIMIT"
    )]
    pub limit: u32,

    /// Lazy mode: exit after SECONDS without any matching process.
    ///
    /// 0 (the default) waits forever. Falls back to MCPULIMIT_TIMEOUT.
    #[arg(
        short = 't',
        long = "timeout",
        value_name = "SECONDS",
        default_value_t = 0,
        env = "MCPULIMIT_TIMEOUT"
    )]
    pub timeout: u32,

    /// Give each tracked process the full limit instead of sharing it.
    #[arg(long = "per-process")]
    pub per_process: bool,

    /// Log every signal burst and scan.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Only log errors.
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Root of the process listing.
    #[arg(
        long = "proc-root",
        value_name = "DIR",
        default_value = "/proc",
        env = "MCPULIMIT_PROC_ROOT",
        hide = true
    )]
    pub proc_root: PathBuf,

    /// Generate shell completions and exit.
    #[arg(long = "completions", value_name = "SHELL")]
    pub completions: Option<Shell>,

    /// More executables to watch, combined with -e.
    #[arg(value_name = "EXE")]
    pub exes: Vec<String>,
}

impl Args {
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// All executable names in command-line order, -e first.
    pub fn executables(&self) -> impl Iterator<Item = &str> {
        self.exe
            .iter()
            .chain(self.exes.iter())
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    /// generate shell completions to stdout
    pub fn print_completions(shell: Shell) {
        let mut cmd = Self::command();
        clap_complete::generate(shell, &mut cmd, "mcpulimit", &mut io::stdout());
    }
}
