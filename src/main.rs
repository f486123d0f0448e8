/*
 * main.rs
 *
 * Parse args, set up logging and the shutdown pipe, call the runner.
 * Boring on purpose. The interesting stuff is in throttle.rs.
 *
 * Signal handlers go in before the first SIGSTOP can go out, so a Ctrl-C
 * at any point still resumes the targets.
 */

use std::process::ExitCode;
use std::sync::Arc;

use tracing::error;

use mcpulimit::args::Args;
use mcpulimit::config::LimitConfig;
use mcpulimit::error::Result;
use mcpulimit::logging::{self, Verbosity};
use mcpulimit::runner::{self, RunOutcome};
use mcpulimit::shutdown::Wakeup;

fn main() -> ExitCode {
    let args = Args::parse_args();

    if let Some(shell) = args.completions {
        Args::print_completions(shell);
        return ExitCode::SUCCESS;
    }

    logging::init(Verbosity::from_flags(args.verbose, args.quiet));

    match try_main(&args) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn try_main(args: &Args) -> Result<RunOutcome> {
    let config = LimitConfig::from_args(args)?;

    let wakeup = Arc::new(Wakeup::new()?);
    wakeup.install_signal_handlers()?;

    runner::run(&config, wakeup)
}
