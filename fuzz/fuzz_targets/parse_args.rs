/*
 * fuzz_targets/parse_args.rs
 *
 * fuzz target for CLI argument parsing. Args::try_parse_from followed by
 * LimitConfig::from_args must never panic, whatever the argv.
 *
 * edge cases: "-l" (missing value), "-l 0", "-p -1", "-qv", empty -e,
 * pid and executables together
 */

#![no_main]

use clap::Parser;
use libfuzzer_sys::fuzz_target;
use mcpulimit::args::Args;
use mcpulimit::config::LimitConfig;

fuzz_target!(|data: &[u8]| {
    /* split input on null bytes to simulate multiple arguments */
    let mut argv: Vec<String> = vec!["mcpulimit".to_string()];
    argv.extend(
        data.split(|&b| b == 0)
            .filter_map(|chunk| core::str::from_utf8(chunk).ok())
            .filter(|s| !s.is_empty())
            .map(String::from),
    );

    /* --help, --version and --completions print and exit, not a crash */
    for arg in &argv[1..] {
        if arg.starts_with("-h") || arg.starts_with("-V") || arg.starts_with("--") {
            return;
        }
    }

    if let Ok(args) = Args::try_parse_from(&argv) {
        if let Ok(config) = LimitConfig::from_args(&args) {
            assert!((1..=100).contains(&config.limit.get()));
        }
    }
});
