/*
 * fuzz_targets/pid_name.rs
 *
 * the /proc entry filter. anything accepted must be all ASCII digits and
 * parse_pid must agree with a plain str::parse on accepted names.
 */

#![no_main]

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

use libfuzzer_sys::fuzz_target;
use mcpulimit::proc_info::{is_pid_name, parse_pid};

fuzz_target!(|data: &[u8]| {
    let accepted = is_pid_name(data);
    assert_eq!(
        accepted,
        !data.is_empty() && data.iter().all(|b| (b'0'..=b'9').contains(b))
    );

    let pid = parse_pid(OsStr::from_bytes(data));
    if let Some(pid) = pid {
        assert!(accepted);
        assert!(pid > 0);
    }
});
