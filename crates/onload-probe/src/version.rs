//! Onload and TCPDirect version probes.
//!
//! Each probe checks the executable exists before running it, so that
//! "not installed" ([`ProbeError::NotFound`]) is distinguishable from an
//! install that misbehaves.

use std::path::Path;

use regex::Regex;

use crate::command::run;
use crate::error::{ProbeError, ProbeResult};

pub const ONLOAD_BINARY: &str = "onload";
pub const ZF_STACKDUMP_BINARY: &str = "zf_stackdump";

/// Probe the Onload version with `<bin_dir>/onload --version`.
pub fn probe_onload_version(bin_dir: &Path) -> ProbeResult<String> {
    let bin = bin_dir.join(ONLOAD_BINARY);
    if !bin.is_file() {
        return Err(ProbeError::NotFound(bin));
    }
    let output = run(&bin, &["--version"])?;
    parse_onload_version(&String::from_utf8_lossy(&output.stdout))
}

/// Probe the TCPDirect version with `<bin_dir>/zf_stackdump version`.
pub fn probe_zf_version(bin_dir: &Path) -> ProbeResult<String> {
    let bin = bin_dir.join(ZF_STACKDUMP_BINARY);
    if !bin.is_file() {
        return Err(ProbeError::NotFound(bin));
    }
    let output = run(&bin, &["version"])?;
    // zf_stackdump may print its banner on either stream.
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    parse_zf_version(&combined)
}

/// Extract the version from `onload --version` output.
pub fn parse_onload_version(output: &str) -> ProbeResult<String> {
    capture_version(r"^[Oo]nload ([0-9.]+)", output, ONLOAD_BINARY)
}

/// Extract the version from `zf_stackdump version` output.
pub fn parse_zf_version(output: &str) -> ProbeResult<String> {
    capture_version(
        r"^TCPDirect Library version: ([0-9.]+)",
        output,
        ZF_STACKDUMP_BINARY,
    )
}

fn capture_version(pattern: &str, output: &str, tool: &str) -> ProbeResult<String> {
    let re = Regex::new(pattern)?;
    re.captures(output)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| ProbeError::Malformed {
            tool: tool.to_string(),
        })
}
