//! Thin wrapper over `std::process::Command` for read-only system tools.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::debug;

use crate::error::{ProbeError, ProbeResult};

/// Run `program args...` and return its output if it exited successfully.
///
/// A program that cannot be found maps to [`ProbeError::NotFound`].
pub(crate) fn run(program: &Path, args: &[&str]) -> ProbeResult<Output> {
    let command = describe(program, args);
    debug!(%command, "running probe command");

    let output = Command::new(program).args(args).output().map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            ProbeError::NotFound(PathBuf::from(program))
        } else {
            ProbeError::Exec {
                command: command.clone(),
                source,
            }
        }
    })?;

    if !output.status.success() {
        return Err(ProbeError::Failed {
            command,
            status: output.status.to_string(),
        });
    }
    Ok(output)
}

fn describe(program: &Path, args: &[&str]) -> String {
    let mut command = program.display().to_string();
    for arg in args {
        command.push(' ');
        command.push_str(arg);
    }
    command
}
