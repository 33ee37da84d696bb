//! Terminal-facing error rendering for the miner binary.

use std::fmt;
use std::io;

use crate::error::SaltmineError;

/// A miner error paired with the follow-up a user can act on, so `main`
/// can print a single line and exit.
#[derive(Debug)]
pub struct CliError {
    error: SaltmineError,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, hint(&self.error))
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

pub fn miner_cli_error(error: SaltmineError) -> CliError {
    CliError { error }
}

/// What the user should try next, per error family.
fn hint(err: &SaltmineError) -> &'static str {
    match err {
        SaltmineError::Spec(_) => "check the owner address and the start/end pattern",
        SaltmineError::Device(_) => "check the OpenCL drivers, or build without the gpu feature",
        SaltmineError::Config(_) => "adjust the launch parameters",
        SaltmineError::Io(e) => io_hint(e),
        SaltmineError::Hash(_) | SaltmineError::Internal(_) => "this is a bug, please report it",
    }
}

fn io_hint(err: &io::Error) -> &'static str {
    use io::ErrorKind::*;
    match err.kind() {
        NotFound => "check that the working directory still exists",
        PermissionDenied => "check write permissions for the match log",
        WriteZero => "free up disk space so the match log can be appended",
        _ => "check the match log path and free disk space",
    }
}
