use miette::Diagnostic;
use thiserror::Error;

use rfsight_core::CoreError;

/// CLI-level errors with stable exit codes.
#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("Invalid {field}: {reason}")]
    #[diagnostic(code(rfsight::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(rfsight::core))]
    Core(#[from] CoreError),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } => 2,
            Self::Core(_) => 1,
        }
    }
}
