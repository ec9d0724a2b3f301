//! CLI error type and its exit codes.

use facts_dsl::DslError;
use facts_expr_check::CheckError;
use facts_expr_eval::EvaluationFailure;
use facts_store::StoreError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, #[source] source: std::io::Error },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dsl(#[from] DslError),

    #[error("unknown example: {0}")]
    UnknownExample(String),

    #[error("document has {} problem(s)", .0.len())]
    Check(Vec<CheckError>),

    #[error(transparent)]
    Evaluation(#[from] EvaluationFailure),

    #[error("failed to hash expression: {0}")]
    Hash(#[from] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Read { .. } | CliError::Io(_) | CliError::Hash(_) => 1,
            CliError::Store(_) => 2,
            CliError::Dsl(_) | CliError::UnknownExample(_) | CliError::Check(_) => 3,
            CliError::Evaluation(_) => 4,
        }
    }
}

impl From<&CliError> for std::process::ExitCode {
    fn from(err: &CliError) -> Self {
        std::process::ExitCode::from(err.exit_code())
    }
}
