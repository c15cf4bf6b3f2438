//! CLI error handling.

use refmol_authority::AuthorityError;
use refmol_engine::EngineError;
use refmol_store::StoreError;
use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Authority(#[from] AuthorityError),

    #[error("failed to write report: {0}")]
    Report(#[from] std::io::Error),
}

impl CliError {
    /// Exit code for the shell: configuration and store problems exit
    /// 2, systemic authority faults exit 3, everything else 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Store(_) | CliError::Engine(EngineError::MissingReferenceDatabase { .. }) => 2,
            CliError::Authority(_) | CliError::Engine(EngineError::Authority(_)) => 3,
            _ => 1,
        }
    }

    pub fn print(&self) {
        eprintln!("error: {self}");
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
    }
}
