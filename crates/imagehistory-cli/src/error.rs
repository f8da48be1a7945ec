//! Errors of the `imagehistory` binary and their exit codes.

use std::path::PathBuf;

use thiserror::Error;

use imagehistory_core::CoreError;
use imagehistory_graph::GraphError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl CliError {
    /// 3 for I/O failures, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Read { .. } => 3,
            CliError::Core(CoreError::Io(_)) => 3,
            CliError::Graph(GraphError::Io(_)) => 3,
            _ => 1,
        }
    }
}
