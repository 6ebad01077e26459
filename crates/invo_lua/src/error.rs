//! Error types for control file evaluation.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for script operations.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Errors that can occur while evaluating a control file.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Control file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),
}
