use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the action framework.
///
/// `Parse`, `Domain` and `Precondition` are fatal before any item is touched.
/// `Load` only takes the offending item out of the run.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("invalid action `{token}`: {reason}")]
    Parse { token: String, reason: String },

    #[error("invalid value in `{token}`: {reason}")]
    Domain { token: String, reason: String },

    #[error("{action}: directory does not exist: {}", .path.display())]
    Precondition { action: &'static str, path: PathBuf },

    #[error("failed to load {}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("path does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("item was discarded: {}", .0.display())]
    Discarded(PathBuf),

    #[error("text extraction failed for {}", .path.display())]
    Extract {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("i/o error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{action}: a {width}x{height} result exceeds the image size limit")]
    TooLarge {
        action: &'static str,
        width: u64,
        height: u64,
    },

    #[error("{action} panicked on {}: {message}", .path.display())]
    Panicked {
        action: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

impl ActionError {
    pub fn parse(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            token: token.into(),
            reason: reason.into(),
        }
    }

    pub fn domain(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Domain {
            token: token.into(),
            reason: reason.into(),
        }
    }
}

pub type ActionResult<T> = Result<T, ActionError>;

/// Render an error chain on one line per cause, the way it is logged.
pub fn handle_error(error: anyhow::Error) -> String {
    let mut message = error.to_string();
    for cause in error.chain().skip(1) {
        message.push_str(&format!("\n  caused by: {}", cause));
    }
    message
}
