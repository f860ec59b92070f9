use std::path::PathBuf;
use std::time::Duration;

use stickerme_contracts::ValidationError;

/// Outcomes of one upstream call that did not yield an image.
///
/// None of these are retried here; retry policy belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("Image service rejected the credential: {message}")]
    Unauthorized { status: Option<u16>, message: String },

    #[error("Image service quota exceeded ({status}): {message}")]
    QuotaExceeded { status: u16, message: String },

    #[error("Unexpected response from image service: {message}")]
    UpstreamProtocol { status: Option<u16>, message: String },

    #[error("Image service unavailable: {message}")]
    Transient { message: String },
}

impl GenerationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::UpstreamProtocol { .. } => "upstream_protocol_error",
            Self::Transient { .. } => "transient",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to create artifact directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write artifact {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no free filename for '{stem}' after {attempts} attempts")]
    NamesExhausted { stem: String, attempts: u32 },

    #[error("artifact write did not finish within {}s", .timeout.as_secs_f64())]
    TimedOut { timeout: Duration },

    #[error("artifact write abandoned before completion")]
    Abandoned,

    #[error("artifact writer stopped without reporting a result")]
    WorkerLost,

    #[error("invalid artifact name '{name}'")]
    InvalidName { name: String },

    #[error("artifact '{name}' not found")]
    NotFound { name: String },

    #[error("failed to read artifact {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything `Dispatcher::handle` can hand back to the command layer.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(err) => err.kind(),
            Self::Generation(err) => err.kind(),
            Self::Storage(_) => "storage_error",
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::Validation(_) => "resolve",
            Self::Generation(_) => "generate",
            Self::Storage(_) => "persist",
        }
    }

    /// Message suitable for showing to the person who issued the command.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => format!("❌ {err}"),
            Self::Generation(err) => format!("❌ Image generation failed. {err}"),
            Self::Storage(err) => format!("❌ The image was generated but could not be saved: {err}"),
        }
    }
}
