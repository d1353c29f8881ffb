use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of per-request render failures.
///
/// Every failure inside the worker (bad request, unresolvable bundle, missing
/// export, thrown error, malformed result) is classified into exactly one of
/// these variants before it is serialized. None of them terminate the worker.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderError {
    /// The bundle path (or one of its dependencies) does not resolve to a module.
    #[error("Cannot find module '{0}'")]
    ModuleNotFound(String),

    /// The module loaded but exposes no callable render function.
    #[error("Module {0} does not export a render function")]
    NoRenderExport(String),

    /// Anything else: malformed request, thrown/rejected error, malformed result.
    #[error("{0}")]
    RenderFailed(String),
}

impl RenderError {
    /// Shorthand for [`RenderError::RenderFailed`].
    pub fn render_failed(message: impl Into<String>) -> Self {
        RenderError::RenderFailed(message.into())
    }

    /// The wire discriminant of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::ModuleNotFound(_) => ErrorKind::ModuleNotFound,
            RenderError::NoRenderExport(_) => ErrorKind::NoRenderExport,
            RenderError::RenderFailed(_) => ErrorKind::RenderFailed,
        }
    }

    /// The bundle path carried by path variants.
    pub fn path(&self) -> Option<&str> {
        match self {
            RenderError::ModuleNotFound(path) | RenderError::NoRenderExport(path) => Some(path),
            RenderError::RenderFailed(_) => None,
        }
    }
}

/// Discriminant of [`RenderError`] as carried in the `kind` field of a failure response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ModuleNotFound,
    NoRenderExport,
    RenderFailed,
}

/// Errors surfaced by the host-side bridge client.
///
/// Render failures reported by the worker arrive as [`BridgeError::Render`];
/// the remaining variants describe the transport and the worker process.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to spawn render worker: {0}")]
    Spawn(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Render worker exited before responding")]
    WorkerExited,

    #[error("Render request timed out after {0}ms")]
    Timeout(u64),

    #[error("Frame of {len} bytes exceeds the {max}-byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeError {
    /// Returns the render error if the worker answered with a failure response.
    pub fn as_render_error(&self) -> Option<&RenderError> {
        match self {
            BridgeError::Render(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
