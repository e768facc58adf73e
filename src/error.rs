//! Error taxonomy for the slideshow core.
//!
//! Parsing and module loading report these to the caller, which decides
//! whether to continue in a degraded mode. Content-source failures never
//! show up here: the playback machine absorbs them as "no slide".

use std::path::PathBuf;

use thiserror::Error;

use crate::module::{ModuleError, ModuleKind};

pub type Result<T> = std::result::Result<T, SlideshowError>;

#[derive(Debug, Error)]
pub enum SlideshowError {
    #[error("malformed connection string '{input}': {reason}")]
    MalformedConnectionString { input: String, reason: &'static str },

    #[error("no {kind} module named '{name}'")]
    ModuleNotFound { name: String, kind: ModuleKind },

    #[error("module '{name}' is a {declared} module, expected {expected}")]
    CapabilityMismatch {
        name: String,
        expected: ModuleKind,
        declared: ModuleKind,
    },

    #[error("module '{name}' was built for ABI version {found}, host expects {expected}")]
    VersionMismatch {
        name: String,
        found: u32,
        expected: u32,
    },

    #[error("module '{name}' failed to initialize: {source}")]
    InitFailed {
        name: String,
        #[source]
        source: ModuleError,
    },

    #[error("invalid module manifest {path}: {message}")]
    InvalidManifest { path: PathBuf, message: String },

    #[error("content source unavailable: {0}")]
    ContentSourceUnavailable(String),

    #[error("playback halted: {0}")]
    StateMachineHalted(String),

    #[error("configuration error in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
