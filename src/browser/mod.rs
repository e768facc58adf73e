//! Content sources ("browsers").
//!
//! A browser hands out slides one at a time from the active collection.
//! Slides in the intermediate collection always come first and are only
//! shown once. When the active collection runs out the browser either wraps
//! around (looping collections) or reports that it has nothing left.

pub mod directory;
pub mod sqlite;

use thiserror::Error;
use tracing::info;

use crate::module::{Module, ModuleError};
use crate::slide::{CollectionId, SlideDescriptor};

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Unavailable(String),
}

impl BrowserError {
    /// Integer failure code, the way the backing store reports it.
    pub fn code(&self) -> i32 {
        match self {
            BrowserError::Database(rusqlite::Error::SqliteFailure(e, _)) => e.extended_code,
            BrowserError::Database(_) => -1,
            BrowserError::Io(e) => e.raw_os_error().unwrap_or(-1),
            BrowserError::Unavailable(_) => -1,
        }
    }
}

impl From<BrowserError> for ModuleError {
    fn from(e: BrowserError) -> Self {
        ModuleError::new(e.code(), e.to_string())
    }
}

/// Snapshot of a browser's queue position, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueState {
    pub collection: CollectionId,
    /// Ordering key of the last slide handed out from the collection, -1 at the start.
    pub cursor: i64,
    pub looping: bool,
    /// Slides waiting in the intermediate collection.
    pub intermediate: usize,
    /// Slides remaining after the cursor in the active collection.
    pub remaining: usize,
}

/// Protocol every content source implements.
pub trait Browser: Module {
    /// Switch the active collection. Changing collection rewinds to its start.
    fn queue_set(&mut self, id: CollectionId) -> Result<(), BrowserError>;

    /// Pick up external changes of the backing store before the next slide.
    fn queue_reload(&mut self) -> Result<(), BrowserError>;

    /// Next slide to show, or `None` when there is nothing to show.
    fn next_slide(&mut self) -> Result<Option<SlideDescriptor>, BrowserError>;

    fn queue_state(&self) -> Result<QueueState, BrowserError>;

    /// Log the queue state.
    fn queue_dump(&self) {
        match self.queue_state() {
            Ok(state) => info!(
                "Queue: collection {} cursor {} looping {} intermediate {} remaining {}",
                state.collection, state.cursor, state.looping, state.intermediate, state.remaining
            ),
            Err(e) => info!("Queue state unavailable: {} (code {})", e, e.code()),
        }
    }
}
