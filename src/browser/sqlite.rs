//! SQLite browser.
//!
//! The `name` part of the connection string is the database file. Slides
//! live in a `slide` table, collections in `queue`:
//!
//! ```sql
//! CREATE TABLE queue (
//!     id INTEGER PRIMARY KEY,
//!     name TEXT NOT NULL DEFAULT '',
//!     loop INTEGER NOT NULL DEFAULT 1
//! );
//!
//! CREATE TABLE slide (
//!     id INTEGER PRIMARY KEY,
//!     path TEXT NOT NULL,
//!     sortorder INTEGER NOT NULL DEFAULT 0,
//!     queue_id INTEGER NOT NULL DEFAULT 0,
//!     assembler TEXT
//! );
//! ```
//!
//! `queue_id = -1` is the intermediate collection and `queue_id = 0` the
//! unsorted bucket intermediate slides are moved to once shown.

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use super::{Browser, BrowserError, QueueState};
use crate::module::{
    BuiltinFactory, Capability, Module, ModuleContext, ModuleError, ModuleFactory, ModuleInfo,
    ModuleKind,
};
use crate::slide::{CollectionId, SlideDescriptor};

pub(crate) const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS queue (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL DEFAULT '',
        loop INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS slide (
        id INTEGER PRIMARY KEY,
        path TEXT NOT NULL,
        sortorder INTEGER NOT NULL DEFAULT 0,
        queue_id INTEGER NOT NULL DEFAULT 0,
        assembler TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_slide_queue
        ON slide(queue_id, sortorder);
"#;

// intermediate slides first, then the next slide of the active queue
const QUERY_SLIDE: &str = r#"
    SELECT id, path, sortorder, queue_id, assembler
        FROM slide
        WHERE queue_id = -1
    UNION
    SELECT id, path, sortorder, queue_id, assembler
        FROM slide
        WHERE queue_id = ?1 AND sortorder > ?2
    ORDER BY queue_id, sortorder, id
    LIMIT 1
"#;

const QUERY_LOOPING: &str = "SELECT loop FROM queue WHERE id = ?1 LIMIT 1";

const QUERY_POP_INTERMEDIATE: &str = "UPDATE slide SET queue_id = 0 WHERE id = ?1";

const QUERY_COUNT_INTERMEDIATE: &str = "SELECT COUNT(*) FROM slide WHERE queue_id = -1";

const QUERY_COUNT_REMAINING: &str =
    "SELECT COUNT(*) FROM slide WHERE queue_id = ?1 AND sortorder > ?2";

pub fn factory() -> Arc<dyn ModuleFactory> {
    BuiltinFactory::new(
        ModuleInfo::new(
            "sqlite",
            ModuleKind::Browser,
            "Slideshow",
            "SQLite3 database browser",
        ),
        create,
    )
}

fn create(ctx: &ModuleContext<'_>) -> Result<Capability, ModuleError> {
    let connection = ctx
        .connection
        .ok_or_else(|| ModuleError::new(-1, "sqlite browser needs a connection string"))?;
    if connection.name.is_empty() {
        return Err(ModuleError::new(-1, "no database file in connection string"));
    }
    Ok(Capability::Browser(Box::new(SqliteBrowser::new(
        &connection.name,
    ))))
}

/// One row of the slide query.
struct SlideRow {
    id: i64,
    path: String,
    sortorder: i64,
    queue_id: i64,
    assembler: Option<String>,
}

pub struct SqliteBrowser {
    path: PathBuf,
    conn: Option<Connection>,

    queue_id: CollectionId,
    prev_sortorder: i64,
    loop_queue: bool,
}

impl SqliteBrowser {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: None,
            queue_id: CollectionId::UNSORTED,
            prev_sortorder: -1,
            loop_queue: true,
        }
    }

    fn conn(&self) -> Result<&Connection, BrowserError> {
        self.conn
            .as_ref()
            .ok_or_else(|| BrowserError::Unavailable("sqlite browser is not connected".into()))
    }

    fn query_slide(&self) -> Result<Option<SlideRow>, BrowserError> {
        let mut stmt = self.conn()?.prepare_cached(QUERY_SLIDE)?;
        let row = stmt
            .query_row(params![self.queue_id.0, self.prev_sortorder], |row| {
                Ok(SlideRow {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    sortorder: row.get(2)?,
                    queue_id: row.get(3)?,
                    assembler: row.get(4)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    fn query_looping(&self, id: CollectionId) -> Result<bool, BrowserError> {
        let mut stmt = self.conn()?.prepare_cached(QUERY_LOOPING)?;
        let looping: Option<i64> = stmt.query_row(params![id.0], |row| row.get(0)).optional()?;
        // queues without a row loop
        Ok(looping.map_or(true, |l| l != 0))
    }

    fn pop_intermediate(&self, id: i64) -> Result<(), BrowserError> {
        let mut stmt = self.conn()?.prepare_cached(QUERY_POP_INTERMEDIATE)?;
        stmt.execute(params![id])?;
        Ok(())
    }
}

impl Module for SqliteBrowser {
    fn init(&mut self) -> Result<(), ModuleError> {
        let conn = Connection::open(&self.path).map_err(BrowserError::from)?;
        conn.execute_batch(SCHEMA).map_err(BrowserError::from)?;

        // fail early on a store that does not match the queries
        for query in [QUERY_SLIDE, QUERY_LOOPING, QUERY_POP_INTERMEDIATE] {
            conn.prepare_cached(query).map_err(BrowserError::from)?;
        }

        info!("Connected to sqlite database {}", self.path.display());
        self.conn = Some(conn);
        self.queue_id = CollectionId::UNSORTED;
        self.prev_sortorder = -1;
        self.loop_queue = true;
        Ok(())
    }

    fn cleanup(&mut self) -> Result<(), ModuleError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| BrowserError::from(e))?;
            debug!("Closed sqlite database {}", self.path.display());
        }
        Ok(())
    }
}

impl Browser for SqliteBrowser {
    fn queue_set(&mut self, id: CollectionId) -> Result<(), BrowserError> {
        if self.queue_id != id {
            self.prev_sortorder = -1;
        }
        self.queue_id = id;

        // stays looping if the lookup fails
        self.loop_queue = true;
        self.loop_queue = self.query_looping(id)?;
        debug!("Queue {} selected (looping: {})", id, self.loop_queue);
        Ok(())
    }

    fn queue_reload(&mut self) -> Result<(), BrowserError> {
        self.loop_queue = self.query_looping(self.queue_id)?;
        Ok(())
    }

    fn next_slide(&mut self) -> Result<Option<SlideDescriptor>, BrowserError> {
        let row = match self.query_slide()? {
            Some(row) => row,
            None if !self.loop_queue => {
                debug!("Queue {} finished", self.queue_id);
                return Ok(None);
            }
            None => {
                debug!("Queue {} wrapping", self.queue_id);
                self.prev_sortorder = -1;
                match self.query_slide()? {
                    Some(row) => row,
                    None => return Ok(None),
                }
            }
        };

        debug!(
            "Slide {} (id {}, sortorder {}, queue {})",
            row.path, row.id, row.sortorder, row.queue_id
        );

        if CollectionId(row.queue_id).is_intermediate() {
            // shown once, then back to the unsorted bucket
            self.pop_intermediate(row.id)?;
        } else {
            self.prev_sortorder = row.sortorder;
        }

        let mut slide = SlideDescriptor::new(row.path);
        slide.assembler = row.assembler;
        Ok(Some(slide))
    }

    fn queue_state(&self) -> Result<QueueState, BrowserError> {
        let conn = self.conn()?;
        let intermediate: i64 = conn.query_row(QUERY_COUNT_INTERMEDIATE, [], |row| row.get(0))?;
        let remaining: i64 = conn.query_row(
            QUERY_COUNT_REMAINING,
            params![self.queue_id.0, self.prev_sortorder],
            |row| row.get(0),
        )?;

        Ok(QueueState {
            collection: self.queue_id,
            cursor: self.prev_sortorder,
            looping: self.loop_queue,
            intermediate: intermediate as usize,
            remaining: remaining as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        path: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("slideshow.db");
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(SCHEMA).unwrap();
            Self { _dir: dir, path }
        }

        fn conn(&self) -> Connection {
            Connection::open(&self.path).unwrap()
        }

        fn add_queue(&self, id: i64, looping: bool) {
            self.conn()
                .execute(
                    "INSERT INTO queue (id, name, loop) VALUES (?1, ?2, ?3)",
                    params![id, format!("queue {}", id), looping as i64],
                )
                .unwrap();
        }

        fn add_slide(&self, path: &str, sortorder: i64, queue_id: i64) {
            self.conn()
                .execute(
                    "INSERT INTO slide (path, sortorder, queue_id, assembler) VALUES (?1, ?2, ?3, 'image')",
                    params![path, sortorder, queue_id],
                )
                .unwrap();
        }

        fn browser(&self) -> SqliteBrowser {
            let mut browser = SqliteBrowser::new(&self.path);
            browser.init().unwrap();
            browser
        }
    }

    fn next_path(browser: &mut SqliteBrowser) -> Option<String> {
        browser
            .next_slide()
            .unwrap()
            .map(|s| s.source_path.to_string_lossy().into_owned())
    }

    #[test]
    fn test_looping_queue_wraps() {
        let fx = Fixture::new();
        fx.add_queue(1, true);
        fx.add_slide("a.jpg", 1, 1);
        fx.add_slide("b.jpg", 2, 1);
        fx.add_slide("c.jpg", 3, 1);

        let mut browser = fx.browser();
        browser.queue_set(CollectionId(1)).unwrap();
        let seen: Vec<_> = (0..4).map(|_| next_path(&mut browser).unwrap()).collect();
        assert_eq!(seen, ["a.jpg", "b.jpg", "c.jpg", "a.jpg"]);
    }

    #[test]
    fn test_non_looping_queue_ends() {
        let fx = Fixture::new();
        fx.add_queue(1, false);
        fx.add_slide("a.jpg", 1, 1);
        fx.add_slide("b.jpg", 2, 1);

        let mut browser = fx.browser();
        browser.queue_set(CollectionId(1)).unwrap();
        assert_eq!(next_path(&mut browser).as_deref(), Some("a.jpg"));
        assert_eq!(next_path(&mut browser).as_deref(), Some("b.jpg"));
        assert_eq!(next_path(&mut browser), None);
        assert_eq!(next_path(&mut browser), None);
    }

    #[test]
    fn test_slides_follow_sortorder() {
        let fx = Fixture::new();
        fx.add_slide("late.jpg", 20, 2);
        fx.add_slide("early.jpg", 5, 2);
        fx.add_slide("other-queue.jpg", 1, 3);

        let mut browser = fx.browser();
        browser.queue_set(CollectionId(2)).unwrap();
        assert_eq!(next_path(&mut browser).as_deref(), Some("early.jpg"));
        assert_eq!(next_path(&mut browser).as_deref(), Some("late.jpg"));
    }

    #[test]
    fn test_intermediate_first_and_once() {
        let fx = Fixture::new();
        fx.add_queue(1, true);
        fx.add_slide("a.jpg", 1, 1);
        fx.add_slide("b.jpg", 2, 1);
        fx.add_slide("urgent-1.jpg", 1, -1);
        fx.add_slide("urgent-2.jpg", 2, -1);

        let mut browser = fx.browser();
        browser.queue_set(CollectionId(1)).unwrap();
        assert_eq!(next_path(&mut browser).as_deref(), Some("urgent-1.jpg"));
        assert_eq!(next_path(&mut browser).as_deref(), Some("urgent-2.jpg"));
        assert_eq!(next_path(&mut browser).as_deref(), Some("a.jpg"));
        assert_eq!(next_path(&mut browser).as_deref(), Some("b.jpg"));
        assert_eq!(next_path(&mut browser).as_deref(), Some("a.jpg"));

        // popped slides land in the unsorted bucket
        let popped: i64 = fx
            .conn()
            .query_row("SELECT COUNT(*) FROM slide WHERE queue_id = 0", [], |row| row.get(0))
            .unwrap();
        assert_eq!(popped, 2);
    }

    #[test]
    fn test_intermediate_does_not_move_cursor() {
        let fx = Fixture::new();
        fx.add_slide("a.jpg", 1, 1);
        fx.add_slide("b.jpg", 2, 1);

        let mut browser = fx.browser();
        browser.queue_set(CollectionId(1)).unwrap();
        assert_eq!(next_path(&mut browser).as_deref(), Some("a.jpg"));

        fx.add_slide("breaking-news.jpg", 100, -1);
        assert_eq!(next_path(&mut browser).as_deref(), Some("breaking-news.jpg"));
        assert_eq!(next_path(&mut browser).as_deref(), Some("b.jpg"));
    }

    #[test]
    fn test_queue_set_resets_cursor() {
        let fx = Fixture::new();
        fx.add_slide("a.jpg", 1, 1);
        fx.add_slide("b.jpg", 2, 1);
        fx.add_slide("x.jpg", 1, 2);

        let mut browser = fx.browser();
        browser.queue_set(CollectionId(1)).unwrap();
        assert_eq!(next_path(&mut browser).as_deref(), Some("a.jpg"));

        browser.queue_set(CollectionId(2)).unwrap();
        assert_eq!(browser.queue_state().unwrap().cursor, -1);
        assert_eq!(next_path(&mut browser).as_deref(), Some("x.jpg"));

        browser.queue_set(CollectionId(1)).unwrap();
        assert_eq!(next_path(&mut browser).as_deref(), Some("a.jpg"));

        // same queue again keeps the position
        browser.queue_set(CollectionId(1)).unwrap();
        assert_eq!(next_path(&mut browser).as_deref(), Some("b.jpg"));
    }

    #[test]
    fn test_unsorted_bucket_advances() {
        let fx = Fixture::new();
        fx.add_slide("u1.jpg", 1, 0);
        fx.add_slide("u2.jpg", 2, 0);

        let mut browser = fx.browser();
        browser.queue_set(CollectionId::UNSORTED).unwrap();
        assert_eq!(next_path(&mut browser).as_deref(), Some("u1.jpg"));
        assert_eq!(next_path(&mut browser).as_deref(), Some("u2.jpg"));
        assert_eq!(next_path(&mut browser).as_deref(), Some("u1.jpg"));
    }

    #[test]
    fn test_reload_picks_up_loop_flag() {
        let fx = Fixture::new();
        fx.add_queue(1, true);
        fx.add_slide("a.jpg", 1, 1);

        let mut browser = fx.browser();
        browser.queue_set(CollectionId(1)).unwrap();
        assert_eq!(next_path(&mut browser).as_deref(), Some("a.jpg"));

        fx.conn().execute("UPDATE queue SET loop = 0 WHERE id = 1", []).unwrap();
        browser.queue_reload().unwrap();
        assert!(!browser.queue_state().unwrap().looping);
        assert_eq!(next_path(&mut browser), None);
    }

    #[test]
    fn test_empty_database() {
        let fx = Fixture::new();
        let mut browser = fx.browser();
        assert_eq!(next_path(&mut browser), None);
    }

    #[test]
    fn test_assembler_column() {
        let fx = Fixture::new();
        fx.add_slide("a.jpg", 1, 0);
        let mut browser = fx.browser();
        let slide = browser.next_slide().unwrap().unwrap();
        assert_eq!(slide.assembler.as_deref(), Some("image"));
    }

    #[test]
    fn test_queue_state() {
        let fx = Fixture::new();
        fx.add_queue(4, false);
        fx.add_slide("a.jpg", 1, 4);
        fx.add_slide("b.jpg", 2, 4);
        fx.add_slide("i.jpg", 1, -1);

        let mut browser = fx.browser();
        browser.queue_set(CollectionId(4)).unwrap();
        let state = browser.queue_state().unwrap();
        assert_eq!(state.collection, CollectionId(4));
        assert!(!state.looping);
        assert_eq!(state.intermediate, 1);
        assert_eq!(state.remaining, 2);
        browser.queue_dump();
    }

    #[test]
    fn test_not_connected() {
        let mut browser = SqliteBrowser::new("unused.db");
        let err = browser.next_slide().unwrap_err();
        assert_eq!(err.code(), -1);
    }

    #[test]
    fn test_cleanup_closes_connection() {
        let fx = Fixture::new();
        let mut browser = fx.browser();
        browser.cleanup().unwrap();
        assert!(browser.next_slide().is_err());
    }
}
