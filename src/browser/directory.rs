//! Directory browser: every image of one directory, sorted by file name.
//!
//! Connection string: `dir://@localhost/path/to/photos`. The directory is
//! read on init and again on each reload, so files dropped in while the
//! slideshow runs show up after a reload.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::{Browser, BrowserError, QueueState};
use crate::module::{
    BuiltinFactory, Capability, Module, ModuleContext, ModuleError, ModuleFactory, ModuleInfo,
    ModuleKind,
};
use crate::slide::{CollectionId, SlideDescriptor};

pub fn factory() -> Arc<dyn ModuleFactory> {
    BuiltinFactory::new(
        ModuleInfo::new(
            "directory",
            ModuleKind::Browser,
            "Slideshow",
            "Images of a directory in file name order",
        ),
        create,
    )
}

fn create(ctx: &ModuleContext<'_>) -> Result<Capability, ModuleError> {
    let connection = ctx
        .connection
        .ok_or_else(|| ModuleError::new(-1, "directory browser needs a connection string"))?;
    let looping = ctx
        .options
        .get("loop")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    let mut browser = DirectoryBrowser::new(&connection.name);
    browser.looping = looping;
    Ok(Capability::Browser(Box::new(browser)))
}

// --- Helper: Load and Sort Image Paths ---
pub fn load_sorted_image_paths(dir_path: &Path) -> Result<Vec<PathBuf>, BrowserError> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir_path)? {
        let path = entry?.path();
        if path.is_file() {
            if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
                match ext.to_lowercase().as_str() {
                    "png" | "jpg" | "jpeg" | "bmp" | "gif" => {
                        paths.push(path);
                    }
                    _ => {}
                }
            }
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

pub struct DirectoryBrowser {
    dir: PathBuf,
    paths: Vec<PathBuf>,

    collection: CollectionId,
    /// Last slide handed out; the next one is the first sorted after it.
    last: Option<PathBuf>,
    looping: bool,
}

impl DirectoryBrowser {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            paths: Vec::new(),
            collection: CollectionId::UNSORTED,
            last: None,
            looping: true,
        }
    }

    /// Index of the first path sorted after the cursor.
    fn next_index(&self) -> usize {
        match &self.last {
            Some(last) => self
                .paths
                .partition_point(|p| p.file_name() <= last.file_name()),
            None => 0,
        }
    }

    fn rescan(&mut self) -> Result<(), BrowserError> {
        self.paths = load_sorted_image_paths(&self.dir)?;
        debug!("{} images in {}", self.paths.len(), self.dir.display());
        Ok(())
    }
}

impl Module for DirectoryBrowser {
    fn init(&mut self) -> Result<(), ModuleError> {
        self.rescan()?;
        info!("Browsing {} ({} images)", self.dir.display(), self.paths.len());
        Ok(())
    }
}

impl Browser for DirectoryBrowser {
    fn queue_set(&mut self, id: CollectionId) -> Result<(), BrowserError> {
        if self.collection != id {
            self.last = None;
        }
        self.collection = id;
        Ok(())
    }

    fn queue_reload(&mut self) -> Result<(), BrowserError> {
        self.rescan()
    }

    fn next_slide(&mut self) -> Result<Option<SlideDescriptor>, BrowserError> {
        let mut index = self.next_index();
        if index >= self.paths.len() {
            if !self.looping {
                return Ok(None);
            }
            index = 0;
        }

        let Some(path) = self.paths.get(index).cloned() else {
            return Ok(None);
        };
        self.last = Some(path.clone());
        Ok(Some(SlideDescriptor::new(path)))
    }

    fn queue_state(&self) -> Result<QueueState, BrowserError> {
        let next = self.next_index();
        Ok(QueueState {
            collection: self.collection,
            cursor: next as i64 - 1,
            looping: self.looping,
            intermediate: 0,
            remaining: self.paths.len().saturating_sub(next),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    fn names(browser: &mut DirectoryBrowser, n: usize) -> Vec<Option<String>> {
        (0..n)
            .map(|_| {
                browser.next_slide().unwrap().map(|s| {
                    s.source_path.file_name().unwrap().to_string_lossy().into_owned()
                })
            })
            .collect()
    }

    #[test]
    fn test_load_sorted_image_paths() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.JPG");
        touch(dir.path(), "a.png");
        touch(dir.path(), "notes.txt");
        fs::create_dir(dir.path().join("sub.jpg")).unwrap();

        let paths = load_sorted_image_paths(dir.path()).unwrap();
        let names: Vec<_> = paths.iter().map(|p| p.file_name().unwrap()).collect();
        assert_eq!(names, ["a.png", "b.JPG"]);
    }

    #[test]
    fn test_wraps_around() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "1.jpg");
        touch(dir.path(), "2.jpg");

        let mut browser = DirectoryBrowser::new(dir.path());
        browser.init().unwrap();
        let seen = names(&mut browser, 3);
        assert_eq!(seen, [Some("1.jpg".into()), Some("2.jpg".into()), Some("1.jpg".into())]);
    }

    #[test]
    fn test_stops_without_loop() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "1.jpg");

        let mut browser = DirectoryBrowser::new(dir.path());
        browser.looping = false;
        browser.init().unwrap();
        assert_eq!(names(&mut browser, 2), [Some("1.jpg".into()), None]);
    }

    #[test]
    fn test_reload_keeps_position() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.jpg");
        touch(dir.path(), "c.jpg");

        let mut browser = DirectoryBrowser::new(dir.path());
        browser.init().unwrap();
        assert_eq!(names(&mut browser, 1), [Some("a.jpg".into())]);

        touch(dir.path(), "b.jpg");
        browser.queue_reload().unwrap();
        assert_eq!(names(&mut browser, 2), [Some("b.jpg".into()), Some("c.jpg".into())]);
    }

    #[test]
    fn test_collection_change_rewinds() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.jpg");
        touch(dir.path(), "b.jpg");

        let mut browser = DirectoryBrowser::new(dir.path());
        browser.init().unwrap();
        names(&mut browser, 1);
        browser.queue_set(CollectionId(3)).unwrap();
        assert_eq!(browser.queue_state().unwrap().cursor, -1);
        assert_eq!(names(&mut browser, 1), [Some("a.jpg".into())]);
    }

    #[test]
    fn test_missing_directory_fails_init() {
        let mut browser = DirectoryBrowser::new("/definitely/not/here");
        let err = browser.init().unwrap_err();
        assert_ne!(err.code, 0);
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut browser = DirectoryBrowser::new(dir.path());
        browser.init().unwrap();
        assert_eq!(names(&mut browser, 1), [None]);
    }
}
