//! On-disk module manifests.
//!
//! A manifest is a small TOML file named `<module>.module` found in one of the
//! plugin search directories. It declares the module's kind and ABI version
//! and binds the module name to one of the compiled-in factories, optionally
//! passing it an `[options]` table:
//!
//! ```toml
//! kind = "transition"
//! version = 1
//! factory = "push"
//! description = "Slow push from the left"
//!
//! [options]
//! direction = "left"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SlideshowError};
use crate::module::ModuleKind;

pub const MANIFEST_SUFFIX: &str = "module";

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Defaults to the file stem.
    #[serde(default)]
    pub name: Option<String>,
    pub kind: ModuleKind,
    pub version: u32,
    pub factory: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub options: toml::Table,

    #[serde(skip)]
    pub path: PathBuf,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut manifest: Manifest =
            toml::from_str(&text).map_err(|e| SlideshowError::InvalidManifest {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if manifest.kind == ModuleKind::Any {
            return Err(SlideshowError::InvalidManifest {
                path: path.to_path_buf(),
                message: "a module must declare a concrete kind".to_string(),
            });
        }

        if manifest.name.is_none() {
            manifest.name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string);
        }
        manifest.path = path.to_path_buf();
        Ok(manifest)
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// Split a colon-delimited search path, dropping empty entries.
pub fn split_search_path(paths: &str) -> Vec<PathBuf> {
    paths
        .split(':')
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Every manifest file in `dirs`, in directory order then `read_dir` order.
///
/// Unreadable directories are skipped.
pub fn discover(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for dir in dirs {
        let Ok(entries) = fs::read_dir(dir) else {
            tracing::debug!("Skipping plugin directory {}", dir.display());
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some(MANIFEST_SUFFIX) {
                found.push(path);
            }
        }
    }
    found
}

/// Path of the manifest for `name`, searching `dirs` in order.
pub fn find(dirs: &[PathBuf], name: &str) -> Option<PathBuf> {
    dirs.iter()
        .map(|dir| dir.join(format!("{}.{}", name, MANIFEST_SUFFIX)))
        .find(|path| path.is_file())
}
