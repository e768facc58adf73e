//! Registry resolving module names to ready-to-use instances.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, info, warn};

use super::manifest::{self, Manifest};
use super::{
    Capability, Module, ModuleContext, ModuleFactory, ModuleHandle, ModuleInfo, ModuleKind,
    MODULE_ABI_VERSION,
};
use crate::assembler::Assembler;
use crate::browser::Browser;
use crate::connection::ConnectionDescriptor;
use crate::error::{Result, SlideshowError};
use crate::transition::Transition;

/// A module name resolved to a factory, before anything is constructed.
struct Resolved {
    info: ModuleInfo,
    factory: Arc<dyn ModuleFactory>,
    options: toml::Table,
}

/// Registry of module factories.
///
/// Modules are looked up by name: manifests in the search path first (in
/// directory order), then the compiled-in factories. The registry keeps
/// count of the handles it gave out that are still open.
pub struct ModuleRegistry {
    factories: Vec<Arc<dyn ModuleFactory>>,
    search_paths: Vec<PathBuf>,
    open: Arc<AtomicUsize>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            factories: Vec::new(),
            search_paths,
            open: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a registry with every module compiled into the binary.
    pub fn with_builtins(search_paths: Vec<PathBuf>) -> Self {
        let mut registry = Self::new(search_paths);
        for factory in [
            crate::browser::sqlite::factory(),
            crate::browser::directory::factory(),
            crate::transition::fade::factory(),
            crate::transition::push::factory(),
            crate::transition::scatter::factory(),
            crate::assembler::factory(),
        ] {
            registry.register(factory);
        }
        registry
    }

    /// Register a factory. A later registration with the same name and kind replaces the earlier one.
    pub fn register(&mut self, factory: Arc<dyn ModuleFactory>) {
        let info = factory.info();
        self.factories
            .retain(|f| !(f.info().name == info.name && f.info().kind == info.kind));
        debug!("Registered {} module '{}'", info.kind, info.name);
        self.factories.push(factory);
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Number of handles currently open.
    pub fn open_count(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    fn builtin(&self, name: &str, kind: ModuleKind) -> Option<&Arc<dyn ModuleFactory>> {
        let by_name = || self.factories.iter().filter(move |f| f.info().name == name);
        by_name()
            .find(|f| f.info().kind.satisfies(kind))
            .or_else(|| by_name().next())
    }

    fn resolve(&self, name: &str, kind: ModuleKind) -> Result<Resolved> {
        if let Some(path) = manifest::find(&self.search_paths, name) {
            let manifest = Manifest::load(&path)?;
            return self.resolve_manifest(manifest);
        }

        let factory = self
            .builtin(name, kind)
            .ok_or_else(|| SlideshowError::ModuleNotFound {
                name: name.to_string(),
                kind,
            })?;
        Ok(Resolved {
            info: factory.info(),
            factory: factory.clone(),
            options: toml::Table::new(),
        })
    }

    fn resolve_manifest(&self, manifest: Manifest) -> Result<Resolved> {
        if manifest.version != MODULE_ABI_VERSION {
            return Err(SlideshowError::VersionMismatch {
                name: manifest.name().to_string(),
                found: manifest.version,
                expected: MODULE_ABI_VERSION,
            });
        }

        let factory = self
            .factories
            .iter()
            .find(|f| f.info().name == manifest.factory && f.info().kind == manifest.kind)
            .ok_or_else(|| SlideshowError::InvalidManifest {
                path: manifest.path.clone(),
                message: format!("no {} factory named '{}'", manifest.kind, manifest.factory),
            })?;

        let base = factory.info();
        let info = ModuleInfo {
            name: manifest.name().to_string(),
            kind: manifest.kind,
            version: manifest.version,
            author: manifest.author.clone().unwrap_or(base.author),
            description: manifest.description.clone().unwrap_or(base.description),
        };

        Ok(Resolved {
            info,
            factory: factory.clone(),
            options: manifest.options,
        })
    }

    /// Resolve, construct and initialize a module of the requested kind.
    fn instantiate(
        &self,
        name: &str,
        kind: ModuleKind,
        connection: Option<&ConnectionDescriptor>,
    ) -> Result<(ModuleInfo, Capability)> {
        let resolved = self.resolve(name, kind)?;

        if !resolved.info.kind.satisfies(kind) {
            return Err(SlideshowError::CapabilityMismatch {
                name: name.to_string(),
                expected: kind,
                declared: resolved.info.kind,
            });
        }

        let ctx = ModuleContext {
            connection,
            options: &resolved.options,
        };
        let mut module = resolved
            .factory
            .create(&ctx)
            .map_err(|source| SlideshowError::InitFailed {
                name: name.to_string(),
                source,
            })?;

        module.init().map_err(|source| SlideshowError::InitFailed {
            name: name.to_string(),
            source,
        })?;

        info!(
            "Loaded {} module '{}' (v{}, {})",
            resolved.info.kind, resolved.info.name, resolved.info.version, resolved.info.author
        );
        Ok((resolved.info, module))
    }

    /// Load a module by name, checking that it provides `kind`.
    pub fn load(&self, name: &str, kind: ModuleKind) -> Result<ModuleHandle<Capability>> {
        let (info, module) = self.instantiate(name, kind, None)?;
        Ok(ModuleHandle::new(info, module, self.open.clone()))
    }

    /// Load a browser, handing it the parsed connection string.
    pub fn load_browser(
        &self,
        name: &str,
        connection: &ConnectionDescriptor,
    ) -> Result<ModuleHandle<Box<dyn Browser>>> {
        match self.instantiate(name, ModuleKind::Browser, Some(connection))? {
            (info, Capability::Browser(browser)) => {
                Ok(ModuleHandle::new(info, browser, self.open.clone()))
            }
            (info, other) => Err(mismatch(info, ModuleKind::Browser, other)),
        }
    }

    pub fn load_transition(&self, name: &str) -> Result<ModuleHandle<Box<dyn Transition>>> {
        match self.instantiate(name, ModuleKind::Transition, None)? {
            (info, Capability::Transition(transition)) => {
                Ok(ModuleHandle::new(info, transition, self.open.clone()))
            }
            (info, other) => Err(mismatch(info, ModuleKind::Transition, other)),
        }
    }

    pub fn load_assembler(&self, name: &str) -> Result<ModuleHandle<Box<dyn Assembler>>> {
        match self.instantiate(name, ModuleKind::Assembler, None)? {
            (info, Capability::Assembler(assembler)) => {
                Ok(ModuleHandle::new(info, assembler, self.open.clone()))
            }
            (info, other) => Err(mismatch(info, ModuleKind::Assembler, other)),
        }
    }

    /// Close a handle, logging a failing cleanup hook.
    pub fn close<C: Module>(&self, handle: ModuleHandle<C>) {
        let name = handle.name().to_string();
        if let Err(e) = handle.close() {
            warn!("Module '{}' cleanup failed: {}", name, e);
        }
    }

    /// Describe every module providing `kind`, without constructing any.
    ///
    /// Manifests come first in discovery order, followed by the compiled-in
    /// modules they do not shadow.
    pub fn list(&self, kind: ModuleKind) -> Vec<ModuleInfo> {
        let mut modules: Vec<ModuleInfo> = Vec::new();

        for path in manifest::discover(&self.search_paths) {
            let resolved = Manifest::load(&path).and_then(|m| self.resolve_manifest(m));
            match resolved {
                Ok(resolved) => {
                    if resolved.info.kind.satisfies(kind)
                        && !modules.iter().any(|m| m.name == resolved.info.name)
                    {
                        modules.push(resolved.info);
                    }
                }
                Err(e) => warn!("Ignoring {}: {}", path.display(), e),
            }
        }

        for factory in &self.factories {
            let info = factory.info();
            if info.kind.satisfies(kind) && !modules.iter().any(|m| m.name == info.name) {
                modules.push(info);
            }
        }

        modules
    }
}

fn mismatch(info: ModuleInfo, expected: ModuleKind, built: Capability) -> SlideshowError {
    SlideshowError::CapabilityMismatch {
        name: info.name,
        expected,
        declared: built.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn conn(path: &str) -> ConnectionDescriptor {
        ConnectionDescriptor::parse(&format!("sqlite://@localhost/{}", path)).unwrap()
    }

    #[test]
    fn test_load_builtin_transition() {
        let registry = ModuleRegistry::with_builtins(Vec::new());
        let handle = registry.load_transition("fade").unwrap();
        assert_eq!(handle.name(), "fade");
        assert_eq!(registry.open_count(), 1);
        registry.close(handle);
        assert_eq!(registry.open_count(), 0);
    }

    #[test]
    fn test_unknown_module() {
        let registry = ModuleRegistry::with_builtins(Vec::new());
        let err = registry.load("wobble", ModuleKind::Transition).err().unwrap();
        assert!(matches!(err, SlideshowError::ModuleNotFound { .. }));
    }

    #[test]
    fn test_builtin_capability_mismatch() {
        let registry = ModuleRegistry::with_builtins(Vec::new());
        let err = registry.load_browser("fade", &conn("x.db")).err().unwrap();
        assert!(matches!(
            err,
            SlideshowError::CapabilityMismatch {
                expected: ModuleKind::Browser,
                declared: ModuleKind::Transition,
                ..
            }
        ));
        assert_eq!(registry.open_count(), 0);
    }

    #[test]
    fn test_manifest_capability_mismatch_leaves_nothing_open() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("fancy.module"),
            "kind = \"transition\"\nversion = 1\nfactory = \"fade\"\n",
        )
        .unwrap();

        let registry = ModuleRegistry::with_builtins(vec![dir.path().to_path_buf()]);
        let err = registry.load("fancy", ModuleKind::Browser).err().unwrap();
        assert!(matches!(err, SlideshowError::CapabilityMismatch { .. }));
        assert_eq!(registry.open_count(), 0);
    }

    #[test]
    fn test_manifest_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("future.module"),
            "kind = \"transition\"\nversion = 7\nfactory = \"fade\"\n",
        )
        .unwrap();

        let registry = ModuleRegistry::with_builtins(vec![dir.path().to_path_buf()]);
        let err = registry.load_transition("future").err().unwrap();
        assert!(matches!(err, SlideshowError::VersionMismatch { found: 7, .. }));
    }

    #[test]
    fn test_manifest_aliases_builtin() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("slide-left.module"),
            "kind = \"transition\"\nversion = 1\nfactory = \"push\"\ndescription = \"Push to the left\"\n[options]\ndirection = \"left\"\n",
        )
        .unwrap();

        let registry = ModuleRegistry::with_builtins(vec![dir.path().to_path_buf()]);
        let handle = registry.load_transition("slide-left").unwrap();
        assert_eq!(handle.info().description, "Push to the left");
        assert_eq!(handle.info().kind, ModuleKind::Transition);
    }

    #[test]
    fn test_init_failure_reports_code() {
        let registry = ModuleRegistry::with_builtins(Vec::new());
        let err = registry
            .load_browser("directory", &conn("definitely/not/a/dir"))
            .err()
            .unwrap();
        assert!(matches!(err, SlideshowError::InitFailed { .. }));
        assert_eq!(registry.open_count(), 0);
    }

    #[test]
    fn test_list_does_not_open_modules() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("slow-fade.module"),
            "kind = \"transition\"\nversion = 1\nfactory = \"fade\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("broken.module"), "kind = 12").unwrap();

        let registry = ModuleRegistry::with_builtins(vec![dir.path().to_path_buf()]);
        let names: Vec<String> = registry
            .list(ModuleKind::Transition)
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["slow-fade", "fade", "push", "scatter"]);
        assert_eq!(registry.open_count(), 0);

        let browsers = registry.list(ModuleKind::Browser);
        assert!(browsers.iter().all(|m| m.kind == ModuleKind::Browser));
        assert_eq!(registry.list(ModuleKind::Any).len(), 7);
    }

    #[test]
    fn test_drop_without_close_releases_slot() {
        let registry = ModuleRegistry::with_builtins(Vec::new());
        {
            let _handle = registry.load("push", ModuleKind::Transition).unwrap();
            assert_eq!(registry.open_count(), 1);
        }
        assert_eq!(registry.open_count(), 0);
    }
}
