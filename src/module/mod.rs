//! Module (plugin) abstraction.
//!
//! A module implements one capability: a content source ([`Browser`]), a
//! [`Transition`] effect or a slide [`Assembler`]. Modules are built by
//! factories held in a [`ModuleRegistry`] and handed out as a
//! [`ModuleHandle`], which is the single owner of the instance. Closing the
//! handle runs the module's cleanup hook.
//!
//! ## Lifecycle
//!
//! ```text
//! resolve (name, kind) → create → init → [in use] → cleanup → drop
//! ```
//!
//! Enumeration through [`ModuleRegistry::list`] only reads descriptors and
//! never creates or initializes anything.

pub mod manifest;
pub mod registry;

pub use registry::ModuleRegistry;

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::assembler::Assembler;
use crate::browser::Browser;
use crate::connection::ConnectionDescriptor;
use crate::transition::Transition;

/// Version of the module contract. Manifests declaring another version are refused.
pub const MODULE_ABI_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Browser,
    Transition,
    Assembler,
    Any,
}

impl ModuleKind {
    /// Whether a module declaring `self` satisfies a request for `requested`.
    pub fn satisfies(self, requested: ModuleKind) -> bool {
        requested == ModuleKind::Any || self == requested
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleKind::Browser => "browser",
            ModuleKind::Transition => "transition",
            ModuleKind::Assembler => "assembler",
            ModuleKind::Any => "any",
        };
        f.write_str(name)
    }
}

/// Self-description of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub kind: ModuleKind,
    pub version: u32,
    pub author: String,
    pub description: String,
}

impl ModuleInfo {
    pub fn new(name: &str, kind: ModuleKind, author: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            version: MODULE_ABI_VERSION,
            author: author.to_string(),
            description: description.to_string(),
        }
    }
}

/// Failure reported by a module hook, with the module's native error code.
#[derive(Debug, Error)]
#[error("{message} (code {code})")]
pub struct ModuleError {
    pub code: i32,
    pub message: String,
}

impl ModuleError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Lifecycle hooks shared by every capability.
pub trait Module {
    /// Establish whatever the module needs (connections, caches).
    fn init(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Release what `init` acquired.
    fn cleanup(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }
}

impl<T: Module + ?Sized> Module for Box<T> {
    fn init(&mut self) -> Result<(), ModuleError> {
        (**self).init()
    }

    fn cleanup(&mut self) -> Result<(), ModuleError> {
        (**self).cleanup()
    }
}

/// A constructed module, tagged by capability.
pub enum Capability {
    Browser(Box<dyn Browser>),
    Transition(Box<dyn Transition>),
    Assembler(Box<dyn Assembler>),
}

impl Capability {
    pub fn kind(&self) -> ModuleKind {
        match self {
            Capability::Browser(_) => ModuleKind::Browser,
            Capability::Transition(_) => ModuleKind::Transition,
            Capability::Assembler(_) => ModuleKind::Assembler,
        }
    }
}

impl Module for Capability {
    fn init(&mut self) -> Result<(), ModuleError> {
        match self {
            Capability::Browser(m) => m.init(),
            Capability::Transition(m) => m.init(),
            Capability::Assembler(m) => m.init(),
        }
    }

    fn cleanup(&mut self) -> Result<(), ModuleError> {
        match self {
            Capability::Browser(m) => m.cleanup(),
            Capability::Transition(m) => m.cleanup(),
            Capability::Assembler(m) => m.cleanup(),
        }
    }
}

/// Everything a factory may need to build its module.
pub struct ModuleContext<'a> {
    /// Only set when loading a browser.
    pub connection: Option<&'a ConnectionDescriptor>,
    /// The `[options]` table of the manifest, empty for built-ins.
    pub options: &'a toml::Table,
}

/// Builds instances of one module.
pub trait ModuleFactory {
    fn info(&self) -> ModuleInfo;

    fn create(&self, ctx: &ModuleContext<'_>) -> Result<Capability, ModuleError>;
}

pub type CreateFn = fn(&ModuleContext<'_>) -> Result<Capability, ModuleError>;

/// Factory for a module compiled into the binary.
pub struct BuiltinFactory {
    info: ModuleInfo,
    create: CreateFn,
}

impl BuiltinFactory {
    pub fn new(info: ModuleInfo, create: CreateFn) -> Arc<dyn ModuleFactory> {
        Arc::new(Self { info, create })
    }
}

impl ModuleFactory for BuiltinFactory {
    fn info(&self) -> ModuleInfo {
        self.info.clone()
    }

    fn create(&self, ctx: &ModuleContext<'_>) -> Result<Capability, ModuleError> {
        (self.create)(ctx)
    }
}

/// Owner of an open module.
///
/// Dropping a handle that was not closed still runs the cleanup hook.
pub struct ModuleHandle<C: Module> {
    info: ModuleInfo,
    module: C,
    open: Arc<AtomicUsize>,
    closed: bool,
}

impl<C: Module> ModuleHandle<C> {
    pub(crate) fn new(info: ModuleInfo, module: C, open: Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self {
            info,
            module,
            open,
            closed: false,
        }
    }

    #[cfg(test)]
    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Run the cleanup hook and release the module.
    pub fn close(mut self) -> Result<(), ModuleError> {
        debug!("Closing {} module '{}'", self.info.kind, self.info.name);
        self.closed = true;
        self.module.cleanup()
    }
}

impl<C: Module> Deref for ModuleHandle<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.module
    }
}

impl<C: Module> DerefMut for ModuleHandle<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.module
    }
}

impl<C: Module> Drop for ModuleHandle<C> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.module.cleanup() {
                warn!("Cleanup of module '{}' failed: {}", self.info.name, e);
            }
        }
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}
