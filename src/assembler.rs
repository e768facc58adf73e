//! Slide assemblers turn a descriptor into something drawable.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use exif::{In, Reader, Tag, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::DEFAULT_ASSEMBLER;
use crate::module::{
    BuiltinFactory, Capability, Module, ModuleContext, ModuleError, ModuleFactory, ModuleHandle,
    ModuleInfo, ModuleKind, ModuleRegistry,
};
use crate::slide::{PreparedSlide, Resolution, SlideDescriptor};

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("slide file {0} does not exist")]
    Missing(PathBuf),

    #[error("unsupported slide format: {0}")]
    Unsupported(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("assembler '{name}' unavailable: {message}")]
    Unavailable { name: String, message: String },
}

pub trait Assembler: Module {
    fn assemble(
        &mut self,
        slide: &SlideDescriptor,
        resolution: Resolution,
    ) -> Result<PreparedSlide, AssembleError>;
}

pub fn factory() -> Arc<dyn ModuleFactory> {
    BuiltinFactory::new(
        ModuleInfo::new(
            DEFAULT_ASSEMBLER,
            ModuleKind::Assembler,
            "Slideshow",
            "Still images with EXIF orientation",
        ),
        create,
    )
}

fn create(_ctx: &ModuleContext<'_>) -> Result<Capability, ModuleError> {
    Ok(Capability::Assembler(Box::new(ImageAssembler)))
}

/// Plain image files.
pub struct ImageAssembler;

impl Module for ImageAssembler {}

impl Assembler for ImageAssembler {
    fn assemble(
        &mut self,
        slide: &SlideDescriptor,
        resolution: Resolution,
    ) -> Result<PreparedSlide, AssembleError> {
        let path = &slide.source_path;
        if !path.is_file() {
            return Err(AssembleError::Missing(path.clone()));
        }

        let extension = extension(path);
        let orientation = match extension.as_str() {
            "jpg" | "jpeg" => {
                let bytes = fs::read(path).map_err(|source| AssembleError::Io {
                    path: path.clone(),
                    source,
                })?;
                read_orientation(path, &bytes)
            }
            "png" | "bmp" | "gif" => 1,
            _ => return Err(AssembleError::Unsupported(path.clone())),
        };

        debug!(
            "Assembled {} for {} (orientation {})",
            path.display(),
            resolution,
            orientation
        );
        Ok(PreparedSlide {
            path: path.clone(),
            orientation,
            assembler: DEFAULT_ASSEMBLER.to_string(),
        })
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// EXIF orientation code, 1 when the file carries none.
pub fn read_orientation(path: &Path, bytes: &[u8]) -> u16 {
    match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => {
            if let Some(field) = exif.get_field(Tag::Orientation, In::PRIMARY) {
                if let Value::Short(values) = &field.value {
                    if let Some(&orientation) = values.first() {
                        return orientation;
                    }
                }
            }
            1
        }
        Err(e) => {
            // Non-critical: proceed without rotation
            warn!("Could not read EXIF data for {}: {}", path.display(), e);
            1
        }
    }
}

/// Assemblers loaded so far, by name. Loads on first use.
pub struct AssemblerPool {
    loaded: HashMap<String, ModuleHandle<Box<dyn Assembler>>>,
}

impl AssemblerPool {
    pub fn new() -> Self {
        Self {
            loaded: HashMap::new(),
        }
    }

    pub fn assemble(
        &mut self,
        registry: &ModuleRegistry,
        slide: &SlideDescriptor,
        resolution: Resolution,
    ) -> Result<PreparedSlide, AssembleError> {
        let name = slide.assembler.as_deref().unwrap_or(DEFAULT_ASSEMBLER);

        if !self.loaded.contains_key(name) {
            let handle =
                registry
                    .load_assembler(name)
                    .map_err(|e| AssembleError::Unavailable {
                        name: name.to_string(),
                        message: e.to_string(),
                    })?;
            self.loaded.insert(name.to_string(), handle);
        }

        match self.loaded.get_mut(name) {
            Some(assembler) => assembler.assemble(slide, resolution),
            None => Err(AssembleError::Unavailable {
                name: name.to_string(),
                message: "not loaded".to_string(),
            }),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    /// Close every loaded assembler.
    pub fn close_all(&mut self, registry: &ModuleRegistry) {
        for (_, handle) in self.loaded.drain() {
            registry.close(handle);
        }
    }
}
