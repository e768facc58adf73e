//! Where slides end up: the display surface.

use std::path::PathBuf;

use thiserror::Error;
use tracing::trace;

use crate::slide::{Placement, PreparedSlide, Resolution};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to load {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("surface error: {0}")]
    Surface(String),
}

pub trait DisplaySurface {
    fn resolution(&self) -> Resolution;

    /// Process window events. Returns false once the user asked to close.
    fn poll(&mut self) -> bool {
        true
    }

    fn clear(&mut self) -> Result<(), RenderError>;

    fn draw(&mut self, slide: &PreparedSlide, placement: Placement) -> Result<(), RenderError>;

    fn present(&mut self) -> Result<(), RenderError>;

    /// Called on ticks that drew nothing. Keeps the window responsive.
    fn idle(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub path: PathBuf,
    pub placement: Placement,
}

/// Surface without a window. Records what would have been shown.
pub struct HeadlessSurface {
    resolution: Resolution,
    pending: Vec<DrawCall>,
    last_frame: Vec<DrawCall>,
    presented: usize,
    idled: usize,
    open: bool,
    fail_draws: bool,
}

impl HeadlessSurface {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            pending: Vec::new(),
            last_frame: Vec::new(),
            presented: 0,
            idled: 0,
            open: true,
            fail_draws: false,
        }
    }

    /// Draw calls since the last clear.
    #[cfg(test)]
    pub fn pending(&self) -> &[DrawCall] {
        &self.pending
    }

    /// Draw calls of the last presented frame.
    #[cfg(test)]
    pub fn last_frame(&self) -> &[DrawCall] {
        &self.last_frame
    }

    #[cfg(test)]
    pub fn presented(&self) -> usize {
        self.presented
    }

    #[cfg(test)]
    pub fn idled(&self) -> usize {
        self.idled
    }

    /// Make the next `poll` report a closed window.
    #[cfg(test)]
    pub fn close(&mut self) {
        self.open = false;
    }

    /// Make every draw call fail, like a surface that lost its context.
    #[cfg(test)]
    pub fn fail_draws(&mut self, fail: bool) {
        self.fail_draws = fail;
    }
}

impl DisplaySurface for HeadlessSurface {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn poll(&mut self) -> bool {
        self.open
    }

    fn clear(&mut self) -> Result<(), RenderError> {
        self.pending.clear();
        Ok(())
    }

    fn draw(&mut self, slide: &PreparedSlide, placement: Placement) -> Result<(), RenderError> {
        if self.fail_draws {
            return Err(RenderError::Surface("draw refused".to_string()));
        }
        self.pending.push(DrawCall {
            path: slide.path.clone(),
            placement,
        });
        Ok(())
    }

    fn present(&mut self) -> Result<(), RenderError> {
        self.last_frame = std::mem::take(&mut self.pending);
        self.presented += 1;
        trace!("Frame {}: {} slide(s)", self.presented, self.last_frame.len());
        Ok(())
    }

    fn idle(&mut self) -> Result<(), RenderError> {
        self.idled += 1;
        Ok(())
    }
}
