//! Transition effects.
//!
//! A transition describes how the outgoing and incoming slides are placed
//! on screen for a given progress in `[0, 1]`. Drawing the placements is
//! shared by every effect.

pub mod fade;
pub mod push;
pub mod scatter;

use crate::module::Module;
use crate::slide::{Placement, PreparedSlide};
use crate::surface::{DisplaySurface, RenderError};

/// Placements of both slides for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// `None` once the outgoing slide is off screen.
    pub from: Option<Placement>,
    pub to: Placement,
    /// Draw the outgoing slide over the incoming one.
    pub from_on_top: bool,
}

pub trait Transition: Module {
    /// Called once before each run, effects pick their random parameters here.
    fn begin(&mut self) {}

    fn frame(&self, progress: f32) -> Frame;

    /// Draw one frame. Does not present.
    fn render(
        &mut self,
        surface: &mut dyn DisplaySurface,
        from: Option<&PreparedSlide>,
        to: &PreparedSlide,
        progress: f32,
    ) -> Result<(), RenderError> {
        let frame = self.frame(progress.clamp(0.0, 1.0));

        surface.clear()?;
        let outgoing = from.zip(frame.from);
        if frame.from_on_top {
            surface.draw(to, frame.to)?;
            if let Some((slide, placement)) = outgoing {
                surface.draw(slide, placement)?;
            }
        } else {
            if let Some((slide, placement)) = outgoing {
                surface.draw(slide, placement)?;
            }
            surface.draw(to, frame.to)?;
        }
        Ok(())
    }
}

/// Easing curves, `t` in `[0, 1]`.
pub mod ease {
    use std::f32::consts::PI;

    pub fn linear(t: f32) -> f32 {
        t
    }

    pub fn cubic_out(t: f32) -> f32 {
        let t = t - 1.0;
        t * t * t + 1.0
    }

    pub fn back_in(t: f32) -> f32 {
        let s = 1.70158;
        t * t * ((s + 1.0) * t - s)
    }

    pub fn sine_in_out(t: f32) -> f32 {
        -0.5 * ((PI * t).cos() - 1.0)
    }

    /// Progress within the `[start, end]` slice of the whole run.
    pub fn phase(progress: f32, start: f32, end: f32) -> f32 {
        ((progress - start) / (end - start)).clamp(0.0, 1.0)
    }
}
