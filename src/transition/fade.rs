//! Cross-fade between two slides.

use std::sync::Arc;

use super::{ease, Frame, Transition};
use crate::module::{
    BuiltinFactory, Capability, Module, ModuleContext, ModuleError, ModuleFactory, ModuleInfo,
    ModuleKind,
};
use crate::slide::Placement;

pub fn factory() -> Arc<dyn ModuleFactory> {
    BuiltinFactory::new(
        ModuleInfo::new("fade", ModuleKind::Transition, "Slideshow", "Cross-fade"),
        create,
    )
}

fn create(ctx: &ModuleContext<'_>) -> Result<Capability, ModuleError> {
    let smooth = ctx
        .options
        .get("smooth")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    Ok(Capability::Transition(Box::new(Fade::new(smooth))))
}

pub struct Fade {
    /// Ease in and out instead of a linear ramp.
    smooth: bool,
}

impl Fade {
    pub fn new(smooth: bool) -> Self {
        Self { smooth }
    }
}

impl Module for Fade {}

impl Transition for Fade {
    fn frame(&self, progress: f32) -> Frame {
        let t = if progress >= 1.0 {
            1.0
        } else if self.smooth {
            ease::sine_in_out(progress)
        } else {
            ease::linear(progress)
        };

        Frame {
            from: (t < 1.0).then(|| Placement {
                alpha: 1.0 - t,
                ..Placement::centered()
            }),
            to: Placement {
                alpha: t,
                ..Placement::centered()
            },
            from_on_top: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fade_endpoints() {
        let fade = Fade { smooth: true };

        let start = fade.frame(0.0);
        assert_eq!(start.from.unwrap().alpha, 1.0);
        assert!(start.to.alpha.abs() < 1e-5);

        let end = fade.frame(1.0);
        assert!(end.from.is_none());
        assert_eq!(end.to, Placement::centered());
    }

    #[test]
    fn test_linear_midpoint() {
        let fade = Fade { smooth: false };
        let mid = fade.frame(0.5);
        assert_eq!(mid.to.alpha, 0.5);
        assert_eq!(mid.from.unwrap().alpha, 0.5);
    }
}
