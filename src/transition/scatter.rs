//! Scatter: the outgoing slide is tossed to a random spot like a photo
//! thrown on a table, while the incoming one appears underneath.

use std::sync::Arc;

use rand::Rng;

use super::{ease, Frame, Transition};
use crate::module::{
    BuiltinFactory, Capability, Module, ModuleContext, ModuleError, ModuleFactory, ModuleInfo,
    ModuleKind,
};
use crate::slide::{lerp, Placement};

const DEFAULT_MAX_ROTATION: f32 = 25.0;
const TOSSED_SCALE: f32 = 0.3;

pub fn factory() -> Arc<dyn ModuleFactory> {
    BuiltinFactory::new(
        ModuleInfo::new(
            "scatter",
            ModuleKind::Transition,
            "Slideshow",
            "Toss the slide aside",
        ),
        create,
    )
}

fn create(ctx: &ModuleContext<'_>) -> Result<Capability, ModuleError> {
    let max_rotation = match ctx.options.get("max_rotation") {
        None => DEFAULT_MAX_ROTATION,
        Some(value) => value
            .as_float()
            .or_else(|| value.as_integer().map(|i| i as f64))
            .ok_or_else(|| ModuleError::new(-1, "max_rotation must be a number"))?
            as f32,
    };
    if !max_rotation.is_finite() {
        return Err(ModuleError::new(-1, "max_rotation must be finite"));
    }
    Ok(Capability::Transition(Box::new(Scatter::new(max_rotation))))
}

pub struct Scatter {
    max_rotation: f32,
    target: Placement,
}

impl Scatter {
    pub fn new(max_rotation: f32) -> Self {
        Self {
            max_rotation: max_rotation.abs(),
            target: Placement {
                scale: TOSSED_SCALE,
                ..Placement::centered()
            },
        }
    }
}

impl Module for Scatter {}

impl Transition for Scatter {
    fn begin(&mut self) {
        let mut rng = rand::rng();
        let rotation = if self.max_rotation > 0.0 && self.max_rotation.is_finite() {
            rng.random_range(-self.max_rotation..=self.max_rotation)
        } else {
            0.0
        };
        self.target = Placement {
            position: (rng.random_range(0.15..0.85), rng.random_range(0.15..0.85)),
            scale: TOSSED_SCALE,
            rotation,
            alpha: 1.0,
        };
    }

    fn frame(&self, progress: f32) -> Frame {
        let start = Placement::centered();
        let toss = ease::cubic_out(progress);
        let shrink = ease::back_in(progress);
        let spin = ease::sine_in_out(progress);
        let fade_out = ease::phase(progress, 2.0 / 3.0, 1.0);

        let from = (progress < 1.0).then(|| Placement {
            position: (
                lerp(start.position.0, self.target.position.0, toss),
                lerp(start.position.1, self.target.position.1, toss),
            ),
            scale: lerp(start.scale, self.target.scale, shrink),
            rotation: lerp(start.rotation, self.target.rotation, spin),
            alpha: 1.0 - fade_out,
        });

        Frame {
            from,
            to: Placement {
                alpha: progress,
                ..Placement::centered()
            },
            from_on_top: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_within_bounds() {
        let mut scatter = Scatter::new(10.0);
        for _ in 0..50 {
            scatter.begin();
            let (x, y) = scatter.target.position;
            assert!((0.15..0.85).contains(&x));
            assert!((0.15..0.85).contains(&y));
            assert!(scatter.target.rotation.abs() <= 10.0);
        }
    }

    #[test]
    fn test_scatter_endpoints() {
        let mut scatter = Scatter::new(0.0);
        scatter.begin();

        let start = scatter.frame(0.0);
        assert_eq!(start.from.unwrap().position, (0.5, 0.5));
        assert_eq!(start.to.alpha, 0.0);
        assert!(start.from_on_top);

        let end = scatter.frame(1.0);
        assert!(end.from.is_none());
        assert_eq!(end.to, Placement::centered());
    }

    #[test]
    fn test_max_rotation_option() {
        let mut options = toml::Table::new();
        options.insert("max_rotation".into(), toml::Value::Float(f64::INFINITY));
        let ctx = ModuleContext {
            connection: None,
            options: &options,
        };
        assert!(create(&ctx).is_err());

        options.insert("max_rotation".into(), toml::Value::Float(1e39));
        let ctx = ModuleContext {
            connection: None,
            options: &options,
        };
        assert!(create(&ctx).is_err());

        options.insert("max_rotation".into(), toml::Value::Integer(40));
        let ctx = ModuleContext {
            connection: None,
            options: &options,
        };
        let Ok(Capability::Transition(mut scatter)) = create(&ctx) else {
            panic!("scatter should load");
        };
        scatter.begin();
        assert!(scatter.frame(0.5).from.is_some());
    }

    #[test]
    fn test_unbounded_rotation_stays_flat() {
        let mut scatter = Scatter::new(f32::INFINITY);
        scatter.begin();
        assert_eq!(scatter.target.rotation, 0.0);
    }
}
