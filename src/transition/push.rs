//! Push: the outgoing slide zooms out and is pushed off screen, the
//! incoming one slides in and zooms in.
//!
//! The run is split in three equal phases:
//!
//! ```text
//! 0      1/3        2/3       1
//! | zoom out | exit / enter | zoom in |
//! ```

use std::str::FromStr;
use std::sync::Arc;

use rand::Rng;

use super::{ease, Frame, Transition};
use crate::module::{
    BuiltinFactory, Capability, Module, ModuleContext, ModuleError, ModuleFactory, ModuleInfo,
    ModuleKind,
};
use crate::slide::{lerp, Placement};

/// Scale of a slide while it travels.
const TRAVEL_SCALE: f32 = 0.5;

pub fn factory() -> Arc<dyn ModuleFactory> {
    BuiltinFactory::new(
        ModuleInfo::new(
            "push",
            ModuleKind::Transition,
            "Slideshow",
            "Zoom out, push aside, zoom in",
        ),
        create,
    )
}

fn create(ctx: &ModuleContext<'_>) -> Result<Capability, ModuleError> {
    let direction = match ctx.options.get("direction").and_then(|v| v.as_str()) {
        None | Some("random") => None,
        Some(name) => Some(
            name.parse::<Direction>()
                .map_err(|e| ModuleError::new(-1, e))?,
        ),
    };
    Ok(Capability::Transition(Box::new(Push::new(direction))))
}

/// Where slides travel to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    fn vector(self) -> (f32, f32) {
        match self {
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
        }
    }

    fn random() -> Self {
        match rand::rng().random_range(0..4) {
            0 => Direction::Left,
            1 => Direction::Right,
            2 => Direction::Up,
            _ => Direction::Down,
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(format!("unknown push direction '{}'", other)),
        }
    }
}

pub struct Push {
    /// `None` picks a new direction on every run.
    fixed: Option<Direction>,
    direction: Direction,
}

impl Push {
    pub fn new(fixed: Option<Direction>) -> Self {
        Self {
            fixed,
            direction: fixed.unwrap_or(Direction::Right),
        }
    }
}

impl Module for Push {}

impl Transition for Push {
    fn begin(&mut self) {
        self.direction = self.fixed.unwrap_or_else(Direction::random);
    }

    fn frame(&self, progress: f32) -> Frame {
        let (dx, dy) = self.direction.vector();
        let center = Placement::centered().position;

        let zoom_out = ease::cubic_out(ease::phase(progress, 0.0, 1.0 / 3.0));
        let travel = ease::cubic_out(ease::phase(progress, 1.0 / 3.0, 2.0 / 3.0));
        let zoom_in = ease::cubic_out(ease::phase(progress, 2.0 / 3.0, 1.0));

        let from = (travel < 1.0).then(|| Placement {
            position: (center.0 + dx * travel, center.1 + dy * travel),
            scale: lerp(1.0, TRAVEL_SCALE, zoom_out),
            ..Placement::centered()
        });

        let to = Placement {
            position: (
                lerp(center.0 - dx, center.0, travel),
                lerp(center.1 - dy, center.1, travel),
            ),
            scale: lerp(TRAVEL_SCALE, 1.0, zoom_in),
            ..Placement::centered()
        };

        Frame {
            from,
            to,
            from_on_top: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_phases() {
        let push = Push::new(Some(Direction::Left));

        let start = push.frame(0.0);
        assert_eq!(start.from.unwrap(), Placement::centered());
        assert_eq!(start.to.position, (1.5, 0.5)); // waiting off screen on the right

        let halfway = push.frame(1.0 / 3.0);
        assert_eq!(halfway.from.unwrap().scale, TRAVEL_SCALE);
        assert_eq!(halfway.to.scale, TRAVEL_SCALE);

        let end = push.frame(1.0);
        assert!(end.from.is_none());
        assert_eq!(end.to, Placement::centered());
    }

    #[test]
    fn test_fixed_direction_survives_begin() {
        let mut push = Push::new(Some(Direction::Up));
        push.begin();
        assert_eq!(push.direction, Direction::Up);
    }

    #[test]
    fn test_direction_option() {
        let mut options = toml::Table::new();
        options.insert("direction".into(), toml::Value::String("sideways".into()));
        let ctx = ModuleContext {
            connection: None,
            options: &options,
        };
        assert!(create(&ctx).is_err());

        options.insert("direction".into(), toml::Value::String("down".into()));
        let ctx = ModuleContext {
            connection: None,
            options: &options,
        };
        assert!(create(&ctx).is_ok());
    }
}
