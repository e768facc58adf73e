use std::fmt;

use crate::slide::PreparedSlide;

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackState {
    Initial,                                                                  // Nothing shown yet
    Switch { previous: Option<PreparedSlide>, wait: f32 },                    // Asking the browser for the next slide
    Transition { from: Option<PreparedSlide>, to: PreparedSlide, elapsed: f32 }, // Animating between two slides
    View { slide: PreparedSlide, elapsed: f32, presented: bool },             // Showing one slide
    Halted { reason: String },                                                // Rendering failed, nothing more happens
}

impl PlaybackState {
    pub fn is_halted(&self) -> bool {
        matches!(self, PlaybackState::Halted { .. })
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Initial => f.write_str("initial"),
            PlaybackState::Switch { .. } => f.write_str("switch"),
            PlaybackState::Transition { .. } => f.write_str("transition"),
            PlaybackState::View { .. } => f.write_str("view"),
            PlaybackState::Halted { reason } => write!(f, "halted ({})", reason),
        }
    }
}
