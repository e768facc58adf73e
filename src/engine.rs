//! The playback state machine.
//!
//! ```text
//! Initial → Switch → Transition → View → Switch → …
//!              ↺ (nothing to show, retry later)
//! any render error → Halted
//! ```

use tracing::{debug, error, info};

use crate::assembler::AssemblerPool;
use crate::browser::Browser;
use crate::constants::SWITCH_RETRY_INTERVAL;
use crate::module::ModuleRegistry;
use crate::slide::{Placement, PreparedSlide};
use crate::state::PlaybackState;
use crate::surface::{DisplaySurface, RenderError};
use crate::transition::Transition;

/// Everything one tick works with, borrowed from the kernel.
pub struct Slots<'a> {
    pub registry: &'a ModuleRegistry,
    /// `None` when no browser could be loaded.
    pub browser: Option<&'a mut dyn Browser>,
    pub transition: &'a mut dyn Transition,
    pub assemblers: &'a mut AssemblerPool,
    pub surface: &'a mut dyn DisplaySurface,
}

pub struct Playback {
    state: PlaybackState,
    transition_duration: f32,
    switch_time: f32,
}

impl Playback {
    pub fn new(transition_duration: f32, switch_time: f32) -> Self {
        Self {
            state: PlaybackState::Initial,
            transition_duration: transition_duration.max(0.0),
            switch_time: switch_time.max(0.0),
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state.is_halted()
    }

    /// Stop for good. Only a new machine resumes playback.
    pub fn halt(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        error!("Playback halted: {}", reason);
        self.state = PlaybackState::Halted { reason };
    }

    /// Advance by `dt` seconds. Returns true when a frame was drawn and must be presented.
    pub fn tick(&mut self, dt: f32, slots: &mut Slots<'_>) -> bool {
        let was_halted = self.state.is_halted();
        let state = std::mem::replace(&mut self.state, PlaybackState::Initial);

        let (next, drawn) = match state {
            PlaybackState::Initial => (
                PlaybackState::Switch {
                    previous: None,
                    wait: 0.0,
                },
                false,
            ),
            PlaybackState::Switch { previous, wait } => (self.switch(previous, wait - dt, slots), false),
            PlaybackState::Transition { from, to, elapsed } => {
                self.transition(from, to, elapsed + dt, slots)
            }
            PlaybackState::View {
                slide,
                elapsed,
                presented,
            } => self.view(slide, elapsed, presented, dt, slots),
            halted @ PlaybackState::Halted { .. } => (halted, false),
        };

        if let PlaybackState::Halted { reason } = &next {
            if !was_halted {
                error!("Playback halted: {}", reason);
            }
        }
        self.state = next;
        drawn
    }

    fn switch(
        &mut self,
        previous: Option<PreparedSlide>,
        wait: f32,
        slots: &mut Slots<'_>,
    ) -> PlaybackState {
        if wait > 0.0 {
            return PlaybackState::Switch { previous, wait };
        }

        let retry = |previous| PlaybackState::Switch {
            previous,
            wait: SWITCH_RETRY_INTERVAL,
        };

        let Some(browser) = slots.browser.as_deref_mut() else {
            debug!("No browser, nothing to show");
            return retry(previous);
        };

        let descriptor = match browser.next_slide() {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => {
                debug!("No slide available");
                return retry(previous);
            }
            Err(e) => {
                debug!("Browser failed: {} (code {})", e, e.code());
                return retry(previous);
            }
        };

        let resolution = slots.surface.resolution();
        match slots
            .assemblers
            .assemble(slots.registry, &descriptor, resolution)
        {
            Ok(slide) => {
                info!("Next slide: {}", slide.path.display());
                slots.transition.begin();
                PlaybackState::Transition {
                    from: previous,
                    to: slide,
                    elapsed: 0.0,
                }
            }
            Err(e) => {
                debug!("Skipping {}: {}", descriptor.source_path.display(), e);
                retry(previous)
            }
        }
    }

    fn transition(
        &mut self,
        from: Option<PreparedSlide>,
        to: PreparedSlide,
        elapsed: f32,
        slots: &mut Slots<'_>,
    ) -> (PlaybackState, bool) {
        let progress = if self.transition_duration > 0.0 {
            (elapsed / self.transition_duration).clamp(0.0, 1.0)
        } else {
            1.0
        };

        if let Err(e) = slots
            .transition
            .render(&mut *slots.surface, from.as_ref(), &to, progress)
        {
            return (halted("transition", e), false);
        }

        let next = if elapsed >= self.transition_duration {
            PlaybackState::View {
                slide: to,
                elapsed: 0.0,
                presented: false,
            }
        } else {
            PlaybackState::Transition { from, to, elapsed }
        };
        (next, true)
    }

    fn view(
        &mut self,
        slide: PreparedSlide,
        elapsed: f32,
        presented: bool,
        dt: f32,
        slots: &mut Slots<'_>,
    ) -> (PlaybackState, bool) {
        let mut drawn = false;
        if !presented {
            if let Err(e) = draw_static(&mut *slots.surface, &slide) {
                return (halted("view", e), false);
            }
            drawn = true;
        }

        let elapsed = elapsed + dt;
        let next = if elapsed >= self.switch_time {
            PlaybackState::Switch {
                previous: Some(slide),
                wait: 0.0,
            }
        } else {
            PlaybackState::View {
                slide,
                elapsed,
                presented: true,
            }
        };
        (next, drawn)
    }
}

fn draw_static(surface: &mut dyn DisplaySurface, slide: &PreparedSlide) -> Result<(), RenderError> {
    surface.clear()?;
    surface.draw(slide, Placement::centered())
}

fn halted(stage: &str, e: RenderError) -> PlaybackState {
    PlaybackState::Halted {
        reason: format!("{} render failed: {}", stage, e),
    }
}
