pub const RENDER_WIDTH: u32 = 800;              // Default window width
pub const RENDER_HEIGHT: u32 = 600;             // Default window height
pub const FPS: u32 = 60;                        // Frames per second
pub const FRAME_TIME: f32 = 1.0 / FPS as f32;   // Time per frame (seconds)

pub const TRANSITION_DURATION: f32 = 3.0;       // Duration of the transition between two slides (seconds)
pub const SWITCH_TIME: f32 = 5.0;               // Duration each slide is shown once the transition is done (seconds)
pub const SWITCH_RETRY_INTERVAL: f32 = 0.5;     // Wait before asking the browser again when it had nothing (seconds)

pub const DEFAULT_TRANSITION: &str = "fade";
pub const DEFAULT_ASSEMBLER: &str = "image";

pub const FIT_RATIO: f32 = 0.9;                 // Slides are scaled down to 90% of the screen at most
