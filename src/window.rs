//! raylib window surface.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use raylib::prelude::*;
use tracing::debug;

use crate::constants::{FIT_RATIO, FPS};
use crate::slide::{Placement, PreparedSlide, Resolution};
use crate::surface::{DisplaySurface, RenderError};

// GPU resources are declared first so they are released before the window closes
pub struct RaylibSurface {
    textures: HashMap<PathBuf, Texture2D>,
    framebuffer: RenderTexture2D,
    pending: Vec<(PathBuf, Placement)>,
    resolution: Resolution,
    rl: RaylibHandle,
    thread: RaylibThread,
}

impl RaylibSurface {
    pub fn open(resolution: Resolution, fullscreen: bool) -> Result<Self, RenderError> {
        let (mut rl, thread) = raylib::init()
            .size(resolution.width as i32, resolution.height as i32)
            .title("Slideshow")
            .vsync()
            .resizable()
            .build();
        rl.set_target_fps(FPS);
        rl.set_trace_log(TraceLogLevel::LOG_ERROR);
        if fullscreen {
            rl.toggle_fullscreen();
        }

        let framebuffer = rl
            .load_render_texture(&thread, resolution.width, resolution.height)
            .map_err(|e| RenderError::Surface(format!("failed to create render texture: {}", e)))?;

        Ok(Self {
            rl,
            thread,
            resolution,
            framebuffer,
            textures: HashMap::new(),
            pending: Vec::new(),
        })
    }

    fn load_texture(&mut self, slide: &PreparedSlide) -> Result<(), RenderError> {
        if self.textures.contains_key(&slide.path) {
            return Ok(());
        }
        let texture = load_texture_with_rotation(&mut self.rl, &self.thread, &slide.path, slide.orientation)?;
        debug!("Loaded texture for {}", slide.path.display());
        self.textures.insert(slide.path.clone(), texture);
        Ok(())
    }
}

// --- Load Image, Apply EXIF Rotation, Create Texture ---
fn load_texture_with_rotation(
    rl: &mut RaylibHandle,
    thread: &RaylibThread,
    image_path: &Path,
    orientation: u16,
) -> Result<Texture2D, RenderError> {
    let load_error = |message: String| RenderError::Load {
        path: image_path.to_path_buf(),
        message,
    };

    let file_bytes = fs::read(image_path).map_err(|e| load_error(e.to_string()))?;
    let extension = image_path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    let mut image = Image::load_image_from_mem(&(".".to_string() + &extension), &file_bytes)
        .map_err(|e| load_error(e.to_string()))?;

    // Flips (2, 4, 5, 7) are ignored
    match orientation {
        3 => {
            image.rotate_cw();
            image.rotate_cw(); // 180 deg
        }
        6 => image.rotate_cw(),
        8 => image.rotate_ccw(),
        _ => {}
    }

    rl.load_texture_from_image(thread, &image)
        .map_err(|e| load_error(e.to_string()))
}

/// Scale that fits a texture within the screen.
fn fit_scale(tex_width: f32, tex_height: f32, resolution: Resolution) -> f32 {
    let max_width = resolution.width as f32 * FIT_RATIO;
    let max_height = resolution.height as f32 * FIT_RATIO;
    (max_width / tex_width).min(max_height / tex_height).min(1.0)
}

// Draw inverted copy of framebuffer to the screen. Ending the frame also polls input events.
fn blit(rl: &mut RaylibHandle, thread: &RaylibThread, framebuffer: &RenderTexture2D) {
    let mut d = rl.begin_drawing(thread);
    let sw = d.get_screen_width() as f32;
    let sh = d.get_screen_height() as f32;
    d.clear_background(Color::BLACK);
    d.draw_texture_pro(
        framebuffer,
        Rectangle::new(0.0, 0.0, framebuffer.width() as f32, -(framebuffer.height() as f32)),
        Rectangle::new(0.0, 0.0, sw, sh),
        Vector2::new(0.0, 0.0),
        0.0,
        Color::WHITE,
    );
}

fn alt_down(rl: &RaylibHandle) -> bool {
    rl.is_key_down(KeyboardKey::KEY_LEFT_ALT) || rl.is_key_down(KeyboardKey::KEY_RIGHT_ALT)
}

impl DisplaySurface for RaylibSurface {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn poll(&mut self) -> bool {
        if self.rl.is_key_pressed(KeyboardKey::KEY_ENTER) && alt_down(&self.rl) {
            debug!("Toggling fullscreen");
            self.rl.toggle_fullscreen();
        }
        !self.rl.window_should_close()
    }

    fn clear(&mut self) -> Result<(), RenderError> {
        self.pending.clear();
        Ok(())
    }

    fn draw(&mut self, slide: &PreparedSlide, placement: Placement) -> Result<(), RenderError> {
        self.load_texture(slide)?;
        self.pending.push((slide.path.clone(), placement));
        Ok(())
    }

    fn present(&mut self) -> Result<(), RenderError> {
        let Self {
            rl,
            thread,
            resolution,
            framebuffer,
            textures,
            pending,
        } = self;
        let resolution = *resolution;
        let thread: &RaylibThread = thread;

        // --- Render the frame into the fixed size framebuffer ---
        rl.draw_texture_mode(thread, framebuffer, |mut tmd| {
            let mut d = tmd.begin_drawing(thread);
            d.clear_background(Color::BLACK);

            for (path, placement) in pending.iter() {
                let Some(texture) = textures.get(path) else {
                    continue;
                };
                let tex_width = texture.width() as f32;
                let tex_height = texture.height() as f32;
                let scale = fit_scale(tex_width, tex_height, resolution) * placement.scale;

                let scaled_width = tex_width * scale;
                let scaled_height = tex_height * scale;

                // Relative to the dest rectangle (ie. the center of the image)
                let origin = Vector2::new(scaled_width * 0.5, scaled_height * 0.5);

                d.draw_texture_pro(
                    texture,
                    Rectangle::new(0.0, 0.0, tex_width, tex_height),
                    Rectangle::new(
                        resolution.width as f32 * placement.position.0,
                        resolution.height as f32 * placement.position.1,
                        scaled_width,
                        scaled_height,
                    ),
                    origin,
                    placement.rotation,
                    Color::WHITE.alpha(placement.alpha.clamp(0.0, 1.0)),
                );
            }
        });

        blit(rl, thread, framebuffer);

        // Keep only the textures still on screen
        textures.retain(|path, _| pending.iter().any(|(p, _)| p == path));
        Ok(())
    }

    fn idle(&mut self) -> Result<(), RenderError> {
        blit(&mut self.rl, &self.thread, &self.framebuffer);
        Ok(())
    }
}
