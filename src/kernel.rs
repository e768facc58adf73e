//! Orchestration root.
//!
//! The kernel owns one browser, one transition, the assembler pool, the
//! playback machine and the display surface, and drives one playback step
//! per [`Kernel::action`] call.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::assembler::AssemblerPool;
use crate::browser::Browser;
use crate::config::Settings;
use crate::connection::ConnectionDescriptor;
use crate::control::Command;
use crate::engine::{Playback, Slots};
use crate::error::{Result, SlideshowError};
use crate::module::{ModuleHandle, ModuleRegistry};
use crate::slide::CollectionId;
use crate::surface::DisplaySurface;
use crate::transition::Transition;

/// Process-level state: the PID file.
#[derive(Debug)]
pub struct RuntimeContext {
    pid_file: Option<PathBuf>,
    written: bool,
}

impl RuntimeContext {
    pub fn new(pid_file: Option<PathBuf>) -> Self {
        Self {
            pid_file,
            written: false,
        }
    }

    /// `slideshow.pid` in the current directory.
    pub fn default_pid_file() -> Option<PathBuf> {
        env::current_dir().ok().map(|cwd| cwd.join("slideshow.pid"))
    }

    pub fn pid_file(&self) -> Option<&Path> {
        self.pid_file.as_deref()
    }

    pub fn write_pid(&mut self) -> Result<()> {
        if let Some(path) = &self.pid_file {
            fs::write(path, format!("{}\n", std::process::id()))?;
            debug!("Wrote PID file {}", path.display());
            self.written = true;
        }
        Ok(())
    }

    pub fn remove_pid(&mut self) {
        if !self.written {
            return;
        }
        if let Some(path) = &self.pid_file {
            if let Err(e) = fs::remove_file(path) {
                warn!("Failed to remove PID file {}: {}", path.display(), e);
            }
        }
        self.written = false;
    }
}

pub struct Kernel<S: DisplaySurface> {
    settings: Settings,
    registry: ModuleRegistry,
    runtime: RuntimeContext,
    surface: S,

    browser: Option<ModuleHandle<Box<dyn Browser>>>,
    transition: Option<ModuleHandle<Box<dyn Transition>>>,
    assemblers: AssemblerPool,
    playback: Playback,

    running: bool,
    quit: bool,
}

impl<S: DisplaySurface> Kernel<S> {
    pub fn new(settings: Settings, registry: ModuleRegistry, surface: S, runtime: RuntimeContext) -> Self {
        let playback = Playback::new(settings.playback.transition_time, settings.playback.switch_time);
        Self {
            settings,
            registry,
            runtime,
            surface,
            browser: None,
            transition: None,
            assemblers: AssemblerPool::new(),
            playback,
            running: false,
            quit: false,
        }
    }

    /// Load the browser and the transition.
    ///
    /// A browser that fails to load leaves the kernel running without
    /// slides. A transition that fails to load is an error.
    pub fn init(&mut self, connection: Option<ConnectionDescriptor>) -> Result<()> {
        self.print_config();

        match connection {
            Some(connection) => self.init_browser(&connection),
            None => warn!("No connection string given"),
        }
        if self.browser.is_none() {
            warn!("No browser selected, you will not see any slides");
        }

        let name = self.settings.playback.transition.clone();
        self.transition = Some(self.registry.load_transition(&name)?);
        Ok(())
    }

    fn init_browser(&mut self, connection: &ConnectionDescriptor) {
        let name = self
            .settings
            .browser
            .module
            .clone()
            .unwrap_or_else(|| connection.provider.clone());

        match self.registry.load_browser(&name, connection) {
            Ok(browser) => {
                self.browser = Some(browser);
                let collection = self.settings.collection();
                if let Err(e) = self.switch_collection(collection) {
                    warn!("{}", e);
                }
            }
            Err(e) => warn!("Failed to load browser '{}': {}", name, e),
        }
    }

    pub fn print_config(&self) {
        let cwd = env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "?".to_string());
        let plugin_path: Vec<String> = self
            .registry
            .search_paths()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let screen = &self.settings.display;

        info!("Slideshow configuration");
        info!("  cwd: {}", cwd);
        info!(
            "  pidfile: {}",
            self.runtime
                .pid_file()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".to_string())
        );
        info!("  pluginpath: {}", plugin_path.join(":"));
        info!(
            "  resolution: {}x{} ({})",
            screen.width,
            screen.height,
            if screen.fullscreen { "fullscreen" } else { "windowed" }
        );
        info!("  transition time: {:.3}s", self.settings.playback.transition_time);
        info!("  switch time: {:.3}s", self.settings.playback.switch_time);
        info!(
            "  connection string: {}",
            self.settings
                .browser
                .connection
                .as_deref()
                .map(masked)
                .unwrap_or_else(|| "none".to_string())
        );
        info!("  transition: {}", self.settings.playback.transition);
        info!("  collection: {}", self.settings.collection());
    }

    /// Begin (or resume after a halt) playback.
    pub fn start(&mut self) -> Result<()> {
        if self.playback.is_halted() {
            info!("Restarting playback");
            self.playback = Playback::new(
                self.settings.playback.transition_time,
                self.settings.playback.switch_time,
            );
        }
        if !self.running {
            self.runtime.write_pid()?;
            info!("Starting slideshow");
        }
        self.running = true;
        Ok(())
    }

    pub fn quit(&mut self) {
        info!("Quitting");
        self.quit = true;
    }

    pub fn is_running(&self) -> bool {
        self.running && !self.quit
    }

    pub fn switch_collection(&mut self, id: CollectionId) -> Result<()> {
        let browser = self.browser.as_mut().ok_or_else(no_browser)?;
        debug!("Switching to collection {}", id);
        browser
            .queue_set(id)
            .and_then(|_| browser.queue_reload())
            .map_err(|e| SlideshowError::ContentSourceUnavailable(e.to_string()))
    }

    pub fn reload(&mut self) -> Result<()> {
        let browser = self.browser.as_mut().ok_or_else(no_browser)?;
        browser
            .queue_reload()
            .map_err(|e| SlideshowError::ContentSourceUnavailable(e.to_string()))
    }

    pub fn dump_queue(&self) {
        match &self.browser {
            Some(browser) => browser.queue_dump(),
            None => info!("No browser selected"),
        }
    }

    /// Replace the transition. On failure the previous one is reopened.
    pub fn load_transition(&mut self, name: &str) -> Result<()> {
        let previous = self.transition.take().map(|handle| {
            let name = handle.name().to_string();
            self.registry.close(handle);
            name
        });

        match self.registry.load_transition(name) {
            Ok(handle) => {
                info!("Transition is now '{}'", name);
                self.transition = Some(handle);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load transition '{}': {}", name, e);
                if let Some(previous) = previous {
                    match self.registry.load_transition(&previous) {
                        Ok(handle) => self.transition = Some(handle),
                        Err(e) => self.playback.halt(format!("no transition available: {}", e)),
                    }
                }
                Err(e)
            }
        }
    }

    pub fn handle(&mut self, command: Command) {
        let result = match command {
            Command::Start => self.start(),
            Command::Quit => {
                self.quit();
                Ok(())
            }
            Command::Reload => self.reload(),
            Command::Dump => {
                self.dump_queue();
                Ok(())
            }
            Command::Collection(id) => self.switch_collection(id),
            Command::Transition(name) => self.load_transition(&name),
        };
        if let Err(e) = result {
            warn!("Command failed: {}", e);
        }
    }

    /// One tick of `dt` seconds. Returns false once the kernel should stop.
    pub fn action(&mut self, dt: f32) -> bool {
        if !self.surface.poll() {
            self.quit = true;
        }
        if self.quit {
            return false;
        }

        if self.step(dt) {
            if let Err(e) = self.surface.present() {
                self.playback.halt(format!("present failed: {}", e));
            }
        } else if let Err(e) = self.surface.idle() {
            debug!("Idle refresh failed: {}", e);
        }
        true
    }

    /// Advance playback. Returns true when a frame was drawn.
    fn step(&mut self, dt: f32) -> bool {
        if !self.running {
            return false;
        }
        let Some(transition) = self.transition.as_mut() else {
            return false;
        };

        let mut slots = Slots {
            registry: &self.registry,
            browser: self.browser.as_mut().map(|handle| &mut ***handle as &mut dyn Browser),
            transition: &mut ***transition,
            assemblers: &mut self.assemblers,
            surface: &mut self.surface,
        };
        self.playback.tick(dt, &mut slots)
    }

    /// Report a halted playback as an error.
    pub fn status(&self) -> Result<()> {
        match self.playback.state() {
            crate::state::PlaybackState::Halted { reason } => {
                Err(SlideshowError::StateMachineHalted(reason.clone()))
            }
            _ => Ok(()),
        }
    }

    #[cfg(test)]
    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    #[cfg(test)]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    #[cfg(test)]
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    #[cfg(test)]
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub fn has_browser(&self) -> bool {
        self.browser.is_some()
    }

    #[cfg(test)]
    pub fn transition_name(&self) -> Option<&str> {
        self.transition.as_ref().map(|t| t.name())
    }

    /// Close every module and remove the PID file.
    pub fn cleanup(&mut self) {
        if let Some(browser) = self.browser.take() {
            self.registry.close(browser);
        }
        if let Some(transition) = self.transition.take() {
            self.registry.close(transition);
        }
        self.assemblers.close_all(&self.registry);
        self.runtime.remove_pid();
        self.running = false;
    }
}

fn no_browser() -> SlideshowError {
    SlideshowError::ContentSourceUnavailable("no browser selected".to_string())
}

/// Connection string for logs, password hidden.
fn masked(connection: &str) -> String {
    match ConnectionDescriptor::parse(connection) {
        Ok(mut descriptor) => {
            if descriptor.password.is_some() {
                descriptor.password = Some("****".to_string());
            }
            descriptor.to_string()
        }
        Err(_) => connection.to_string(),
    }
}
