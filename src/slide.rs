use std::fmt;
use std::path::PathBuf;

/// Identifies a collection (queue) of slides in a content source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId(pub i64);

impl CollectionId {
    /// Ad-hoc slides that are shown before anything else, whatever collection is active.
    pub const INTERMEDIATE: CollectionId = CollectionId(-1);
    /// Bucket that popped intermediate slides fall back into.
    pub const UNSORTED: CollectionId = CollectionId(0);

    pub fn is_intermediate(self) -> bool {
        self == Self::INTERMEDIATE
    }
}

impl Default for CollectionId {
    fn default() -> Self {
        Self::UNSORTED
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a browser hands out: where the slide lives and who should assemble it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideDescriptor {
    pub source_path: PathBuf,
    pub assembler: Option<String>,
}

impl SlideDescriptor {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            assembler: None,
        }
    }

    #[cfg(test)]
    pub fn with_assembler(mut self, assembler: impl Into<String>) -> Self {
        self.assembler = Some(assembler.into());
        self
    }
}

/// A slide that went through an assembler and is ready to be drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSlide {
    pub path: PathBuf,
    /// EXIF orientation code (1 = as stored, 3 = 180°, 6 = 90° CW, 8 = 90° CCW).
    pub orientation: u16,
    pub assembler: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once('x')
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width = w.trim().parse().map_err(|e| format!("bad width '{}': {}", w, e))?;
        let height = h.trim().parse().map_err(|e| format!("bad height '{}': {}", h, e))?;
        Ok(Self { width, height })
    }
}

/// Where and how a slide is drawn, in normalized screen coordinates.
///
/// `scale` is relative to the size that fits the slide on screen, so 1.0 is
/// the regular "prominent" size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: (f32, f32),
    pub scale: f32,
    pub rotation: f32,
    pub alpha: f32,
}

impl Placement {
    pub fn centered() -> Self {
        Self {
            position: (0.5, 0.5), // Centered
            scale: 1.0,
            rotation: 0.0,
            alpha: 1.0,
        }
    }
}

pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}
