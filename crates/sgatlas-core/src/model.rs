use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Inclusive right edge coordinate (`x + w - 1`).
    pub fn right(&self) -> u32 {
        self.x + self.w.saturating_sub(1)
    }
    /// Inclusive bottom edge coordinate (`y + h - 1`).
    pub fn bottom(&self) -> u32 {
        self.y + self.h.saturating_sub(1)
    }
    /// Returns true if `r` is fully inside `self` (inclusive edges).
    pub fn contains(&self, r: &Rect) -> bool {
        r.x >= self.x && r.y >= self.y && r.right() <= self.right() && r.bottom() <= self.bottom()
    }
    /// Returns true if the two rectangles share at least one pixel.
    pub fn overlaps(&self, r: &Rect) -> bool {
        self.w > 0
            && self.h > 0
            && r.w > 0
            && r.h > 0
            && self.x < r.x + r.w
            && r.x < self.x + self.w
            && self.y < r.y + r.h
            && r.y < self.y + self.h
    }
}

/// A decoded sprite: RGBA pixels plus the drawing pivot.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGraphic {
    pub pixels: RgbaImage,
    /// Offset of the drawing pivot from the top-left corner.
    pub origin: (i32, i32),
}

impl DecodedGraphic {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels,
            origin: (0, 0),
        }
    }

    pub fn with_origin(mut self, x: i32, y: i32) -> Self {
        self.origin = (x, y);
        self
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Opaque handle to a surface owned by a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceHandle(pub u64);

/// Sub-rectangle of an uploaded atlas surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasRegion {
    pub surface: SurfaceHandle,
    pub rect: Rect,
    pub origin: (i32, i32),
}

/// A placed graphic within the atlas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame<K = String> {
    /// Resource name of the graphic.
    pub key: K,
    /// Placed rectangle within the atlas.
    pub frame: Rect,
    /// Drawing pivot carried over from the decoded graphic.
    pub origin: (i32, i32),
}

/// Geometry of one packed atlas; frames keep the input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtlasLayout<K = String> {
    pub width: u32,
    pub height: u32,
    pub frames: Vec<Frame<K>>,
}

/// Statistics about atlas packing efficiency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PackStats {
    pub num_frames: usize,
    /// Atlas area (width * height).
    pub total_area: u64,
    /// Sum of frame areas.
    pub used_area: u64,
    /// used_area / total_area (0.0 to 1.0).
    pub occupancy: f64,
    pub tallest_frame: u32,
}

impl<K> AtlasLayout<K> {
    pub fn stats(&self) -> PackStats {
        let total_area = (self.width as u64) * (self.height as u64);
        let used_area: u64 = self
            .frames
            .iter()
            .map(|f| (f.frame.w as u64) * (f.frame.h as u64))
            .sum();
        let occupancy = if total_area > 0 {
            used_area as f64 / total_area as f64
        } else {
            0.0
        };
        PackStats {
            num_frames: self.frames.len(),
            total_area,
            used_area,
            occupancy,
            tallest_frame: self.frames.iter().map(|f| f.frame.h).max().unwrap_or(0),
        }
    }
}

impl PackStats {
    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Frames: {}, Occupancy: {:.2}%, Total Area: {} px², Used Area: {} px²",
            self.num_frames,
            self.occupancy * 100.0,
            self.total_area,
            self.used_area,
        )
    }

    /// Returns wasted space in pixels.
    pub fn wasted_area(&self) -> u64 {
        self.total_area.saturating_sub(self.used_area)
    }
}
