//! Opacity resolution and the separately stored alpha stream.

use crate::decode::{DecodedPixels, expand5, walk_runs};
use image::RgbaImage;
use tracing::warn;

/// Result of merging one alpha stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    /// Alpha values written into the image.
    pub written: usize,
    /// Values addressed below the last row and dropped.
    pub clamped: usize,
    /// The stream ended in the middle of a run.
    pub truncated: bool,
}

/// Expands a stored alpha value; only its low five bits are significant (`0x1f` -> 255).
pub fn expand_alpha(value: u8) -> u8 {
    expand5(value)
}

/// Makes every pixel a run emitted fully opaque. Skipped pixels stay transparent.
pub fn apply_default_opacity(pixels: &mut DecodedPixels) {
    let (rgba, coverage) = pixels.parts_mut();
    for (px, covered) in rgba.pixels_mut().zip(coverage.iter()) {
        if *covered {
            px[3] = 255;
        }
    }
}

/// Overwrites the alpha channel of `rgba` from a skip/emit stream of one byte per pixel.
///
/// Values that fall outside the image are dropped rather than failing the image.
pub fn merge_alpha(rgba: &mut RgbaImage, stream: &[u8]) -> MergeReport {
    let (w, h) = rgba.dimensions();
    if w == 0 || h == 0 {
        return MergeReport {
            clamped: stream.len(),
            ..Default::default()
        };
    }
    let mut written = 0usize;
    let walk = walk_runs(stream, w, h, 1, |x, y, value| {
        rgba.get_pixel_mut(x, y)[3] = expand_alpha(value[0]);
        written += 1;
    });
    let report = MergeReport {
        written,
        clamped: walk.clamped,
        truncated: walk.truncated_at.is_some(),
    };
    if report.clamped > 0 || report.truncated {
        warn!(
            written = report.written,
            clamped = report.clamped,
            truncated = report.truncated,
            "alpha stream does not fit its image"
        );
    }
    report
}

/// Resolves opacity for freshly decoded pixels and merges `alpha_stream` when present.
pub fn finish(mut pixels: DecodedPixels, alpha_stream: &[u8]) -> RgbaImage {
    apply_default_opacity(&mut pixels);
    let mut rgba = pixels.into_rgba();
    if !alpha_stream.is_empty() {
        merge_alpha(&mut rgba, alpha_stream);
    }
    rgba
}
