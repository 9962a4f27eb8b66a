use crate::compositing::blit_rgba;
use crate::device::{DeviceWorker, GraphicsDevice};
use crate::error::{Result, SgError};
use crate::model::{AtlasLayout, AtlasRegion, DecodedGraphic, Frame, PackStats, Rect};
use crate::packer::{Packer, StripPacker};
use image::RgbaImage;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, instrument};

/// Decoded graphic to pack, keyed by its resource name.
#[derive(Debug, Clone)]
pub struct InputGraphic {
    pub key: String,
    pub graphic: DecodedGraphic,
}

/// Output of a packing run: layout plus the composed RGBA atlas.
pub struct PackOutput {
    pub layout: AtlasLayout,
    pub rgba: RgbaImage,
}

impl PackOutput {
    /// Convenience for `layout.stats()`.
    pub fn stats(&self) -> PackStats {
        self.layout.stats()
    }
}

/// Options for composing the atlas image.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComposeOptions {
    /// Cap on the atlas width; `None` means unbounded.
    pub max_width: Option<u32>,
    /// Draw red outlines around every frame.
    pub outlines: bool,
}

/// Packs `inputs` onto a single horizontal strip and composes the RGBA atlas.
///
/// Frames keep the input order; each frame's rectangle is the graphic's own size.
#[instrument(skip_all)]
pub fn pack_graphics(inputs: Vec<InputGraphic>) -> Result<PackOutput> {
    pack_graphics_with(inputs, ComposeOptions::default())
}

#[instrument(skip_all)]
pub fn pack_graphics_with(inputs: Vec<InputGraphic>, opts: ComposeOptions) -> Result<PackOutput> {
    let start = Instant::now();
    let sizes = inputs
        .iter()
        .map(|inp| (inp.key.clone(), inp.graphic.width(), inp.graphic.height()));
    let mut layout = layout_strip(sizes, opts.max_width)?;
    for (frame, inp) in layout.frames.iter_mut().zip(&inputs) {
        frame.origin = inp.graphic.origin;
    }

    let mut rgba = RgbaImage::new(layout.width, layout.height);
    for (frame, inp) in layout.frames.iter().zip(&inputs) {
        blit_rgba(
            &inp.graphic.pixels,
            &mut rgba,
            frame.frame.x,
            frame.frame.y,
            opts.outlines,
        );
    }
    debug!(
        frames = layout.frames.len(),
        width = layout.width,
        height = layout.height,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "composed atlas"
    );
    Ok(PackOutput { layout, rgba })
}

/// Keys that occur more than once in `inputs`, each reported once, in first-seen order.
pub fn duplicate_keys(inputs: &[InputGraphic]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dupes = Vec::new();
    for inp in inputs {
        if !seen.insert(inp.key.as_str()) && !dupes.contains(&inp.key) {
            dupes.push(inp.key.clone());
        }
    }
    dupes
}

/// Layout-only packing: computes frame placement without composing pixels.
pub fn pack_layout<K: Into<String>>(inputs: Vec<(K, u32, u32)>) -> Result<AtlasLayout> {
    layout_strip(
        inputs.into_iter().map(|(k, w, h)| (k.into(), w, h)),
        None,
    )
}

fn layout_strip(
    inputs: impl Iterator<Item = (String, u32, u32)>,
    max_width: Option<u32>,
) -> Result<AtlasLayout> {
    let mut packer = match max_width {
        Some(w) => StripPacker::with_max_width(w),
        None => StripPacker::new(),
    };
    let mut frames: Vec<Frame> = Vec::new();
    for (key, w, h) in inputs {
        if w == 0 || h == 0 {
            return Err(SgError::InvalidInput(format!(
                "graphic {key} has an empty size {w}x{h}"
            )));
        }
        let rect = Rect::new(0, 0, w, h);
        let frame = packer.pack(key, &rect).ok_or(SgError::OutOfSpace)?;
        frames.push(frame);
    }
    if frames.is_empty() {
        return Err(SgError::Empty);
    }
    let (width, height) = <StripPacker as Packer<String>>::extent(&packer);
    Ok(AtlasLayout {
        width,
        height,
        frames,
    })
}

/// Uploads a composed atlas through the device worker and returns one region per frame,
/// in frame order.
#[instrument(skip_all)]
pub fn upload_atlas<D: GraphicsDevice + 'static>(
    worker: &DeviceWorker<D>,
    output: PackOutput,
) -> Result<Vec<(String, AtlasRegion)>> {
    let PackOutput { layout, rgba } = output;
    let surface = worker.run_sync(move |device| device.upload(rgba))??;
    debug!(surface = surface.0, frames = layout.frames.len(), "uploaded atlas");
    Ok(layout
        .frames
        .into_iter()
        .map(|f| {
            (
                f.key,
                AtlasRegion {
                    surface,
                    rect: f.frame,
                    origin: f.origin,
                },
            )
        })
        .collect())
}
