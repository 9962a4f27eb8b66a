//! Per-image pixel decoding.
//!
//! Every encoding writes RGB555 pixels with alpha 0 into a [`DecodedPixels`] buffer that also
//! tracks which pixels were actually emitted. [`crate::alpha::finish`] turns that into the final
//! RGBA image: emitted pixels become opaque, then the optional alpha stream is merged on top.

use crate::alpha;
use crate::config::DecoderConfig;
use crate::cursor::Cursor;
use crate::error::{Result, SgError};
use crate::model::DecodedGraphic;
use crate::records::{ImageKind, ImageRecord};
use image::{Rgba, RgbaImage};
use std::borrow::Cow;
use tracing::debug;

pub const ISOMETRIC_TILE_WIDTH: u32 = 58;
pub const ISOMETRIC_TILE_HEIGHT: u32 = 30;
pub const ISOMETRIC_TILE_BYTES: usize = 1800;
pub const ISOMETRIC_LARGE_TILE_WIDTH: u32 = 78;
pub const ISOMETRIC_LARGE_TILE_HEIGHT: u32 = 40;
pub const ISOMETRIC_LARGE_TILE_BYTES: usize = 3200;

/// Marker byte in skip/emit streams: the next byte is a count of pixels to skip.
pub const RUN_SKIP: u8 = 255;

/// Expands a 5-bit channel to 8 bits by bit replication (31 -> 255).
#[inline]
pub(crate) fn expand5(c: u8) -> u8 {
    let c = c & 0x1f;
    (c << 3) | (c >> 2)
}

/// Converts a packed RGB555 value (bits 10-14 red, 5-9 green, 0-4 blue) to RGBA with alpha 0.
pub fn rgb555_to_rgba(value: u16) -> Rgba<u8> {
    let r = ((value >> 10) & 0x1f) as u8;
    let g = ((value >> 5) & 0x1f) as u8;
    let b = (value & 0x1f) as u8;
    Rgba([expand5(r), expand5(g), expand5(b), 0])
}

/// RGBA buffer fresh out of a decoder, before opacity is resolved.
#[derive(Debug, Clone)]
pub struct DecodedPixels {
    rgba: RgbaImage,
    coverage: Vec<bool>,
}

impl DecodedPixels {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            rgba: RgbaImage::new(width, height),
            coverage: vec![false; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.rgba.width()
    }

    pub fn height(&self) -> u32 {
        self.rgba.height()
    }

    /// Writes one RGB555 pixel. Out-of-bounds writes are dropped and reported as `false`.
    pub fn put_555(&mut self, x: u32, y: u32, value: u16) -> bool {
        if x >= self.width() || y >= self.height() {
            return false;
        }
        let w = self.width();
        self.rgba.put_pixel(x, y, rgb555_to_rgba(value));
        self.coverage[(y * w + x) as usize] = true;
        true
    }

    pub fn is_covered(&self, x: u32, y: u32) -> bool {
        x < self.width()
            && y < self.height()
            && self.coverage[(y * self.width() + x) as usize]
    }

    /// Number of pixels some run actually emitted.
    pub fn covered(&self) -> usize {
        self.coverage.iter().filter(|c| **c).count()
    }

    pub fn rgba(&self) -> &RgbaImage {
        &self.rgba
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut RgbaImage, &[bool]) {
        (&mut self.rgba, &self.coverage)
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.rgba
    }
}

/// Slices the payload (pixels then alpha) of `record` out of `source`.
///
/// A shortfall of exactly `tolerance` bytes is padded with zeros; anything else is a short read.
pub fn fetch_payload<'a>(
    record: &ImageRecord,
    source: &'a [u8],
    tolerance: usize,
) -> Result<Cow<'a, [u8]>> {
    let start = record.payload_start();
    let need = record.payload_len();
    let available = source.len().saturating_sub(start).min(need);
    if available == need {
        return Ok(Cow::Borrowed(&source[start..start + need]));
    }
    let shortfall = need - available;
    if tolerance > 0 && shortfall == tolerance {
        debug!(start, need, shortfall, "padding truncated payload");
        let mut padded = Vec::with_capacity(need);
        if available > 0 {
            padded.extend_from_slice(&source[start..start + available]);
        }
        padded.resize(need, 0);
        return Ok(Cow::Owned(padded));
    }
    Err(SgError::ShortRead {
        offset: start,
        expected: need,
        actual: available,
    })
}

/// Fetches and decodes the image described by `record` from `source`.
pub fn decode_image(
    record: &ImageRecord,
    source: &[u8],
    cfg: &DecoderConfig,
) -> Result<DecodedGraphic> {
    check_dimensions(record)?;
    let payload = fetch_payload(record, source, cfg.short_read_tolerance)?;
    decode_payload(record, &payload, cfg)
}

/// Decodes an already fetched payload (pixel bytes followed by `alpha_length` alpha bytes).
pub fn decode_payload(
    record: &ImageRecord,
    payload: &[u8],
    cfg: &DecoderConfig,
) -> Result<DecodedGraphic> {
    let split = (record.length as usize).min(payload.len());
    let (pixel_bytes, alpha_bytes) = payload.split_at(split);
    let pixels = decode_pixels(record, pixel_bytes, cfg.short_read_tolerance)?;
    Ok(DecodedGraphic::new(alpha::finish(pixels, alpha_bytes)))
}

/// Dispatches on the record's type tag and decodes the pixel bytes only.
pub fn decode_pixels(
    record: &ImageRecord,
    pixel_bytes: &[u8],
    tolerance: usize,
) -> Result<DecodedPixels> {
    check_dimensions(record)?;
    let kind = record.kind().ok_or(SgError::UnsupportedImageType {
        tag: record.image_type,
    })?;
    let (w, h) = (record.width as u32, record.height as u32);
    match kind {
        ImageKind::Plain => decode_plain(w, h, pixel_bytes, tolerance),
        ImageKind::Isometric => decode_isometric(record, pixel_bytes),
        ImageKind::Sprite => decode_sprite(w, h, pixel_bytes),
    }
}

fn check_dimensions(record: &ImageRecord) -> Result<()> {
    if !record.has_valid_dimensions() {
        return Err(SgError::InvalidDimensions {
            width: record.width as i32,
            height: record.height as i32,
        });
    }
    Ok(())
}

pub fn decode_plain(width: u32, height: u32, data: &[u8], tolerance: usize) -> Result<DecodedPixels> {
    let expected = width as usize * height as usize * 2;
    let data: Cow<'_, [u8]> = if data.len() == expected {
        Cow::Borrowed(data)
    } else if tolerance > 0 && data.len() + tolerance == expected {
        let mut padded = data.to_vec();
        padded.resize(expected, 0);
        Cow::Owned(padded)
    } else {
        return Err(SgError::ShortRead {
            offset: 0,
            expected,
            actual: data.len(),
        });
    };

    let mut px = DecodedPixels::new(width, height);
    for (i, pair) in data.chunks_exact(2).enumerate() {
        let x = (i % width as usize) as u32;
        let y = (i / width as usize) as u32;
        px.put_555(x, y, u16::from_le_bytes([pair[0], pair[1]]));
    }
    Ok(px)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TileGeometry {
    size: u32,
    tile_width: u32,
    tile_height: u32,
    tile_bytes: usize,
}

impl TileGeometry {
    /// Picks small or large tiles for a footprint `footprint_height` pixels tall.
    ///
    /// Without an override the size is derived from the height; 120 px resolves to 4 small
    /// tiles rather than 3 large ones.
    fn resolve(footprint_height: u32, size_override: Option<u8>) -> Result<Self> {
        let size = match size_override {
            Some(n) => n as u32,
            None if footprint_height % ISOMETRIC_TILE_HEIGHT == 0 => {
                footprint_height / ISOMETRIC_TILE_HEIGHT
            }
            None if footprint_height % ISOMETRIC_LARGE_TILE_HEIGHT == 0 => {
                footprint_height / ISOMETRIC_LARGE_TILE_HEIGHT
            }
            None => 0,
        };
        if size > 0 && ISOMETRIC_TILE_HEIGHT * size == footprint_height {
            Ok(Self {
                size,
                tile_width: ISOMETRIC_TILE_WIDTH,
                tile_height: ISOMETRIC_TILE_HEIGHT,
                tile_bytes: ISOMETRIC_TILE_BYTES,
            })
        } else if size > 0 && ISOMETRIC_LARGE_TILE_HEIGHT * size == footprint_height {
            Ok(Self {
                size,
                tile_width: ISOMETRIC_LARGE_TILE_WIDTH,
                tile_height: ISOMETRIC_LARGE_TILE_HEIGHT,
                tile_bytes: ISOMETRIC_LARGE_TILE_BYTES,
            })
        } else {
            Err(SgError::UnknownTileSize {
                height: footprint_height,
            })
        }
    }
}

pub fn decode_isometric(record: &ImageRecord, data: &[u8]) -> Result<DecodedPixels> {
    let width = record.width as u32;
    let height = record.height as u32;
    let footprint_height = (width + 2) / 2;
    if footprint_height > height {
        return Err(SgError::InvalidDimensions {
            width: record.width as i32,
            height: record.height as i32,
        });
    }
    let geometry = TileGeometry::resolve(footprint_height, record.flags.tile_size_override())?;

    let base_len = record.uncompressed_length as usize;
    let expected = (width as usize + 2) * footprint_height as usize;
    if base_len != expected {
        return Err(SgError::FootprintMismatch {
            expected,
            actual: base_len,
        });
    }
    if data.len() < base_len {
        return Err(SgError::ShortRead {
            offset: 0,
            expected: base_len,
            actual: data.len(),
        });
    }

    let mut px = DecodedPixels::new(width, height);
    write_footprint(&mut px, &data[..base_len], height - footprint_height, geometry);

    let overlay = &data[base_len..];
    let walk = walk_runs(overlay, width, height, 2, |x, y, unit| {
        px.put_555(x, y, u16::from_le_bytes([unit[0], unit[1]]));
    });
    if let Some(offset) = walk.truncated_at {
        return Err(SgError::MalformedRunList {
            row: walk.last_row,
            offset: base_len + offset,
        });
    }
    if walk.clamped > 0 {
        debug!(clamped = walk.clamped, "isometric overlay ran past the image");
    }
    Ok(px)
}

/// Lays `size * size` tiles out on a diamond grid whose bottom row ends at the image bottom.
fn write_footprint(px: &mut DecodedPixels, data: &[u8], y_start: u32, g: TileGeometry) {
    let mut tile = 0usize;
    let mut y_offset = y_start;
    for row in 0..(2 * g.size - 1) {
        let (count, lead) = if row < g.size {
            (row + 1, g.size - row - 1)
        } else {
            (2 * g.size - row - 1, row + 1 - g.size)
        };
        let mut x_offset = lead * g.tile_height;
        for _ in 0..count {
            let start = tile * g.tile_bytes;
            write_tile(px, &data[start..start + g.tile_bytes], x_offset, y_offset, g);
            x_offset += g.tile_width + 2;
            tile += 1;
        }
        y_offset += g.tile_height / 2;
    }
}

/// One diamond: rows widen by 4 pixels down to the middle, then narrow again.
fn write_tile(px: &mut DecodedPixels, bytes: &[u8], ox: u32, oy: u32, g: TileGeometry) {
    let half = g.tile_height / 2;
    let mut i = 0usize;
    for y in 0..g.tile_height {
        let start = if y < half {
            g.tile_height - 2 * (y + 1)
        } else {
            2 * y - g.tile_height
        };
        let end = g.tile_width - start;
        for x in start..end {
            px.put_555(ox + x, oy + y, u16::from_le_bytes([bytes[i], bytes[i + 1]]));
            i += 2;
        }
    }
}

/// Every row starts with its run count, so a stream shorter than `height` bytes is rejected
/// before the image is allocated.
pub fn decode_sprite(width: u32, height: u32, data: &[u8]) -> Result<DecodedPixels> {
    if data.len() < height as usize {
        return Err(SgError::ShortRead {
            offset: 0,
            expected: height as usize,
            actual: data.len(),
        });
    }
    let mut px = DecodedPixels::new(width, height);
    let mut c = Cursor::new(data);
    for y in 0..height {
        if c.is_empty() {
            break;
        }
        let runs = c.read_u8()?;
        let mut x = 0u32;
        for _ in 0..runs {
            let run_start = c.position();
            let skip = c.read_u8()? as u32;
            let len = c.read_u8()? as u32;
            x += skip;
            if x + len > width {
                return Err(SgError::MalformedRunList {
                    row: y,
                    offset: run_start,
                });
            }
            let pixels = c.read_bytes(len as usize * 2)?;
            for (k, pair) in pixels.chunks_exact(2).enumerate() {
                px.put_555(x + k as u32, y, u16::from_le_bytes([pair[0], pair[1]]));
            }
            x += len;
        }
    }
    if !c.is_empty() {
        debug!(trailing = c.remaining(), "sprite run list has trailing bytes");
    }
    Ok(px)
}

/// Outcome of walking a skip/emit stream.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct RunWalk {
    /// Units that landed below the last row.
    pub clamped: usize,
    /// Stream offset where a run was cut short.
    pub truncated_at: Option<usize>,
    pub last_row: u32,
}

/// Walks a skip/emit stream: `255 n` skips `n` pixels, any other byte `c` emits `c` units of
/// `unit` bytes. The column wraps at `width`.
pub(crate) fn walk_runs(
    stream: &[u8],
    width: u32,
    height: u32,
    unit: usize,
    mut emit: impl FnMut(u32, u32, &[u8]),
) -> RunWalk {
    let mut walk = RunWalk::default();
    let (mut x, mut y) = (0u32, 0u32);
    let mut i = 0usize;
    while i < stream.len() {
        let c = stream[i];
        i += 1;
        if c == RUN_SKIP {
            let Some(&n) = stream.get(i) else {
                walk.truncated_at = Some(i - 1);
                break;
            };
            i += 1;
            x += n as u32;
            while x >= width {
                x -= width;
                y += 1;
            }
        } else {
            for _ in 0..c {
                let Some(value) = stream.get(i..i + unit) else {
                    walk.truncated_at = Some(i);
                    walk.last_row = y;
                    return walk;
                };
                i += unit;
                if y < height {
                    emit(x, y, value);
                } else {
                    walk.clamped += 1;
                }
                x += 1;
                if x >= width {
                    x = 0;
                    y += 1;
                }
            }
        }
        walk.last_row = y;
    }
    walk
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_expansion_hits_both_ends() {
        assert_eq!(expand5(0), 0);
        assert_eq!(expand5(31), 255);
        assert_eq!(expand5(16), 132);
    }

    #[test]
    fn put_555_tracks_coverage() {
        let mut px = DecodedPixels::new(3, 2);
        assert!(px.put_555(2, 1, 0x7fff));
        assert!(!px.put_555(3, 0, 0x7fff));
        assert!(px.is_covered(2, 1));
        assert!(!px.is_covered(1, 1));
        assert_eq!(px.covered(), 1);
        assert_eq!(px.rgba().get_pixel(2, 1)[0], 255);
    }

    #[test]
    fn geometry_prefers_small_tiles_on_ambiguous_height() {
        let g = TileGeometry::resolve(120, None).unwrap();
        assert_eq!(g.size, 4);
        assert_eq!(g.tile_width, ISOMETRIC_TILE_WIDTH);
        let g = TileGeometry::resolve(120, Some(3)).unwrap();
        assert_eq!(g.tile_width, ISOMETRIC_LARGE_TILE_WIDTH);
    }

    #[test]
    fn walk_wraps_rows_and_clamps() {
        // skip 3 on a 2-wide image -> (1,1), emit 2 alpha units: (1,1) then clamped.
        let stream = [RUN_SKIP, 3, 2, 7, 8];
        let mut hits = Vec::new();
        let walk = walk_runs(&stream, 2, 2, 1, |x, y, v| hits.push((x, y, v[0])));
        assert_eq!(hits, vec![(1, 1, 7)]);
        assert_eq!(walk.clamped, 1);
        assert!(walk.truncated_at.is_none());
    }

    #[test]
    fn walk_reports_truncation() {
        let stream = [3, 1, 0, 2];
        let walk = walk_runs(&stream, 4, 4, 2, |_, _, _| {});
        assert_eq!(walk.truncated_at, Some(3));
    }
}
