//! Bitmap and image record tables.

use crate::cursor::Cursor;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// On-disk size of one bitmap record.
pub const BITMAP_RECORD_SIZE: usize = 200;
/// On-disk size of one image record.
pub const IMAGE_RECORD_SIZE: usize = 72;

const FILENAME_LEN: usize = 65;
const COMMENT_LEN: usize = 51;

// Byte offsets inside an image record. Gaps are reserved padding.
const IMG_OFFSET: usize = 0;
const IMG_LENGTH: usize = 4;
const IMG_UNCOMPRESSED_LENGTH: usize = 8;
const IMG_INVERT_OFFSET: usize = 16;
const IMG_WIDTH: usize = 20;
const IMG_HEIGHT: usize = 22;
const IMG_TYPE: usize = 50;
const IMG_FLAGS: usize = 52;
const IMG_BITMAP_ID: usize = 56;
const IMG_ALPHA_OFFSET: usize = 64;
const IMG_ALPHA_LENGTH: usize = 68;

/// Group of images cut from one source sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitmapRecord {
    pub filename: String,
    pub comment: String,
    pub width: u32,
    pub height: u32,
    pub num_images: u32,
    pub start_index: u32,
    pub end_index: u32,
}

impl BitmapRecord {
    pub fn parse(c: &mut Cursor<'_>) -> Result<Self> {
        let start = c.position();
        let filename = c.read_fixed_str(FILENAME_LEN)?;
        let comment = c.read_fixed_str(COMMENT_LEN)?;
        let width = c.read_u32()?;
        let height = c.read_u32()?;
        let num_images = c.read_u32()?;
        let start_index = c.read_u32()?;
        let end_index = c.read_u32()?;
        let consumed = c.position() - start;
        c.skip(BITMAP_RECORD_SIZE - consumed)?;
        Ok(Self {
            filename,
            comment,
            width,
            height,
            num_images,
            start_index,
            end_index,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BITMAP_RECORD_SIZE);
        push_fixed_str(&mut out, &self.filename, FILENAME_LEN);
        push_fixed_str(&mut out, &self.comment, COMMENT_LEN);
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.num_images.to_le_bytes());
        out.extend_from_slice(&self.start_index.to_le_bytes());
        out.extend_from_slice(&self.end_index.to_le_bytes());
        out.resize(BITMAP_RECORD_SIZE, 0);
        out
    }

    /// Last path component of the filename without its extension; used as the owner part of
    /// resource names. Directory parts and drive prefixes are dropped.
    pub fn stem(&self) -> &str {
        let name = self
            .filename
            .rsplit(['/', '\\', ':'])
            .next()
            .unwrap_or_default();
        if name == "." || name == ".." {
            return "";
        }
        match name.rfind('.') {
            Some(dot) if dot > 0 => &name[..dot],
            _ => name,
        }
    }
}

/// Copies at most `width - 1` bytes so the field always keeps a terminating NUL.
fn push_fixed_str(out: &mut Vec<u8>, s: &str, width: usize) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(width - 1);
    out.extend_from_slice(&bytes[..n]);
    out.resize(out.len() + (width - n), 0);
}

/// The four flag bytes of an image record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFlags(pub [u8; 4]);

impl ImageFlags {
    /// Payload lives in the companion file.
    pub fn is_external(&self) -> bool {
        self.0[0] & 1 != 0
    }

    /// Payload starts one byte before the declared offset. Set together with [`Self::is_external`].
    pub fn shifts_offset(&self) -> bool {
        self.0[0] & 1 != 0
    }

    /// Explicit isometric tile count per side.
    pub fn tile_size_override(&self) -> Option<u8> {
        match self.0[3] {
            0 => None,
            n => Some(n),
        }
    }
}

/// Pixel encoding selected by an image record's type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// Flat RGB555, `width * height * 2` bytes.
    Plain,
    /// Diamond tile footprint plus a skip/emit overlay.
    Isometric,
    /// Per-row run lists.
    Sprite,
}

impl ImageKind {
    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            0 | 1 | 10 | 12 | 13 => Some(Self::Plain),
            30 => Some(Self::Isometric),
            256 | 257 | 276 => Some(Self::Sprite),
            _ => None,
        }
    }
}

/// Location, size and encoding of one image's payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub offset: u32,
    pub length: u32,
    pub uncompressed_length: u32,
    /// Non-zero: this image mirrors the record `invert_offset` entries away.
    pub invert_offset: i32,
    pub width: i16,
    pub height: i16,
    pub image_type: u16,
    pub flags: ImageFlags,
    pub bitmap_id: u8,
    pub alpha_offset: u32,
    pub alpha_length: u32,
}

impl ImageRecord {
    pub fn parse(c: &mut Cursor<'_>) -> Result<Self> {
        let raw = c.read_bytes(IMAGE_RECORD_SIZE)?;
        let u32_at = |o: usize| u32::from_le_bytes([raw[o], raw[o + 1], raw[o + 2], raw[o + 3]]);
        let i16_at = |o: usize| i16::from_le_bytes([raw[o], raw[o + 1]]);
        Ok(Self {
            offset: u32_at(IMG_OFFSET),
            length: u32_at(IMG_LENGTH),
            uncompressed_length: u32_at(IMG_UNCOMPRESSED_LENGTH),
            invert_offset: u32_at(IMG_INVERT_OFFSET) as i32,
            width: i16_at(IMG_WIDTH),
            height: i16_at(IMG_HEIGHT),
            image_type: u16::from_le_bytes([raw[IMG_TYPE], raw[IMG_TYPE + 1]]),
            flags: ImageFlags([
                raw[IMG_FLAGS],
                raw[IMG_FLAGS + 1],
                raw[IMG_FLAGS + 2],
                raw[IMG_FLAGS + 3],
            ]),
            bitmap_id: raw[IMG_BITMAP_ID],
            alpha_offset: u32_at(IMG_ALPHA_OFFSET),
            alpha_length: u32_at(IMG_ALPHA_LENGTH),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; IMAGE_RECORD_SIZE];
        let mut put = |o: usize, bytes: &[u8]| out[o..o + bytes.len()].copy_from_slice(bytes);
        put(IMG_OFFSET, &self.offset.to_le_bytes());
        put(IMG_LENGTH, &self.length.to_le_bytes());
        put(IMG_UNCOMPRESSED_LENGTH, &self.uncompressed_length.to_le_bytes());
        put(IMG_INVERT_OFFSET, &self.invert_offset.to_le_bytes());
        put(IMG_WIDTH, &self.width.to_le_bytes());
        put(IMG_HEIGHT, &self.height.to_le_bytes());
        put(IMG_TYPE, &self.image_type.to_le_bytes());
        put(IMG_FLAGS, &self.flags.0);
        put(IMG_BITMAP_ID, &[self.bitmap_id]);
        put(IMG_ALPHA_OFFSET, &self.alpha_offset.to_le_bytes());
        put(IMG_ALPHA_LENGTH, &self.alpha_length.to_le_bytes());
        out
    }

    pub fn kind(&self) -> Option<ImageKind> {
        ImageKind::from_tag(self.image_type)
    }

    pub fn has_valid_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Bytes fetched for this image: pixel payload followed by the alpha stream.
    pub fn payload_len(&self) -> usize {
        self.length as usize + self.alpha_length as usize
    }

    /// Absolute start of the payload after the shifted-offset quirk.
    pub fn payload_start(&self) -> usize {
        let offset = self.offset as usize;
        if self.flags.shifts_offset() {
            offset.saturating_sub(1)
        } else {
            offset
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_record_fields_land_on_fixed_offsets() {
        let rec = ImageRecord {
            offset: 0x0102_0304,
            width: 58,
            height: 30,
            image_type: 30,
            flags: ImageFlags([1, 0, 0, 2]),
            bitmap_id: 7,
            alpha_length: 9,
            ..Default::default()
        };
        let bytes = rec.to_bytes();
        assert_eq!(bytes.len(), IMAGE_RECORD_SIZE);
        assert_eq!(&bytes[0..4], &[4, 3, 2, 1]);
        assert_eq!(&bytes[20..22], &58i16.to_le_bytes());
        assert_eq!(&bytes[50..52], &30u16.to_le_bytes());
        assert_eq!(bytes[52], 1);
        assert_eq!(bytes[55], 2);
        assert_eq!(bytes[56], 7);
        assert_eq!(&bytes[68..72], &9u32.to_le_bytes());
        let back = ImageRecord::parse(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn long_filename_keeps_terminator() {
        let rec = BitmapRecord {
            filename: "x".repeat(100),
            ..Default::default()
        };
        let bytes = rec.to_bytes();
        assert_eq!(bytes.len(), BITMAP_RECORD_SIZE);
        assert_eq!(bytes[FILENAME_LEN - 1], 0);
        let back = BitmapRecord::parse(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(back.filename.len(), FILENAME_LEN - 1);
    }

    #[test]
    fn shifted_offset_flag() {
        let rec = ImageRecord {
            offset: 10,
            flags: ImageFlags([1, 0, 0, 0]),
            ..Default::default()
        };
        assert_eq!(rec.payload_start(), 9);
        assert!(rec.flags.is_external());
        assert_eq!(rec.flags.tile_size_override(), None);
    }
}
