//! Writes containers: used for fixtures, the bench and the `pack` round trip.

use crate::config::TableLayout;
use crate::container::payload_area_offset;
use crate::header::FileHeader;
use crate::records::{BITMAP_RECORD_SIZE, BitmapRecord, ImageFlags, ImageRecord};

struct PendingImage {
    record: ImageRecord,
    pixels: Vec<u8>,
    alpha: Vec<u8>,
    external: bool,
}

/// Encoded container bytes.
#[derive(Debug, Clone, Default)]
pub struct BuiltContainer {
    /// The primary file: header, tables, inline payloads.
    pub inline: Vec<u8>,
    /// Payloads flagged external; written to the companion file.
    pub external: Vec<u8>,
}

/// Assembles a container from records and payloads.
///
/// Record 0 is written zeroed. Offsets, lengths and bitmap index ranges are filled in by
/// [`ContainerBuilder::build`]; the remaining record fields are written as given.
pub struct ContainerBuilder {
    version: u32,
    layout: TableLayout,
    bitmaps: Vec<BitmapRecord>,
    images: Vec<PendingImage>,
}

impl ContainerBuilder {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            layout: TableLayout::Packed,
            bitmaps: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn table_layout(mut self, layout: TableLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Adds a bitmap group. Ids are assigned in call order starting at 0.
    pub fn bitmap(mut self, filename: impl Into<String>, comment: impl Into<String>) -> Self {
        self.bitmaps.push(BitmapRecord {
            filename: filename.into(),
            comment: comment.into(),
            ..Default::default()
        });
        self
    }

    /// Adds an image whose payload is stored in the primary file.
    pub fn image(mut self, record: ImageRecord, pixels: Vec<u8>, alpha: Vec<u8>) -> Self {
        self.images.push(PendingImage {
            record,
            pixels,
            alpha,
            external: false,
        });
        self
    }

    /// Adds an image whose payload is stored in the companion file.
    pub fn external_image(mut self, record: ImageRecord, pixels: Vec<u8>, alpha: Vec<u8>) -> Self {
        self.images.push(PendingImage {
            record,
            pixels,
            alpha,
            external: true,
        });
        self
    }

    /// Number of image records added so far, excluding record 0.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn build(self) -> BuiltContainer {
        let mut header = FileHeader {
            version: self.version,
            max_image_records: self.images.len() as i32,
            num_image_records: self.images.len() as i32,
            num_bitmap_records: self.bitmaps.len() as i32,
            ..Default::default()
        };
        let data_start = payload_area_offset(&header, self.layout, self.images.len() + 1);

        let mut inline_data = Vec::new();
        let mut external = Vec::new();
        let mut records = Vec::with_capacity(self.images.len() + 1);
        records.push(ImageRecord::default());
        for img in &self.images {
            let mut rec = img.record;
            rec.length = img.pixels.len() as u32;
            rec.alpha_length = img.alpha.len() as u32;
            let (buf, base) = if img.external {
                (&mut external, 0)
            } else {
                (&mut inline_data, data_start)
            };
            let start = base + buf.len();
            if img.external {
                rec.flags = ImageFlags([rec.flags.0[0] | 1, rec.flags.0[1], rec.flags.0[2], rec.flags.0[3]]);
                // external offsets are stored one past the real start
                rec.offset = start as u32 + 1;
            } else {
                rec.flags = ImageFlags([rec.flags.0[0] & !1, rec.flags.0[1], rec.flags.0[2], rec.flags.0[3]]);
                rec.offset = start as u32;
            }
            rec.alpha_offset = if img.alpha.is_empty() {
                0
            } else {
                (start + img.pixels.len()) as u32
            };
            buf.extend_from_slice(&img.pixels);
            buf.extend_from_slice(&img.alpha);
            records.push(rec);
        }

        let mut bitmaps = self.bitmaps;
        for (id, bitmap) in bitmaps.iter_mut().enumerate() {
            let owned: Vec<u32> = records
                .iter()
                .enumerate()
                .skip(1)
                .filter(|(_, r)| r.bitmap_id as usize == id)
                .map(|(i, _)| i as u32)
                .collect();
            bitmap.num_images = owned.len() as u32;
            bitmap.start_index = owned.first().copied().unwrap_or(0);
            bitmap.end_index = owned.last().copied().unwrap_or(0);
        }

        header.inline_data_size = inline_data.len() as u32;
        header.external_data_size = external.len() as u32;
        header.total_data_size = header.inline_data_size + header.external_data_size;
        header.filesize = (data_start + inline_data.len()) as u32;

        let mut inline = header.to_bytes();
        for bitmap in &bitmaps {
            inline.extend_from_slice(&bitmap.to_bytes());
        }
        if self.layout == TableLayout::Reserved {
            let slots = header.bitmap_slots().max(bitmaps.len());
            inline.resize(inline.len() + (slots - bitmaps.len()) * BITMAP_RECORD_SIZE, 0);
        }
        for rec in &records {
            inline.extend_from_slice(&rec.to_bytes());
        }
        debug_assert_eq!(inline.len(), data_start);
        inline.extend_from_slice(&inline_data);

        BuiltContainer { inline, external }
    }
}
