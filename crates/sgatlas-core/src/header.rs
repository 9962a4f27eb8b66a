//! Fixed-width container header.

use crate::cursor::Cursor;
use crate::error::{Result, SgError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of the on-disk header in bytes. Everything past the declared fields is reserved.
pub const HEADER_SIZE: usize = 680;

/// Versions the decoder is known to handle.
pub const SUPPORTED_VERSIONS: [u32; 2] = [0xd5, 0xd6];

/// Oldest known version; its bitmap-slot area holds 100 records instead of 200.
pub const VERSION_D3: u32 = 0xd3;

/// Container header as declared on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub filesize: u32,
    pub version: u32,
    pub max_image_records: i32,
    /// Declared image records, excluding the reserved record 0.
    pub num_image_records: i32,
    pub num_bitmap_records: i32,
    /// Total size of pixel data across the inline and external files.
    pub total_data_size: u32,
    /// Pixel data stored in the primary file.
    pub inline_data_size: u32,
    /// Pixel data stored in the companion file.
    pub external_data_size: u32,
    /// Reserved words at offsets 8 and 24, kept so encoding reproduces the input.
    pub reserved: [u32; 2],
}

/// Non-fatal header problems; decoding continues with the declared counts.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum HeaderWarning {
    #[error("unsupported version {version:#x}")]
    UnsupportedVersion { version: u32 },
    #[error("data sizes disagree: {inline} + {external} != {total}")]
    SizeMismatch { inline: u32, external: u32, total: u32 },
    #[error("negative {field}: {value}, treated as 0")]
    NegativeCount { field: &'static str, value: i32 },
}

impl FileHeader {
    /// Parses the header from the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(SgError::TruncatedHeader {
                need: HEADER_SIZE,
                have: data.len(),
            });
        }
        let mut c = Cursor::new(data);
        let filesize = c.read_u32()?;
        let version = c.read_u32()?;
        let reserved0 = c.read_u32()?;
        let max_image_records = c.read_i32()?;
        let num_image_records = c.read_i32()?;
        let num_bitmap_records = c.read_i32()?;
        let reserved1 = c.read_u32()?;
        let total_data_size = c.read_u32()?;
        let inline_data_size = c.read_u32()?;
        let external_data_size = c.read_u32()?;
        Ok(Self {
            filesize,
            version,
            max_image_records,
            num_image_records,
            num_bitmap_records,
            total_data_size,
            inline_data_size,
            external_data_size,
            reserved: [reserved0, reserved1],
        })
    }

    /// Encodes the header into exactly [`HEADER_SIZE`] bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE);
        out.extend_from_slice(&self.filesize.to_le_bytes());
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.reserved[0].to_le_bytes());
        out.extend_from_slice(&self.max_image_records.to_le_bytes());
        out.extend_from_slice(&self.num_image_records.to_le_bytes());
        out.extend_from_slice(&self.num_bitmap_records.to_le_bytes());
        out.extend_from_slice(&self.reserved[1].to_le_bytes());
        out.extend_from_slice(&self.total_data_size.to_le_bytes());
        out.extend_from_slice(&self.inline_data_size.to_le_bytes());
        out.extend_from_slice(&self.external_data_size.to_le_bytes());
        out.resize(HEADER_SIZE, 0);
        out
    }

    /// Checks version and size consistency.
    pub fn check(&self) -> Vec<HeaderWarning> {
        let mut warnings = Vec::new();
        if !SUPPORTED_VERSIONS.contains(&self.version) {
            warnings.push(HeaderWarning::UnsupportedVersion {
                version: self.version,
            });
        }
        let sum = self
            .inline_data_size
            .checked_add(self.external_data_size);
        if sum != Some(self.total_data_size) {
            warnings.push(HeaderWarning::SizeMismatch {
                inline: self.inline_data_size,
                external: self.external_data_size,
                total: self.total_data_size,
            });
        }
        if self.num_bitmap_records < 0 {
            warnings.push(HeaderWarning::NegativeCount {
                field: "bitmap record count",
                value: self.num_bitmap_records,
            });
        }
        if self.num_image_records < 0 {
            warnings.push(HeaderWarning::NegativeCount {
                field: "image record count",
                value: self.num_image_records,
            });
        }
        warnings
    }

    pub fn bitmap_count(&self) -> usize {
        self.num_bitmap_records.max(0) as usize
    }

    /// Image records present on disk: the declared count plus the reserved record 0.
    pub fn image_table_len(&self) -> usize {
        self.num_image_records.max(0) as usize + 1
    }

    /// Number of bitmap slots reserved ahead of the image table in the legacy layout.
    pub fn bitmap_slots(&self) -> usize {
        if self.version == VERSION_D3 { 100 } else { 200 }
    }
}
