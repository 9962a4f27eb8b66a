//! A parsed container: header, bitmap groups and the image table.

use crate::config::{DecoderConfig, TableLayout};
use crate::cursor::Cursor;
use crate::decode::{decode_image, fetch_payload};
use crate::error::{Result, SgError};
use crate::header::{FileHeader, HEADER_SIZE, HeaderWarning};
use crate::model::DecodedGraphic;
use crate::pipeline::InputGraphic;
use crate::records::{BITMAP_RECORD_SIZE, BitmapRecord, IMAGE_RECORD_SIZE, ImageRecord};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// A bitmap group and the image-table indices it owns.
#[derive(Debug, Clone, Serialize)]
pub struct Bitmap {
    pub id: usize,
    pub record: BitmapRecord,
    pub images: Vec<usize>,
}

/// One image-table entry. `bitmap` is resolved from the record's bitmap id; `None` for the
/// reserved record 0 and for orphans.
#[derive(Debug, Clone, Serialize)]
pub struct Image {
    pub id: usize,
    pub record: ImageRecord,
    pub bitmap: Option<usize>,
}

/// Non-fatal findings while reading the tables.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ContainerWarning {
    #[error("header: {0}")]
    Header(HeaderWarning),
    #[error("image {image} references missing bitmap {bitmap_id}")]
    OrphanImage { image: usize, bitmap_id: u8 },
    #[error("{declared} bitmap records share one image list; keeping the first")]
    CollapsedBitmaps { declared: usize },
}

/// Byte offset of the image table. Record 0 sits here.
pub fn image_table_offset(header: &FileHeader, layout: TableLayout) -> usize {
    let slots = match layout {
        TableLayout::Packed => header.bitmap_count(),
        TableLayout::Reserved => header.bitmap_slots().max(header.bitmap_count()),
    };
    HEADER_SIZE + slots * BITMAP_RECORD_SIZE
}

/// Byte offset of the first payload byte following `images` table entries.
pub fn payload_area_offset(header: &FileHeader, layout: TableLayout, images: usize) -> usize {
    image_table_offset(header, layout) + images * IMAGE_RECORD_SIZE
}

/// Byte sources an image payload may live in.
#[derive(Debug, Clone, Copy)]
pub struct PixelSources<'a> {
    pub inline: &'a [u8],
    pub external: Option<&'a [u8]>,
}

impl<'a> PixelSources<'a> {
    pub fn inline(inline: &'a [u8]) -> Self {
        Self {
            inline,
            external: None,
        }
    }
}

/// Graphics decoded from one container plus the images that failed.
#[derive(Debug, Default)]
pub struct DecodeReport {
    pub graphics: Vec<InputGraphic>,
    pub failures: Vec<(usize, SgError)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SgFile {
    pub header: FileHeader,
    pub bitmaps: Vec<Bitmap>,
    pub images: Vec<Image>,
    pub warnings: Vec<ContainerWarning>,
}

impl SgFile {
    /// Parses header and record tables from the primary file's bytes.
    #[instrument(skip_all)]
    pub fn parse(data: &[u8], cfg: &DecoderConfig) -> Result<Self> {
        let header = FileHeader::parse(data)?;
        let mut warnings = Vec::new();
        for w in header.check() {
            warn!(warning = %w, "container header");
            warnings.push(ContainerWarning::Header(w));
        }

        let mut bitmaps = Vec::new();
        for id in 0..header.bitmap_count() {
            let mut c = Cursor::at(data, HEADER_SIZE + id * BITMAP_RECORD_SIZE);
            bitmaps.push(Bitmap {
                id,
                record: BitmapRecord::parse(&mut c)?,
                images: Vec::new(),
            });
        }

        let mut c = Cursor::at(data, image_table_offset(&header, cfg.table_layout));
        let mut images = Vec::new();
        for id in 0..header.image_table_len() {
            let record = ImageRecord::parse(&mut c)?;
            let mut bitmap = None;
            if id > 0 {
                let bid = record.bitmap_id as usize;
                if let Some(owner) = bitmaps.get_mut(bid) {
                    owner.images.push(id);
                    bitmap = Some(bid);
                } else {
                    warn!(image = id, bitmap_id = record.bitmap_id, "image has no owning bitmap");
                    warnings.push(ContainerWarning::OrphanImage {
                        image: id,
                        bitmap_id: record.bitmap_id,
                    });
                }
            }
            images.push(Image { id, record, bitmap });
        }

        let mut file = Self {
            header,
            bitmaps,
            images,
            warnings,
        };
        if cfg.collapse_shared_bitmaps {
            file.collapse_shared_bitmaps();
        }
        debug!(
            bitmaps = file.bitmaps.len(),
            images = file.images.len(),
            "parsed record tables"
        );
        Ok(file)
    }

    /// Legacy files repeat one bitmap header several times while a single image list is in
    /// use. Detected when the first bitmap already owns every non-reserved image.
    fn collapse_shared_bitmaps(&mut self) {
        let sprites = self.images.len().saturating_sub(1);
        if self.bitmaps.len() > 1 && sprites > 0 && self.bitmaps[0].images.len() == sprites {
            let declared = self.bitmaps.len();
            warn!(declared, "bitmap records share one image list; keeping the first");
            self.bitmaps.truncate(1);
            self.warnings
                .push(ContainerWarning::CollapsedBitmaps { declared });
        }
    }

    pub fn owner(&self, image: &Image) -> Option<&Bitmap> {
        image.bitmap.and_then(|b| self.bitmaps.get(b))
    }

    /// Images that may be rendered: everything but the reserved record 0.
    pub fn sprites(&self) -> impl Iterator<Item = &Image> {
        self.images.iter().skip(1)
    }

    pub fn needs_external(&self) -> bool {
        self.sprites().any(|img| {
            img.record.flags.is_external()
                && img.record.invert_offset == 0
                && img.record.has_valid_dimensions()
        })
    }

    /// `<owner>.<image id>`, where the owner is the bitmap's file stem or `fallback_owner`.
    pub fn resource_name(&self, image: &Image, fallback_owner: &str) -> String {
        let owner = self
            .owner(image)
            .map(|b| b.record.stem())
            .filter(|s| !s.is_empty())
            .unwrap_or(fallback_owner);
        format!("{}.{}", owner, image.id)
    }

    /// Decodes the image at `index`, following invert links.
    pub fn decode(
        &self,
        index: usize,
        sources: &PixelSources<'_>,
        cfg: &DecoderConfig,
    ) -> Result<DecodedGraphic> {
        if index == 0 {
            return Err(SgError::InvalidInput("image record 0 is reserved".into()));
        }
        let image = self
            .images
            .get(index)
            .ok_or_else(|| SgError::InvalidInput(format!("no image record {index}")))?;
        let invert = image.record.invert_offset;
        if invert == 0 {
            return decode_image(&image.record, self.source_for(index, sources)?, cfg);
        }

        let target = index as i64 + invert as i64;
        let source = usize::try_from(target)
            .ok()
            .filter(|&t| t > 0)
            .and_then(|t| self.images.get(t))
            .filter(|img| img.record.invert_offset == 0)
            .ok_or(SgError::InvalidInvertOffset {
                index,
                invert_offset: invert,
            })?;
        let graphic = decode_image(&source.record, self.source_for(source.id, sources)?, cfg)?;
        Ok(DecodedGraphic::new(image::imageops::flip_horizontal(
            &graphic.pixels,
        )))
    }

    /// Raw payload bytes for `index` as the decoder sees them (pixels then alpha).
    pub fn payload<'a>(
        &self,
        index: usize,
        sources: &PixelSources<'a>,
        cfg: &DecoderConfig,
    ) -> Result<std::borrow::Cow<'a, [u8]>> {
        let image = self
            .images
            .get(index)
            .ok_or_else(|| SgError::InvalidInput(format!("no image record {index}")))?;
        fetch_payload(
            &image.record,
            self.source_for(index, sources)?,
            cfg.short_read_tolerance,
        )
    }

    fn source_for<'a>(&self, index: usize, sources: &PixelSources<'a>) -> Result<&'a [u8]> {
        let external = self
            .images
            .get(index)
            .is_some_and(|img| img.record.flags.is_external());
        if !external {
            return Ok(sources.inline);
        }
        sources.external.ok_or_else(|| {
            SgError::InvalidInput(format!("image {index} needs the external pixel file"))
        })
    }

    /// Decodes every sprite. Failures are collected per image and never abort the file.
    #[instrument(skip_all)]
    pub fn decode_all(
        &self,
        sources: &PixelSources<'_>,
        cfg: &DecoderConfig,
        fallback_owner: &str,
    ) -> DecodeReport {
        let mut report = DecodeReport::default();
        for image in self.sprites() {
            match self.decode(image.id, sources, cfg) {
                Ok(graphic) => report.graphics.push(InputGraphic {
                    key: self.resource_name(image, fallback_owner),
                    graphic,
                }),
                Err(e) => {
                    if matches!(e, SgError::InvalidDimensions { .. }) {
                        debug!(image = image.id, error = %e, "skip image");
                    } else {
                        warn!(image = image.id, error = %e, "skip image");
                    }
                    report.failures.push((image.id, e));
                }
            }
        }
        report
    }
}
