//! Decoder for legacy SG2/SG3 sprite containers and a strip-atlas builder.
//!
//! - Containers: `FileHeader`, bitmap and image record tables, invert links, external pixel files
//! - Pixels: plain RGB555, isometric diamond tiles with a run overlay, sprite run lists, alpha streams
//! - Atlas: `pack_graphics` lays decoded graphics on one horizontal strip; `upload_atlas` hands it
//!   to a `GraphicsDevice` owned by a `DeviceWorker` thread
//! - Resources: `ResourceIndex` maps names to atlas regions or graphics through a `LoaderRegistry`
//!
//! Quick example:
//! ```ignore
//! use sgatlas_core::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let cfg = DecoderConfig::default();
//! let loaded = LoadedContainer::open("C3.sg2".as_ref(), &cfg)?;
//! let report = loaded.decode_all(&cfg);
//! let out = pack_graphics(report.graphics)?;
//! println!("{}", out.stats().summary());
//! # Ok(()) }
//! ```

pub mod alpha;
pub mod builder;
pub mod compositing;
pub mod config;
pub mod container;
pub mod cursor;
pub mod decode;
pub mod device;
pub mod error;
pub mod export;
pub mod header;
pub mod loader;
pub mod model;
pub mod packer;
pub mod pipeline;
pub mod records;
pub mod resource;

pub use config::*;
pub use error::*;
pub use export::*;
pub use model::*;
pub use packer::*;
pub use pipeline::*;

/// Convenience prelude for common types and functions.
/// Importing `sgatlas_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::alpha::{MergeReport, merge_alpha};
    pub use crate::builder::{BuiltContainer, ContainerBuilder};
    pub use crate::config::{DecoderConfig, DecoderConfigBuilder, TableLayout};
    pub use crate::container::{ContainerWarning, DecodeReport, PixelSources, SgFile};
    pub use crate::decode::{decode_image, rgb555_to_rgba};
    pub use crate::device::{DeviceWorker, GraphicsDevice, MemoryDevice};
    pub use crate::error::{Result, SgError};
    pub use crate::header::{FileHeader, HeaderWarning};
    pub use crate::loader::{
        ContainerLoader, GraphicLoader, ImageFileLoader, LoadedContainer, LoaderRegistry,
        load_files, load_files_with,
    };
    pub use crate::model::{
        AtlasLayout, AtlasRegion, DecodedGraphic, Frame, PackStats, Rect, SurfaceHandle,
    };
    pub use crate::records::{BitmapRecord, ImageFlags, ImageKind, ImageRecord};
    pub use crate::resource::{
        DEFAULT_GRAPHIC_NAME, Resource, ResourceConfig, ResourceIndex, TileConfig,
    };
    pub use crate::{
        ComposeOptions, InputGraphic, PackOutput, duplicate_keys, pack_graphics,
        pack_graphics_with, pack_layout, upload_atlas,
    };
}
