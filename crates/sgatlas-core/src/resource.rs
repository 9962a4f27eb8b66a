//! Name → atlas region or standalone graphic, with a permanent placeholder entry.

use crate::compositing::crop_rgba;
use crate::device::{DeviceWorker, GraphicsDevice};
use crate::error::{Result, SgError};
use crate::loader::LoaderRegistry;
use crate::model::{AtlasRegion, DecodedGraphic};
use crate::pipeline::{InputGraphic, pack_graphics, upload_atlas};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Reserved name of the placeholder entry.
pub const DEFAULT_GRAPHIC_NAME: &str = "____DEFAULT____";
/// Width and height of the placeholder graphic.
pub const DEFAULT_GRAPHIC_SIZE: u32 = 128;

/// What a name resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Region(AtlasRegion),
    Graphic(Arc<DecodedGraphic>),
}

impl Resource {
    pub fn size(&self) -> (u32, u32) {
        match self {
            Resource::Region(r) => (r.rect.w, r.rect.h),
            Resource::Graphic(g) => (g.width(), g.height()),
        }
    }

    pub fn origin(&self) -> (i32, i32) {
        match self {
            Resource::Region(r) => r.origin,
            Resource::Graphic(g) => g.origin,
        }
    }
}

/// Deterministic placeholder pattern; never read from disk.
pub fn placeholder_graphic() -> DecodedGraphic {
    let size = DEFAULT_GRAPHIC_SIZE;
    let fw = size as f64;
    let total = (size * size) as f64;
    let pixels = RgbaImage::from_fn(size, size, |x, y| {
        let p = (y * size + x) as f64;
        // float-to-int casts saturate, so out-of-range channels clamp to 0..=255
        let r = ((y as f64 / fw).cos() * 255.0) as u8;
        let g = ((x as f64 / fw).sin() * 255.0) as u8;
        let b = ((p / total).tan() * 255.0) as u8;
        Rgba([r, g, b, 255])
    });
    DecodedGraphic::new(pixels)
}

/// How to load one tile. Zero sizes mean "to the edge of the image".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileConfig {
    pub name: String,
    pub filename: PathBuf,
    /// Graphic to take when the file holds several; defaults to the first.
    #[serde(default)]
    pub entry: Option<String>,
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
    #[serde(default)]
    pub w: u32,
    #[serde(default)]
    pub h: u32,
    #[serde(default)]
    pub off_x: i32,
    #[serde(default)]
    pub off_y: i32,
}

/// A nested directory whose resources are named `<name>.<resource>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdirectoryConfig {
    pub name: String,
    pub directory: PathBuf,
    #[serde(default)]
    pub config: ResourceConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub tiles: Vec<TileConfig>,
    #[serde(default)]
    pub subdirectories: Vec<SubdirectoryConfig>,
}

impl ResourceConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| SgError::InvalidInput(format!("resource config: {e}")))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SgError::from(e).in_file(path))?;
        Self::from_json_str(&text).map_err(|e| e.in_file(path))
    }

    /// Appends the entries of `other`.
    pub fn merge(&mut self, other: ResourceConfig) {
        self.tiles.extend(other.tiles);
        self.subdirectories.extend(other.subdirectories);
    }
}

/// Registry of named resources.
pub struct ResourceIndex {
    loaders: Arc<LoaderRegistry>,
    placeholder: Resource,
    entries: HashMap<String, Resource>,
}

impl ResourceIndex {
    /// Creates an index holding only the placeholder entry.
    pub fn new(loaders: Arc<LoaderRegistry>) -> Self {
        Self {
            loaders,
            placeholder: Resource::Graphic(Arc::new(placeholder_graphic())),
            entries: HashMap::new(),
        }
    }

    /// Index backed by the process-wide loader registry.
    pub fn with_global_loaders() -> Self {
        Self::new(LoaderRegistry::global())
    }

    pub fn loaders(&self) -> &LoaderRegistry {
        &self.loaders
    }

    /// Binds `name`, replacing any previous binding. The placeholder name cannot be bound.
    pub fn register(&mut self, name: impl Into<String>, resource: Resource) -> Result<()> {
        let name = name.into();
        if name == DEFAULT_GRAPHIC_NAME {
            return Err(SgError::ReservedName { name });
        }
        if self.entries.insert(name.clone(), resource).is_some() {
            debug!(%name, "replaced resource");
        }
        Ok(())
    }

    pub fn register_graphic(&mut self, name: impl Into<String>, graphic: DecodedGraphic) -> Result<()> {
        self.register(name, Resource::Graphic(Arc::new(graphic)))
    }

    pub fn lookup(&self, name: &str) -> Result<&Resource> {
        if name == DEFAULT_GRAPHIC_NAME {
            return Ok(&self.placeholder);
        }
        self.entries.get(name).ok_or_else(|| SgError::NotFound {
            name: name.to_string(),
        })
    }

    /// Like [`Self::lookup`], falling back to the placeholder.
    pub fn lookup_or_default(&self, name: &str) -> &Resource {
        match self.lookup(name) {
            Ok(r) => r,
            Err(_) => {
                warn!(%name, "resource not found, using placeholder");
                self.default_resource()
            }
        }
    }

    pub fn default_resource(&self) -> &Resource {
        &self.placeholder
    }

    pub fn contains(&self, name: &str) -> bool {
        name == DEFAULT_GRAPHIC_NAME || self.entries.contains_key(name)
    }

    /// Number of entries, the placeholder included.
    pub fn len(&self) -> usize {
        self.entries.len() + 1
    }

    /// Never true: the placeholder is always present.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Registered names in sorted order, the placeholder included.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.push(DEFAULT_GRAPHIC_NAME);
        names.sort_unstable();
        names
    }

    /// Loads every graphic in `path` as a standalone graphic.
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        self.load_file_prefix(path, "")
    }

    /// As [`Self::load_file`], prepending `prefix` to every name.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load_file_prefix(&mut self, path: &Path, prefix: &str) -> Result<usize> {
        let graphics = self.loaders.load(path)?;
        let count = graphics.len();
        for InputGraphic { key, graphic } in graphics {
            self.register_graphic(format!("{prefix}{key}"), graphic)?;
        }
        info!(count, "registered graphics");
        Ok(count)
    }

    /// Decodes `path`, packs it into one strip atlas, uploads it and binds every region.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load_file_packed<D: GraphicsDevice + 'static>(
        &mut self,
        path: &Path,
        prefix: &str,
        worker: &DeviceWorker<D>,
    ) -> Result<usize> {
        let graphics = self.loaders.load(path)?;
        let output = pack_graphics(graphics).map_err(|e| e.in_file(path))?;
        let regions = upload_atlas(worker, output)?;
        self.publish_atlas(regions, prefix)
    }

    /// Binds the regions of an uploaded atlas.
    pub fn publish_atlas(&mut self, regions: Vec<(String, AtlasRegion)>, prefix: &str) -> Result<usize> {
        let count = regions.len();
        for (key, region) in regions {
            self.register(format!("{prefix}{key}"), Resource::Region(region))?;
        }
        Ok(count)
    }

    /// Loads one configured tile relative to `base_dir`.
    pub fn load_tile(&mut self, tile: &TileConfig, base_dir: &Path) -> Result<()> {
        self.load_tile_prefixed(tile, base_dir, "")
    }

    fn load_tile_prefixed(&mut self, tile: &TileConfig, base_dir: &Path, prefix: &str) -> Result<()> {
        let path = base_dir.join(&tile.filename);
        let graphics = self.loaders.load(&path)?;
        let source = match &tile.entry {
            Some(entry) => graphics.into_iter().find(|g| &g.key == entry),
            None => graphics.into_iter().next(),
        }
        .ok_or_else(|| {
            SgError::NotFound {
                name: tile.entry.clone().unwrap_or_else(|| tile.name.clone()),
            }
            .in_file(&path)
        })?;

        let pixels = &source.graphic.pixels;
        let (iw, ih) = pixels.dimensions();
        if tile.x >= iw || tile.y >= ih {
            return Err(SgError::InvalidInput(format!(
                "tile {} starts at {},{} outside a {}x{} image",
                tile.name, tile.x, tile.y, iw, ih
            )));
        }
        let w = if tile.w == 0 { iw - tile.x } else { tile.w };
        let h = if tile.h == 0 { ih - tile.y } else { tile.h };
        let cropped = crop_rgba(pixels, tile.x, tile.y, w, h);
        let graphic = DecodedGraphic::new(cropped).with_origin(tile.off_x, tile.off_y);
        self.register_graphic(format!("{prefix}{}", tile.name), graphic)
    }

    /// Loads every configured tile; failures are logged and skipped. Returns the number loaded.
    #[instrument(skip_all)]
    pub fn apply_config(&mut self, config: &ResourceConfig, base_dir: &Path) -> usize {
        self.apply_config_prefixed(config, base_dir, "")
    }

    fn apply_config_prefixed(&mut self, config: &ResourceConfig, base_dir: &Path, prefix: &str) -> usize {
        let mut loaded = 0;
        for tile in &config.tiles {
            match self.load_tile_prefixed(tile, base_dir, prefix) {
                Ok(()) => loaded += 1,
                Err(e) => warn!(tile = %tile.name, error = %e, "skipping tile"),
            }
        }
        for sub in &config.subdirectories {
            let nested = format!("{prefix}{}.", sub.name);
            loaded += self.apply_config_prefixed(&sub.config, &base_dir.join(&sub.directory), &nested);
        }
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_deterministic_and_opaque() {
        let a = placeholder_graphic();
        let b = placeholder_graphic();
        assert_eq!(a, b);
        assert_eq!(a.pixels.dimensions(), (128, 128));
        assert!(a.pixels.pixels().all(|p| p[3] == 255));
        // cos(0) = 1
        assert_eq!(a.pixels.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn config_parses_with_defaults() {
        let cfg = ResourceConfig::from_json_str(
            r#"{"tiles":[{"name":"grass","filename":"grass.png","w":16}],
                "subdirectories":[{"name":"ui","directory":"ui"}]}"#,
        )
        .unwrap();
        assert_eq!(cfg.tiles[0].w, 16);
        assert_eq!(cfg.tiles[0].h, 0);
        assert_eq!(cfg.subdirectories[0].config, ResourceConfig::default());
    }
}
