//! File loaders keyed by extension.

use crate::config::DecoderConfig;
use crate::container::{DecodeReport, PixelSources, SgFile};
use crate::error::{Result, SgError};
use crate::model::DecodedGraphic;
use crate::pipeline::InputGraphic;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Produces named graphics from one whole file.
pub trait GraphicLoader: Send + Sync {
    /// Lower-case extensions, without the dot.
    fn extensions(&self) -> Vec<String>;
    /// Loads every graphic in `path`, in file order. Names are unique within the file.
    fn load_file(&self, path: &Path) -> Result<Vec<InputGraphic>>;
}

/// A container read from disk together with its pixel bytes.
pub struct LoadedContainer {
    pub path: PathBuf,
    pub file: SgFile,
    pub inline: Vec<u8>,
    pub external: Option<Vec<u8>>,
}

impl LoadedContainer {
    /// Reads `path` and, when any image needs it, the companion pixel file.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path, cfg: &DecoderConfig) -> Result<Self> {
        let inline = std::fs::read(path)?;
        let file = SgFile::parse(&inline, cfg)?;
        let external = if file.needs_external() {
            let companion = find_companion(path, &cfg.companion_suffixes).ok_or_else(|| {
                SgError::MissingCompanion {
                    path: path.to_path_buf(),
                }
            })?;
            debug!(companion = %companion.display(), "reading external pixel data");
            Some(std::fs::read(&companion)?)
        } else {
            None
        };
        Ok(Self {
            path: path.to_path_buf(),
            file,
            inline,
            external,
        })
    }

    pub fn sources(&self) -> PixelSources<'_> {
        PixelSources {
            inline: &self.inline,
            external: self.external.as_deref(),
        }
    }

    /// Owner used for images whose bitmap has no usable file name.
    pub fn fallback_owner(&self) -> String {
        file_stem(&self.path)
    }

    pub fn decode_all(&self, cfg: &DecoderConfig) -> DecodeReport {
        self.file
            .decode_all(&self.sources(), cfg, &self.fallback_owner())
    }
}

/// Finds the external pixel file for `path`: `<stem>.<suffix>` first, then `<file>.<suffix>`.
pub fn find_companion(path: &Path, suffixes: &[String]) -> Option<PathBuf> {
    suffixes.iter().find_map(|suffix| {
        let replaced = path.with_extension(suffix);
        let mut appended = path.as_os_str().to_owned();
        appended.push(".");
        appended.push(suffix);
        [replaced, PathBuf::from(appended)]
            .into_iter()
            .find(|p| p.is_file())
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Loads `sg2`/`sg3` containers.
#[derive(Debug, Clone, Default)]
pub struct ContainerLoader {
    pub cfg: DecoderConfig,
}

impl ContainerLoader {
    pub fn new(cfg: DecoderConfig) -> Self {
        Self { cfg }
    }
}

impl GraphicLoader for ContainerLoader {
    fn extensions(&self) -> Vec<String> {
        vec!["sg2".into(), "sg3".into()]
    }

    fn load_file(&self, path: &Path) -> Result<Vec<InputGraphic>> {
        let loaded = LoadedContainer::open(path, &self.cfg)?;
        let report = loaded.decode_all(&self.cfg);
        info!(
            path = %path.display(),
            decoded = report.graphics.len(),
            failed = report.failures.len(),
            "loaded container"
        );
        Ok(report.graphics)
    }
}

/// Loads ordinary image files through the `image` crate, one graphic named after the file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFileLoader;

impl GraphicLoader for ImageFileLoader {
    fn extensions(&self) -> Vec<String> {
        ["png", "jpg", "jpeg"].iter().map(|s| s.to_string()).collect()
    }

    fn load_file(&self, path: &Path) -> Result<Vec<InputGraphic>> {
        let pixels = image::open(path)?.to_rgba8();
        Ok(vec![InputGraphic {
            key: file_stem(path),
            graphic: DecodedGraphic::new(pixels),
        }])
    }
}

/// Maps file extensions to loaders. Built once, then only read.
#[derive(Default, Clone)]
pub struct LoaderRegistry {
    loaders: Vec<Arc<dyn GraphicLoader>>,
    by_extension: HashMap<String, usize>,
}

impl fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut exts: Vec<_> = self.by_extension.keys().collect();
        exts.sort();
        f.debug_struct("LoaderRegistry")
            .field("extensions", &exts)
            .finish()
    }
}

static GLOBAL_REGISTRY: OnceLock<Arc<LoaderRegistry>> = OnceLock::new();

impl LoaderRegistry {
    pub fn builder() -> LoaderRegistryBuilder {
        LoaderRegistryBuilder::default()
    }

    /// Registry with the container and image-file loaders.
    pub fn with_defaults() -> Self {
        Self::with_decoder_config(DecoderConfig::default())
    }

    pub fn with_decoder_config(cfg: DecoderConfig) -> Self {
        let mut registry = Self::default();
        registry.insert(Arc::new(ContainerLoader::new(cfg)));
        registry.insert(Arc::new(ImageFileLoader));
        registry
    }

    /// Process-wide registry; initialised with the defaults on first use.
    pub fn global() -> Arc<LoaderRegistry> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(Self::with_defaults()))
            .clone()
    }

    /// Installs the process-wide registry. Fails once it has been initialised.
    pub fn install_global(registry: LoaderRegistry) -> Result<()> {
        GLOBAL_REGISTRY.set(Arc::new(registry)).map_err(|_| {
            SgError::InvalidInput("global loader registry is already initialised".into())
        })
    }

    fn check(&self, loader: &dyn GraphicLoader) -> Result<()> {
        let mut seen = Vec::new();
        for ext in loader.extensions() {
            let ext = ext.to_ascii_lowercase();
            if self.by_extension.contains_key(&ext) || seen.contains(&ext) {
                return Err(SgError::DuplicateExtension { extension: ext });
            }
            seen.push(ext);
        }
        Ok(())
    }

    fn insert(&mut self, loader: Arc<dyn GraphicLoader>) {
        let idx = self.loaders.len();
        for ext in loader.extensions() {
            self.by_extension.insert(ext.to_ascii_lowercase(), idx);
        }
        self.loaders.push(loader);
    }

    pub fn loader_for(&self, path: &Path) -> Result<&dyn GraphicLoader> {
        let extension = extension_of(path);
        self.by_extension
            .get(&extension)
            .map(|&i| self.loaders[i].as_ref())
            .ok_or(SgError::NoLoader { extension })
    }

    pub fn extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.by_extension.keys().cloned().collect();
        exts.sort();
        exts
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.by_extension.contains_key(&extension_of(path))
    }

    /// Loads one file; any failure is reported against `path`.
    pub fn load(&self, path: &Path) -> Result<Vec<InputGraphic>> {
        self.loader_for(path)
            .and_then(|loader| loader.load_file(path))
            .map_err(|e| e.in_file(path))
    }
}

/// Ordered registrations; the first conflicting extension fails that registration only.
#[derive(Default)]
pub struct LoaderRegistryBuilder {
    registry: LoaderRegistry,
}

impl LoaderRegistryBuilder {
    pub fn register<L: GraphicLoader + 'static>(mut self, loader: L) -> Result<Self> {
        self.registry.check(&loader)?;
        self.registry.insert(Arc::new(loader));
        Ok(self)
    }

    pub fn build(self) -> LoaderRegistry {
        self.registry
    }
}

impl LoaderRegistry {
    /// Registers into an existing registry. On conflict the registry is left unchanged.
    pub fn register<L: GraphicLoader + 'static>(&mut self, loader: L) -> Result<()> {
        self.check(&loader)?;
        self.insert(Arc::new(loader));
        Ok(())
    }
}

/// Loads many files independently. Results keep the order of `paths`.
pub fn load_files(
    registry: &LoaderRegistry,
    paths: &[PathBuf],
) -> Vec<(PathBuf, Result<Vec<InputGraphic>>)> {
    load_files_with(registry, paths, |_| {})
}

/// As [`load_files`], calling `on_loaded` once per file as soon as it finishes, from whichever
/// thread loaded it.
#[instrument(skip_all, fields(files = paths.len()))]
pub fn load_files_with<F>(
    registry: &LoaderRegistry,
    paths: &[PathBuf],
    on_loaded: F,
) -> Vec<(PathBuf, Result<Vec<InputGraphic>>)>
where
    F: Fn(&Path) + Sync,
{
    let load_one = |p: &PathBuf| {
        let result = registry.load(p);
        on_loaded(p);
        (p.clone(), result)
    };
    #[cfg(feature = "parallel")]
    {
        paths.par_iter().map(load_one).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        paths.iter().map(load_one).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake(&'static [&'static str]);

    impl GraphicLoader for Fake {
        fn extensions(&self) -> Vec<String> {
            self.0.iter().map(|s| s.to_string()).collect()
        }
        fn load_file(&self, _path: &Path) -> Result<Vec<InputGraphic>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn duplicate_extension_rejected_atomically() {
        let mut reg = LoaderRegistry::builder()
            .register(Fake(&["abc"]))
            .unwrap()
            .build();
        let err = reg.register(Fake(&["xyz", "ABC"])).unwrap_err();
        assert!(matches!(err, SgError::DuplicateExtension { ref extension } if extension == "abc"));
        assert_eq!(reg.extensions(), vec!["abc".to_string()]);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let reg = LoaderRegistry::with_defaults();
        assert!(reg.supports(Path::new("C3.SG2")));
        assert!(reg.supports(Path::new("a/b/sprite.png")));
        assert!(matches!(
            reg.loader_for(Path::new("notes.txt")),
            Err(SgError::NoLoader { .. })
        ));
    }
}
