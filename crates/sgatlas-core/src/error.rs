use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SgError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Truncated header: need {need} bytes, have {have}")]
    TruncatedHeader { need: usize, have: usize },
    #[error("Unexpected end of data at offset {offset:#x} (need {need} bytes, have {have})")]
    UnexpectedEof {
        offset: usize,
        need: usize,
        have: usize,
    },
    #[error("Short read at offset {offset:#x}: expected {expected} bytes, got {actual}")]
    ShortRead {
        offset: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },
    #[error("Unsupported image type: {tag}")]
    UnsupportedImageType { tag: u16 },
    #[error("Unknown isometric tile size for footprint height {height}")]
    UnknownTileSize { height: u32 },
    #[error("Isometric footprint needs {expected} bytes, record declares {actual}")]
    FootprintMismatch { expected: usize, actual: usize },
    #[error("Malformed run list in row {row} at offset {offset:#x}")]
    MalformedRunList { row: u32, offset: usize },
    #[error("Image {index} has invalid invert offset {invert_offset}")]
    InvalidInvertOffset { index: usize, invert_offset: i32 },
    #[error("Cannot find external pixel file for {}", path.display())]
    MissingCompanion { path: PathBuf },
    #[error("Extension {extension:?} already has a registered loader")]
    DuplicateExtension { extension: String },
    #[error("No loader associated with extension {extension:?}")]
    NoLoader { extension: String },
    #[error("Name {name:?} is reserved")]
    ReservedName { name: String },
    #[error("Could not find resource {name:?}")]
    NotFound { name: String },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Atlas does not fit the available surface size")]
    OutOfSpace,
    #[error("Nothing to pack")]
    Empty,
    #[error("Graphics device worker has shut down")]
    DeviceClosed,
    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: Box<SgError>,
    },
}

impl SgError {
    /// Wraps `self` so the error identifies the file it came from.
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            already @ SgError::File { .. } => already,
            other => SgError::File {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, SgError>;
