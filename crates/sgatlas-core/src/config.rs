use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Where the image record table starts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TableLayout {
    /// Image records follow the declared bitmap records directly.
    Packed,
    /// Image records follow a fixed bitmap-slot area (100 slots for 0xd3 files, 200 otherwise).
    Reserved,
}

impl FromStr for TableLayout {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "packed" => Ok(Self::Packed),
            "reserved" => Ok(Self::Reserved),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    #[serde(default = "default_table_layout")]
    pub table_layout: TableLayout,
    /// A payload exactly this many bytes short is padded with zeros instead of failing.
    #[serde(default = "default_short_read_tolerance")]
    pub short_read_tolerance: usize,
    /// Drop duplicated bitmap headers when the first one already owns every image.
    #[serde(default = "default_collapse")]
    pub collapse_shared_bitmaps: bool,
    /// Suffixes tried when looking for the external pixel file.
    #[serde(default = "default_companion_suffixes")]
    pub companion_suffixes: Vec<String>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            table_layout: default_table_layout(),
            short_read_tolerance: default_short_read_tolerance(),
            collapse_shared_bitmaps: default_collapse(),
            companion_suffixes: default_companion_suffixes(),
        }
    }
}

impl DecoderConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::SgError;

        if self.companion_suffixes.is_empty() {
            return Err(SgError::InvalidInput(
                "companion_suffixes must name at least one suffix".into(),
            ));
        }
        for suffix in &self.companion_suffixes {
            if suffix.is_empty() || suffix.contains(['/', '\\']) {
                return Err(SgError::InvalidInput(format!(
                    "invalid companion suffix {suffix:?}"
                )));
            }
        }
        Ok(())
    }
}

fn default_table_layout() -> TableLayout {
    TableLayout::Packed
}
fn default_short_read_tolerance() -> usize {
    4
}
fn default_collapse() -> bool {
    true
}
fn default_companion_suffixes() -> Vec<String> {
    vec!["555".into()]
}

/// Builder for `DecoderConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct DecoderConfigBuilder {
    cfg: DecoderConfig,
}

impl DecoderConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: DecoderConfig::default(),
        }
    }
    pub fn table_layout(mut self, v: TableLayout) -> Self {
        self.cfg.table_layout = v;
        self
    }
    pub fn short_read_tolerance(mut self, v: usize) -> Self {
        self.cfg.short_read_tolerance = v;
        self
    }
    pub fn collapse_shared_bitmaps(mut self, v: bool) -> Self {
        self.cfg.collapse_shared_bitmaps = v;
        self
    }
    pub fn companion_suffixes<I, S>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.companion_suffixes = v.into_iter().map(Into::into).collect();
        self
    }
    pub fn build(self) -> DecoderConfig {
        self.cfg
    }
}

impl DecoderConfig {
    /// Create a fluent builder for `DecoderConfig`.
    pub fn builder() -> DecoderConfigBuilder {
        DecoderConfigBuilder::new()
    }
}
