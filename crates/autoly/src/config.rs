//! Settings file and the shared context built from it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use autoly_core::{Catalog, FieldKind, LayoutDefaults, MIN_FONT_SIZE};
use pdf::{FontAsset, Renderer};
use serde::{Deserialize, Serialize};

use crate::prelude::{eprintln, *};

/// Used when neither the flag nor the settings file names a directory.
pub const DEFAULT_TEMPLATE_DIR: &str = "templates";

/// Font used when none is configured and this file exists.
pub const DEFAULT_FONT_PATH: &str = "fonts/DejaVuSans.ttf";

/// Accepted range for `font_size`, in points.
pub const FONT_SIZE_RANGE: std::ops::RangeInclusive<f32> = MIN_FONT_SIZE..=36.0;

/// Contents of the `--config` TOML file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub template_dir: Option<PathBuf>,
    pub font_path: Option<PathBuf>,
    pub font_size: Option<f32>,
    /// A catalog TOML file replacing the built-in one.
    pub catalog: Option<PathBuf>,
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| eyre!("Invalid config: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(size) = self.font_size {
            if !FONT_SIZE_RANGE.contains(&size) {
                return Err(Error::FontSize(size).into());
            }
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&text)
    }

    /// Settings from `--config` (if any) with command line flags on top.
    pub fn resolve(global: &crate::Global) -> Result<Self> {
        let file = match &global.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        Ok(file.with_overrides(global))
    }

    fn with_overrides(self, global: &crate::Global) -> Self {
        Config {
            template_dir: global.template_dir.clone().or(self.template_dir),
            font_path: global.font.clone().or(self.font_path),
            font_size: self.font_size,
            catalog: global.catalog.clone().or(self.catalog),
        }
    }

    /// The configured font, or the bundled one when it is present.
    pub fn font_path(&self) -> Option<PathBuf> {
        self.font_path.clone().or_else(|| {
            let default = PathBuf::from(DEFAULT_FONT_PATH);
            default.is_file().then_some(default)
        })
    }

    pub fn template_dir(&self) -> PathBuf {
        self.template_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_DIR))
    }

    pub fn layout_defaults(&self) -> LayoutDefaults {
        self.font_size
            .map(LayoutDefaults::with_font_size)
            .unwrap_or_default()
    }
}

/// The catalog named by the settings, or the built-in one.
pub fn load_catalog(config: &Config) -> Result<Catalog> {
    match &config.catalog {
        Some(path) => crate::catalog::load(path),
        None => Ok(Catalog::builtin()?),
    }
}

/// Characters of the catalog's choice options that `font` cannot draw.
/// Free text is checked again at render time.
fn uncovered_chars(catalog: &Catalog, font: &FontAsset) -> BTreeSet<char> {
    catalog
        .schema
        .iter()
        .filter_map(|spec| match &spec.kind {
            FieldKind::Enum { options } => Some(options),
            _ => None,
        })
        .flatten()
        .flat_map(|option| font.missing_chars(option))
        .collect()
}

/// Everything a command needs, loaded once at startup and read-only after.
#[derive(Debug, Clone)]
pub struct Context {
    pub catalog: Arc<Catalog>,
    pub renderer: Arc<Renderer>,
}

impl Context {
    pub fn load(global: &crate::Global) -> Result<Self> {
        let config = Config::resolve(global)?;
        if global.verbose {
            eprintln!("Template directory: {}", config.template_dir().display());
        }

        let catalog = load_catalog(&config)?;

        let font = match config.font_path() {
            Some(path) => FontAsset::load(&path)?,
            None => FontAsset::Standard,
        };
        let missing = uncovered_chars(&catalog, &font);
        if !missing.is_empty() {
            return Err(eyre!(
                "Font {} cannot draw {:?} used by the catalog; pass --font with a TrueType \
                 font that covers them (default: {})",
                font.name(),
                missing.iter().collect::<String>(),
                DEFAULT_FONT_PATH
            ));
        }
        log::debug!("using font {}", font.name());

        let renderer =
            Renderer::new(config.template_dir(), font).with_defaults(config.layout_defaults());

        Ok(Context {
            catalog: Arc::new(catalog),
            renderer: Arc::new(renderer),
        })
    }
}
