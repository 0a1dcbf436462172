//! Catalog files: `[[fields]]` and `[[templates]]` tables replacing the
//! built-in catalog.

use std::path::Path;

use autoly_core::{Blueprint, Catalog, FieldSpec};
use serde::Deserialize;

use crate::prelude::*;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    fields: Vec<FieldSpec>,
    #[serde(default)]
    templates: Vec<Blueprint>,
}

pub fn parse(text: &str) -> Result<Catalog> {
    let file: CatalogFile = toml::from_str(text).map_err(|e| eyre!("Invalid catalog: {e}"))?;
    let catalog = Catalog::new(file.fields, file.templates)?;
    Ok(catalog)
}

pub fn load(path: &Path) -> Result<Catalog> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read catalog {}", path.display()))?;
    parse(&text).wrap_err_with(|| format!("Failed to load catalog {}", path.display()))
}
