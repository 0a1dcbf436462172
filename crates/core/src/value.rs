//! Field ids and the values a session collects for them.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique key of a form field (e.g. `full_name`, `work_dataframe`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    pub fn new(id: impl Into<String>) -> Self {
        FieldId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FieldId {
    fn from(s: &str) -> Self {
        FieldId(s.to_string())
    }
}

impl Borrow<str> for FieldId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One entry of a repeat group: row field id -> raw text.
pub type Record = BTreeMap<FieldId, String>;

/// Raw input collected for a single field.
///
/// Serialized untagged, so JSON input is either a plain string or an array
/// of objects (one per repeat-group row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Rows(Vec<Record>),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Rows(_) => None,
        }
    }

    pub fn as_rows(&self) -> Option<&[Record]> {
        match self {
            FieldValue::Rows(rows) => Some(rows),
            FieldValue::Text(_) => None,
        }
    }

    /// Whitespace-only text and empty row lists count as blank.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Rows(rows) => rows.is_empty(),
        }
    }
}

/// Every value entered in a session, keyed by field id.
pub type Values = BTreeMap<FieldId, FieldValue>;

/// Flatten the text-valued entries of `values` into a [`Record`] so that
/// cross-field rules see top-level fields and row cells the same way.
pub fn text_record(values: &Values) -> Record {
    values
        .iter()
        .filter_map(|(id, value)| value.as_text().map(|s| (id.clone(), s.to_string())))
        .collect()
}
