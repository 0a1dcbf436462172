//! Field schema: the declarative table of form fields.
//!
//! Each [`FieldSpec`] carries its data kind, validation rules and where it is
//! drawn on the template. Coordinates are PDF points with the origin at the
//! top-left corner of the page; `y` is the text baseline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::FormError;
use crate::validation::Rule;
use crate::value::FieldId;

/// Storage format of a date field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// `YYYY-MM-DD`
    #[default]
    Iso,
    /// `MM/YYYY`
    MonthYear,
}

impl DateFormat {
    pub fn pattern(&self) -> &'static str {
        match self {
            DateFormat::Iso => "%Y-%m-%d",
            DateFormat::MonthYear => "%m/%Y",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Date {
        #[serde(default)]
        format: DateFormat,
    },
    Enum {
        options: Vec<String>,
    },
    /// Repeat group: a list of structurally identical rows.
    Group(GroupSpec),
}

impl FieldKind {
    pub fn is_group(&self) -> bool {
        matches!(self, FieldKind::Group(_))
    }
}

/// Layout of a repeat group (e.g. work history) on the template.
///
/// Row `i` is drawn at the group anchor shifted down by `i * row_height`.
/// Rows past `capacity` do not fit the printed table and are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub row_fields: Vec<FieldId>,
    pub columns: Vec<GroupColumn>,
    pub row_height: f32,
    pub capacity: usize,
    #[serde(default)]
    pub font_size: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupColumn {
    pub x_offset: f32,
    pub source: ColumnSource,
}

/// What text a group column prints for each row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnSource {
    Field { field: FieldId },
    /// `"{from} - {to}"`, used for date ranges.
    Span { from: FieldId, to: FieldId },
}

impl ColumnSource {
    fn fields(&self) -> Vec<&FieldId> {
        match self {
            ColumnSource::Field { field } => vec![field],
            ColumnSource::Span { from, to } => vec![from, to],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Placement {
    Anchor {
        page: usize,
        x: f32,
        y: f32,
    },
    /// A date drawn as separate day / month / year boxes on one baseline.
    SplitDate {
        page: usize,
        day_x: f32,
        month_x: f32,
        year_x: f32,
        y: f32,
    },
    /// Collected but never drawn on its own (group row fields, selectors).
    #[default]
    Unplaced,
}

impl Placement {
    pub fn page(&self) -> Option<usize> {
        match self {
            Placement::Anchor { page, .. } | Placement::SplitDate { page, .. } => Some(*page),
            Placement::Unplaced => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub id: FieldId,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub placement: Placement,
    #[serde(default)]
    pub max_width: Option<f32>,
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl FieldSpec {
    pub fn new(id: &str, label: &str, kind: FieldKind) -> Self {
        FieldSpec {
            id: FieldId::from(id),
            label: label.to_string(),
            kind,
            placement: Placement::Unplaced,
            max_width: None,
            font_size: None,
            rules: Vec::new(),
        }
    }

    pub fn text(id: &str, label: &str) -> Self {
        Self::new(id, label, FieldKind::Text)
    }

    pub fn date(id: &str, label: &str, format: DateFormat) -> Self {
        Self::new(id, label, FieldKind::Date { format })
    }

    pub fn choice(id: &str, label: &str, options: &[&str]) -> Self {
        let options = options.iter().map(|s| s.to_string()).collect();
        Self::new(id, label, FieldKind::Enum { options })
    }

    pub fn group(id: &str, label: &str, group: GroupSpec) -> Self {
        Self::new(id, label, FieldKind::Group(group))
    }

    /// Anchor the field at `(x, y)` on `page`.
    pub fn at(mut self, page: usize, x: f32, y: f32) -> Self {
        self.placement = Placement::Anchor { page, x, y };
        self
    }

    pub fn split_date(mut self, page: usize, xs: [f32; 3], y: f32) -> Self {
        self.placement = Placement::SplitDate {
            page,
            day_x: xs[0],
            month_x: xs[1],
            year_x: xs[2],
            y,
        };
        self
    }

    pub fn max_width(mut self, width: f32) -> Self {
        self.max_width = Some(width);
        self
    }

    pub fn font_size(mut self, size: f32) -> Self {
        self.font_size = Some(size);
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn group_spec(&self) -> Option<&GroupSpec> {
        match &self.kind {
            FieldKind::Group(group) => Some(group),
            _ => None,
        }
    }
}

/// The process-wide field table. Built once, then only read.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    fields: Vec<FieldSpec>,
    index: BTreeMap<FieldId, usize>,
}

impl FieldSchema {
    /// Build a schema, rejecting duplicate ids and groups that reference
    /// fields missing from the table.
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, FormError> {
        let mut index = BTreeMap::new();
        for (i, field) in fields.iter().enumerate() {
            if index.insert(field.id.clone(), i).is_some() {
                return Err(FormError::DuplicateField(field.id.to_string()));
            }
        }

        let schema = FieldSchema { fields, index };
        for field in &schema.fields {
            if let Some(group) = field.group_spec() {
                for row_field in &group.row_fields {
                    schema.lookup(row_field.as_str())?;
                }
                for column in &group.columns {
                    for id in column.source.fields() {
                        if !group.row_fields.contains(id) {
                            return Err(FormError::UnknownField(format!("{}.{}", field.id, id)));
                        }
                    }
                }
            }
        }

        Ok(schema)
    }

    pub fn lookup(&self, id: &str) -> Result<&FieldSpec, FormError> {
        self.get(id)
            .ok_or_else(|| FormError::UnknownField(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<&FieldSpec> {
        self.index.get(id).map(|&i| &self.fields[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
