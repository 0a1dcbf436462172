//! Layout planning: turn a finished session into positioned text.
//!
//! This is the pure half of rendering. It decides what string goes where and
//! at which size; the `pdf` crate only has to draw the resulting [`Stamp`]s.

use serde::{Deserialize, Serialize};

use crate::schema::{ColumnSource, FieldKind, FieldSpec, GroupSpec, Placement};
use crate::validation::split_iso_date;
use crate::value::{FieldId, FieldValue, Record, Values};

/// Immutable snapshot handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub template: String,
    pub template_file: String,
    pub values: Values,
    /// Every spec the blueprint touches, group row fields included.
    pub fields: Vec<FieldSpec>,
}

impl RenderRequest {
    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.id.as_str() == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutDefaults {
    pub font_size: f32,
    /// Repeat-group rows are printed smaller to fit the table cells.
    pub group_font_size: f32,
}

impl Default for LayoutDefaults {
    fn default() -> Self {
        LayoutDefaults {
            font_size: 10.0,
            group_font_size: 8.0,
        }
    }
}

/// Smallest size that stays legible on a printed form.
pub const MIN_FONT_SIZE: f32 = 6.0;

impl LayoutDefaults {
    /// Group rows get two points less, but never below [`MIN_FONT_SIZE`].
    pub fn with_font_size(font_size: f32) -> Self {
        let font_size = font_size.max(MIN_FONT_SIZE);
        LayoutDefaults {
            font_size,
            group_font_size: (font_size - 2.0).max(MIN_FONT_SIZE),
        }
    }
}

/// One string at one position. Coordinates are top-left based, `y` is the
/// baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamp {
    pub field: FieldId,
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub font_size: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayoutWarning {
    /// More rows than the printed table holds; the tail was not drawn.
    Truncated {
        field: FieldId,
        kept: usize,
        dropped: usize,
    },
}

impl std::fmt::Display for LayoutWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutWarning::Truncated {
                field,
                kept,
                dropped,
            } => write!(f, "{field}: kept {kept} row(s), dropped {dropped}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutPlan {
    pub stamps: Vec<Stamp>,
    pub warnings: Vec<LayoutWarning>,
}

/// Lay out every placed, non-blank value of `request` in field order.
pub fn plan(request: &RenderRequest, defaults: &LayoutDefaults) -> LayoutPlan {
    let mut plan = LayoutPlan::default();

    for spec in &request.fields {
        let Some(value) = request.values.get(spec.id.as_str()) else {
            continue;
        };
        if value.is_blank() {
            continue;
        }

        match (&spec.kind, value) {
            (FieldKind::Group(group), FieldValue::Rows(rows)) => {
                plan_group(&mut plan, request, spec, group, rows, defaults);
            }
            (_, FieldValue::Text(text)) => plan_text(&mut plan, spec, text.trim(), defaults),
            _ => log::warn!("skipping {}: value shape does not match its kind", spec.id),
        }
    }

    plan
}

fn plan_text(plan: &mut LayoutPlan, spec: &FieldSpec, text: &str, defaults: &LayoutDefaults) {
    let font_size = spec.font_size.unwrap_or(defaults.font_size);
    let stamp = |page: usize, x: f32, y: f32, text: String| Stamp {
        field: spec.id.clone(),
        page,
        x,
        y,
        text,
        font_size,
        max_width: spec.max_width,
    };

    match spec.placement {
        Placement::Anchor { page, x, y } => plan.stamps.push(stamp(page, x, y, text.to_string())),
        Placement::SplitDate {
            page,
            day_x,
            month_x,
            year_x,
            y,
        } => match split_iso_date(text) {
            Some((day, month, year)) => {
                plan.stamps.push(stamp(page, day_x, y, day));
                plan.stamps.push(stamp(page, month_x, y, month));
                plan.stamps.push(stamp(page, year_x, y, year));
            }
            None => plan.stamps.push(stamp(page, day_x, y, text.to_string())),
        },
        Placement::Unplaced => {}
    }
}

fn plan_group(
    plan: &mut LayoutPlan,
    request: &RenderRequest,
    spec: &FieldSpec,
    group: &GroupSpec,
    rows: &[Record],
    defaults: &LayoutDefaults,
) {
    let Placement::Anchor { page, x, y } = spec.placement else {
        return;
    };
    let font_size = group.font_size.unwrap_or(defaults.group_font_size);

    if rows.len() > group.capacity {
        let warning = LayoutWarning::Truncated {
            field: spec.id.clone(),
            kept: group.capacity,
            dropped: rows.len() - group.capacity,
        };
        log::warn!("{warning}");
        plan.warnings.push(warning);
    }

    for (index, row) in rows.iter().take(group.capacity).enumerate() {
        let row_y = y + index as f32 * group.row_height;
        for column in &group.columns {
            let text = column_text(&column.source, row);
            if text.is_empty() {
                continue;
            }
            let max_width = match &column.source {
                ColumnSource::Field { field } => {
                    request.field(field.as_str()).and_then(|f| f.max_width)
                }
                ColumnSource::Span { .. } => None,
            };
            plan.stamps.push(Stamp {
                field: spec.id.clone(),
                page,
                x: x + column.x_offset,
                y: row_y,
                text,
                font_size,
                max_width,
            });
        }
    }
}

/// One empty stamp at every point `fields` can print at: anchors, the three
/// parts of a split date, and each group column on its first and last row.
/// Used to check a catalog against a template before any data exists.
pub fn probe_stamps(fields: &[FieldSpec], defaults: &LayoutDefaults) -> Vec<Stamp> {
    let mut stamps = Vec::new();
    for spec in fields {
        let probe = |page: usize, x: f32, y: f32| Stamp {
            field: spec.id.clone(),
            page,
            x,
            y,
            text: String::new(),
            font_size: spec.font_size.unwrap_or(defaults.font_size),
            max_width: spec.max_width,
        };
        match (&spec.kind, spec.placement) {
            (FieldKind::Group(group), Placement::Anchor { page, x, y }) => {
                let last = group.capacity.saturating_sub(1);
                let rows: &[usize] = if last == 0 { &[0] } else { &[0, last] };
                for row in rows {
                    let row_y = y + *row as f32 * group.row_height;
                    for column in &group.columns {
                        stamps.push(probe(page, x + column.x_offset, row_y));
                    }
                }
            }
            (_, Placement::Anchor { page, x, y }) => stamps.push(probe(page, x, y)),
            (
                _,
                Placement::SplitDate {
                    page,
                    day_x,
                    month_x,
                    year_x,
                    y,
                },
            ) => {
                for x in [day_x, month_x, year_x] {
                    stamps.push(probe(page, x, y));
                }
            }
            (_, Placement::Unplaced) => {}
        }
    }
    stamps
}

fn column_text(source: &ColumnSource, row: &Record) -> String {
    let cell = |id: &FieldId| row.get(id.as_str()).map(|s| s.trim()).unwrap_or_default();
    match source {
        ColumnSource::Field { field } => cell(field).to_string(),
        ColumnSource::Span { from, to } => match (cell(from), cell(to)) {
            ("", "") => String::new(),
            (from, "") => from.to_string(),
            ("", to) => to.to_string(),
            (from, to) => format!("{from} - {to}"),
        },
    }
}
