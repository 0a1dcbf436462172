//! Field-level and cross-field validation.
//!
//! Rules are plain data so a schema can be declared in code or loaded from a
//! catalog file. Every rule is pure: the only outside input is the `today`
//! date injected into [`Validator`]. Invalid input is returned as a list of
//! [`ValidationError`]s, never as an `Err`.

use std::fmt;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::blueprint::Step;
use crate::error::FormError;
use crate::schema::{DateFormat, FieldKind, FieldSchema, FieldSpec};
use crate::value::{text_record, FieldId, FieldValue, Record, Values};

const MSG_REQUIRED: &str = "Vui lòng không để trống trường này.";
const MSG_REQUIRED_CHOICE: &str = "Vui lòng thực hiện lựa chọn.";
const MSG_DATE_RANGE: &str = "Ngày chọn nằm ngoài khoảng cho phép.";
const MSG_BAD_DATE: &str = "Định dạng ngày không hợp lệ.";
const MSG_BAD_NUMBER: &str = "Vui lòng nhập một số.";
const MSG_BAD_CHOICE: &str = "Lựa chọn không hợp lệ.";
const MSG_BAD_SHAPE: &str = "Giá trị không hợp lệ.";

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

/// Regular expressions shared across the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedPattern {
    /// Uppercase Vietnamese letters and spaces.
    FullName,
    /// `0` followed by nine digits.
    Phone,
    Email,
    /// Nine-digit (old) or twelve-digit (chip) identity card number.
    IdNumber,
    Year,
    Numeric,
    MonthYear,
}

impl NamedPattern {
    pub fn regex(&self) -> &'static Regex {
        static FULL_NAME: OnceLock<Regex> = OnceLock::new();
        static PHONE: OnceLock<Regex> = OnceLock::new();
        static EMAIL: OnceLock<Regex> = OnceLock::new();
        static ID_NUMBER: OnceLock<Regex> = OnceLock::new();
        static YEAR: OnceLock<Regex> = OnceLock::new();
        static NUMERIC: OnceLock<Regex> = OnceLock::new();
        static MONTH_YEAR: OnceLock<Regex> = OnceLock::new();

        let (cell, source) = match self {
            NamedPattern::FullName => (
                &FULL_NAME,
                r"^[A-ZÀÁẠẢÃÂẦẤẬẨẪĂẰẮẶẲẴĐÈÉẸẺẼÊỀẾỆỂỄÌÍỊỈĨÒÓỌỎÕÔỒỐỘỔỖƠỜỚỢỞỠÙÚỤỦŨƯỪỨỰỬỮỲÝỴỶỸ ]+$",
            ),
            NamedPattern::Phone => (&PHONE, r"^0[0-9]{9}$"),
            NamedPattern::Email => (
                &EMAIL,
                r"^[a-zA-Z0-9_.+\-]+@[a-zA-Z0-9\-]+\.[a-zA-Z0-9.\-]+$",
            ),
            NamedPattern::IdNumber => (&ID_NUMBER, r"^(?:[0-9]{9}|[0-9]{12})$"),
            NamedPattern::Year => (&YEAR, r"^[0-9]{4}$"),
            NamedPattern::Numeric => (&NUMERIC, r"^[0-9]+$"),
            NamedPattern::MonthYear => (&MONTH_YEAR, r"^(?:0[1-9]|1[0-2])/[0-9]{4}$"),
        };
        cell.get_or_init(|| Regex::new(source).unwrap())
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

fn default_min_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or_default()
}

fn default_required_message() -> String {
    MSG_REQUIRED.to_string()
}

fn default_choice_message() -> String {
    MSG_REQUIRED_CHOICE.to_string()
}

fn default_range_message() -> String {
    MSG_DATE_RANGE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Rule {
    /// Not missing, not whitespace, not an empty row list.
    Required {
        #[serde(default = "default_required_message")]
        message: String,
    },
    /// A select/radio value was picked.
    RequiredChoice {
        #[serde(default = "default_choice_message")]
        message: String,
    },
    /// Non-empty text must match; empty text is left to `Required`.
    Pattern {
        pattern: NamedPattern,
        message: String,
    },
    /// At most `max` characters (not bytes).
    MaxLength { max: usize, message: String },
    /// Date within `[min, max]`; `max = None` means today.
    DateRange {
        #[serde(default = "default_min_date")]
        min: NaiveDate,
        #[serde(default)]
        max: Option<NaiveDate>,
        #[serde(default = "default_range_message")]
        message: String,
    },
    /// `MM/YYYY` strictly later than the `other` field of the same record.
    AfterField { other: FieldId, message: String },
}

impl Rule {
    pub fn required(message: &str) -> Self {
        Rule::Required {
            message: message.to_string(),
        }
    }

    pub fn required_choice(message: &str) -> Self {
        Rule::RequiredChoice {
            message: message.to_string(),
        }
    }

    pub fn pattern(pattern: NamedPattern, message: &str) -> Self {
        Rule::Pattern {
            pattern,
            message: message.to_string(),
        }
    }

    pub fn max_length(max: usize, message: &str) -> Self {
        Rule::MaxLength {
            max,
            message: message.to_string(),
        }
    }

    /// Dates from 1900-01-01 up to today.
    pub fn date_until_today() -> Self {
        Rule::DateRange {
            min: default_min_date(),
            max: None,
            message: default_range_message(),
        }
    }

    pub fn after(other: &str, message: &str) -> Self {
        Rule::AfterField {
            other: FieldId::from(other),
            message: message.to_string(),
        }
    }

    fn check(
        &self,
        cell: Cell<'_>,
        format: DateFormat,
        record: &Record,
        today: NaiveDate,
    ) -> Result<(), String> {
        match self {
            Rule::Required { message } | Rule::RequiredChoice { message } => {
                if cell.is_blank() {
                    return Err(message.clone());
                }
            }
            Rule::Pattern { pattern, message } => {
                if let Some(text) = cell.filled_text() {
                    if !pattern.regex().is_match(text.trim()) {
                        return Err(message.clone());
                    }
                }
            }
            Rule::MaxLength { max, message } => {
                if let Some(text) = cell.filled_text() {
                    if text.chars().count() > *max {
                        return Err(message.clone());
                    }
                }
            }
            Rule::DateRange { min, max, message } => {
                if let Some(text) = cell.filled_text() {
                    let date = parse_date(text.trim(), format).ok_or(MSG_BAD_DATE)?;
                    let max = max.unwrap_or(today);
                    if date < *min || date > max {
                        return Err(message.clone());
                    }
                }
            }
            Rule::AfterField { other, message } => {
                let (Some(to), Some(from)) = (cell.filled_text(), record.get(other.as_str()))
                else {
                    return Ok(());
                };
                // Malformed values are reported by the pattern rules.
                if let (Some(to), Some(from)) = (month_year(to), month_year(from)) {
                    if to <= from {
                        return Err(message.clone());
                    }
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Position of a failing cell inside a repeat group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRef {
    pub index: usize,
    pub column: FieldId,
}

/// A single violation: which field (and row cell) failed, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: FieldId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<RowRef>,
    pub message: String,
}

impl ValidationError {
    /// `field` or `field[index].column`.
    pub fn key(&self) -> String {
        match &self.row {
            Some(row) => format!("{}[{}].{}", self.field, row.index, row.column),
            None => self.field.to_string(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key(), self.message)
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Cell<'a> {
    Missing,
    Text(&'a str),
    Rows(usize),
}

impl<'a> Cell<'a> {
    fn from_value(value: Option<&'a FieldValue>) -> Self {
        match value {
            None => Cell::Missing,
            Some(FieldValue::Text(s)) => Cell::Text(s),
            Some(FieldValue::Rows(rows)) => Cell::Rows(rows.len()),
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Rows(n) => *n == 0,
        }
    }

    fn filled_text(&self) -> Option<&'a str> {
        match self {
            Cell::Text(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        }
    }
}

/// Applies schema rules to raw input.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    schema: &'a FieldSchema,
    today: NaiveDate,
}

impl<'a> Validator<'a> {
    pub fn new(schema: &'a FieldSchema, today: NaiveDate) -> Self {
        Validator { schema, today }
    }

    /// Validate one field in isolation. Cross-field rules only see the
    /// field itself, so they pass unless the field refers to itself.
    pub fn validate(
        &self,
        id: &str,
        raw: Option<&FieldValue>,
    ) -> Result<Vec<ValidationError>, FormError> {
        let mut values = Values::new();
        if let Some(raw) = raw {
            values.insert(FieldId::from(id), raw.clone());
        }
        self.validate_in(id, &values)
    }

    /// Validate one field against a (partial) session snapshot.
    pub fn validate_in(&self, id: &str, values: &Values) -> Result<Vec<ValidationError>, FormError> {
        let spec = self.schema.lookup(id)?;
        let record = text_record(values);
        self.check_field(spec, values.get(id), &record)
    }

    /// Validate every field a step collects, returning all violations.
    pub fn validate_step(
        &self,
        step: &Step,
        values: &Values,
    ) -> Result<Vec<ValidationError>, FormError> {
        let record = text_record(values);
        let mut violations = Vec::new();
        for id in step.field_ids() {
            let spec = self.schema.lookup(id.as_str())?;
            violations.extend(self.check_field(spec, values.get(id.as_str()), &record)?);
        }
        Ok(violations)
    }

    fn check_field(
        &self,
        spec: &FieldSpec,
        value: Option<&FieldValue>,
        record: &Record,
    ) -> Result<Vec<ValidationError>, FormError> {
        let invalid = |message: String| ValidationError {
            field: spec.id.clone(),
            row: None,
            message,
        };

        let shape_ok = match (&spec.kind, value) {
            (FieldKind::Group(_), Some(FieldValue::Text(_))) => false,
            (FieldKind::Group(_), _) => true,
            (_, Some(FieldValue::Rows(_))) => false,
            _ => true,
        };
        if !shape_ok {
            return Ok(vec![invalid(MSG_BAD_SHAPE.to_string())]);
        }

        if let Err(message) = self.check_cell(spec, Cell::from_value(value), record) {
            return Ok(vec![invalid(message)]);
        }

        let mut violations = Vec::new();
        if let (Some(group), Some(rows)) = (spec.group_spec(), value.and_then(FieldValue::as_rows)) {
            for (index, row) in rows.iter().enumerate() {
                for column in &group.row_fields {
                    let cell_spec = self.schema.lookup(column.as_str())?;
                    let cell = row.get(column.as_str()).map_or(Cell::Missing, |s| Cell::Text(s));
                    if let Err(message) = self.check_cell(cell_spec, cell, row) {
                        violations.push(ValidationError {
                            field: spec.id.clone(),
                            row: Some(RowRef {
                                index,
                                column: column.clone(),
                            }),
                            message,
                        });
                    }
                }
            }
        }
        Ok(violations)
    }

    /// Run the explicit rules in order, then the implicit kind check.
    /// Stops at the first failure.
    fn check_cell(&self, spec: &FieldSpec, cell: Cell<'_>, record: &Record) -> Result<(), String> {
        let format = match &spec.kind {
            FieldKind::Date { format } => *format,
            _ => DateFormat::Iso,
        };
        for rule in &spec.rules {
            rule.check(cell, format, record, self.today)?;
        }

        let Some(text) = cell.filled_text() else {
            return Ok(());
        };
        let text = text.trim();
        match &spec.kind {
            FieldKind::Date { format } if parse_date(text, *format).is_none() => {
                Err(MSG_BAD_DATE.to_string())
            }
            FieldKind::Number if text.parse::<f64>().is_err() => Err(MSG_BAD_NUMBER.to_string()),
            FieldKind::Enum { options } if !options.iter().any(|o| o == text) => {
                Err(MSG_BAD_CHOICE.to_string())
            }
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Date helpers
// ---------------------------------------------------------------------------

/// Parse `text` in the given storage format. Month-year dates resolve to the
/// first day of the month.
pub fn parse_date(text: &str, format: DateFormat) -> Option<NaiveDate> {
    match format {
        DateFormat::Iso => NaiveDate::parse_from_str(text, format.pattern()).ok(),
        DateFormat::MonthYear => {
            let (year, month) = month_year(text)?;
            NaiveDate::from_ymd_opt(year, month, 1)
        }
    }
}

/// `MM/YYYY` -> `(year, month)`, ordered for comparison.
fn month_year(text: &str) -> Option<(i32, u32)> {
    let (month, year) = text.trim().split_once('/')?;
    let month = month.trim().parse::<u32>().ok()?;
    let year = year.trim().parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some((date.year(), date.month()))
}

/// Split an ISO date into zero-padded `(day, month, year)` strings.
pub fn split_iso_date(text: &str) -> Option<(String, String, String)> {
    let date = parse_date(text.trim(), DateFormat::Iso)?;
    Some((
        date.format("%d").to_string(),
        date.format("%m").to_string(),
        date.format("%Y").to_string(),
    ))
}
