//! Step sequencer: the state machine that walks a session through a
//! blueprint's steps.
//!
//! [`SessionState`] is plain owned data so the shell can store or serialize
//! it however it likes. All transitions go through a [`Sequencer`], which
//! borrows the read-only [`Catalog`] and the session's [`Blueprint`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::blueprint::{Blueprint, Catalog, Step};
use crate::error::FormError;
use crate::layout::RenderRequest;
use crate::validation::{ValidationError, Validator};
use crate::value::{FieldId, FieldValue, Values};

/// Where a session is. `Step(i)` always indexes into the blueprint's steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum Cursor {
    Step(usize),
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub template: String,
    pub cursor: Cursor,
    #[serde(default)]
    pub values: Values,
}

impl SessionState {
    pub fn is_complete(&self) -> bool {
        self.cursor == Cursor::Complete
    }
}

/// Result of trying to leave the current step.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Moved(Cursor),
    /// The step has violations; the cursor did not move.
    Blocked(Vec<ValidationError>),
}

pub struct Sequencer<'a> {
    catalog: &'a Catalog,
    blueprint: &'a Blueprint,
    today: NaiveDate,
}

impl<'a> Sequencer<'a> {
    pub fn new(catalog: &'a Catalog, template: &str, today: NaiveDate) -> Result<Self, FormError> {
        Ok(Sequencer {
            catalog,
            blueprint: catalog.blueprint(template)?,
            today,
        })
    }

    /// Sequencer for the template an existing session was started with.
    pub fn for_session(
        catalog: &'a Catalog,
        state: &SessionState,
        today: NaiveDate,
    ) -> Result<Self, FormError> {
        Self::new(catalog, &state.template, today)
    }

    pub fn blueprint(&self) -> &'a Blueprint {
        self.blueprint
    }

    /// A fresh session at the first step, or already complete when the
    /// blueprint has no steps.
    pub fn start(&self) -> SessionState {
        let cursor = if self.blueprint.steps.is_empty() {
            Cursor::Complete
        } else {
            Cursor::Step(0)
        };
        SessionState {
            template: self.blueprint.name.clone(),
            cursor,
            values: Values::new(),
        }
    }

    pub fn current_step(&self, state: &SessionState) -> Result<&'a Step, FormError> {
        match state.cursor {
            Cursor::Step(i) => self.blueprint.steps.get(i).ok_or(FormError::SessionComplete),
            Cursor::Complete => Err(FormError::SessionComplete),
        }
    }

    /// Store a value for a field of the current step. Values for other
    /// steps are kept untouched.
    pub fn set_value(
        &self,
        state: &mut SessionState,
        id: &str,
        value: FieldValue,
    ) -> Result<(), FormError> {
        let step = self.current_step(state)?;
        let spec = self.catalog.schema.lookup(id)?;
        if !step.collects(id) {
            return Err(FormError::FieldNotInStep {
                field: id.to_string(),
                step: step.name.clone(),
            });
        }

        match (spec.kind.is_group(), &value) {
            (true, FieldValue::Text(_)) => {
                return Err(FormError::WrongValueShape {
                    field: id.to_string(),
                    expected: "a list of rows",
                })
            }
            (false, FieldValue::Rows(_)) => {
                return Err(FormError::WrongValueShape {
                    field: id.to_string(),
                    expected: "text",
                })
            }
            _ => {}
        }

        state.values.insert(FieldId::from(id), value);
        Ok(())
    }

    /// Validate the current step and move forward if it is clean.
    pub fn advance(&self, state: &mut SessionState) -> Result<Advance, FormError> {
        let step = self.current_step(state)?;
        let violations = self.validator().validate_step(step, &state.values)?;
        if !violations.is_empty() {
            log::debug!(
                "step {} blocked with {} violation(s)",
                step.name,
                violations.len()
            );
            return Ok(Advance::Blocked(violations));
        }

        let next = match state.cursor {
            Cursor::Step(i) if i + 1 < self.blueprint.steps.len() => Cursor::Step(i + 1),
            _ => Cursor::Complete,
        };
        state.cursor = next;
        Ok(Advance::Moved(next))
    }

    /// Go back one step. The first step is a floor, not an error.
    pub fn retreat(&self, state: &mut SessionState) -> Result<Cursor, FormError> {
        let Cursor::Step(i) = state.cursor else {
            return Err(FormError::SessionComplete);
        };
        state.cursor = Cursor::Step(i.saturating_sub(1));
        Ok(state.cursor)
    }

    /// Snapshot a finished session for rendering. Every step is validated
    /// again so a request can never carry invalid data.
    pub fn build_render_request(&self, state: &SessionState) -> Result<RenderRequest, FormError> {
        if !state.is_complete() {
            return Err(FormError::NotComplete);
        }

        let validator = self.validator();
        let mut violations = Vec::new();
        for step in &self.blueprint.steps {
            violations.extend(validator.validate_step(step, &state.values)?);
        }
        if !violations.is_empty() {
            return Err(FormError::Invalid(violations));
        }

        Ok(RenderRequest {
            template: self.blueprint.name.clone(),
            template_file: self.blueprint.template_file.clone(),
            values: state.values.clone(),
            fields: self.blueprint.field_specs(&self.catalog.schema)?,
        })
    }

    fn validator(&self) -> Validator<'a> {
        Validator::new(&self.catalog.schema, self.today)
    }
}
