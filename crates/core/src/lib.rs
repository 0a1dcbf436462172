//! Core library for autoly
//!
//! This crate implements the **Functional Core** of autoly, following the
//! Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! autoly fills fixed-layout government PDF forms from input collected
//! step by step. The workspace is split so that every decision about *what*
//! goes on the page is made here, without I/O:
//!
//! - **`autoly_core`** (this crate): schema, validation, blueprints, the step
//!   sequencer and layout planning
//! - **`pdf`**: loads the template and draws the planned text
//! - **`autoly`**: CLI and HTTP shell (the Imperative Shell)
//!
//! ## Functional Core Principles
//!
//! - **Pure functions**: the clock is injected (`today`), nothing reads the
//!   environment
//! - **Data, not closures**: validation rules and placements are serde types
//!   so a catalog can be declared in code or loaded from TOML
//! - **Invalid input is a value**: validators return [`ValidationError`]s;
//!   `Err` is reserved for configuration mistakes and illegal transitions
//!
//! # Module Organization
//!
//! - [`schema`]: field table ([`FieldSpec`], [`FieldKind`], [`Placement`])
//! - [`validation`]: [`Rule`]s and the [`Validator`]
//! - [`blueprint`]: [`Step`]s, [`Blueprint`]s, the [`TemplateRegistry`] and [`Catalog`]
//! - [`session`]: [`SessionState`] and the [`Sequencer`] state machine
//! - [`layout`]: [`RenderRequest`] to positioned [`Stamp`]s
//! - [`builtin`]: the Sơ yếu lý lịch catalog
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use autoly_core::{Catalog, FieldValue, Sequencer};
//!
//! let catalog = Catalog::builtin()?;
//! let seq = Sequencer::new(&catalog, "so-yeu-ly-lich", today)?;
//! let mut state = seq.start();
//! seq.set_value(&mut state, "full_name", FieldValue::text("NGUYỄN VĂN A"))?;
//! match seq.advance(&mut state)? {
//!     Advance::Moved(cursor) => println!("now at {cursor:?}"),
//!     Advance::Blocked(violations) => println!("{} problem(s)", violations.len()),
//! }
//! ```

pub mod blueprint;
pub mod builtin;
pub mod error;
pub mod layout;
pub mod options;
pub mod schema;
pub mod session;
pub mod validation;
pub mod value;

pub use blueprint::{Blueprint, Catalog, Step, TemplateRegistry};
pub use error::FormError;
pub use layout::{
    plan, probe_stamps, LayoutDefaults, LayoutPlan, LayoutWarning, RenderRequest, Stamp,
    MIN_FONT_SIZE,
};
pub use schema::{
    ColumnSource, DateFormat, FieldKind, FieldSchema, FieldSpec, GroupColumn, GroupSpec,
    Placement,
};
pub use session::{Advance, Cursor, Sequencer, SessionState};
pub use validation::{NamedPattern, Rule, RowRef, ValidationError, Validator};
pub use value::{FieldId, FieldValue, Record, Values};
