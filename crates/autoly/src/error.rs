//! Errors raised by the command line front end.

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid answers file: {0}")]
    Answers(String),

    #[error("Invalid point {0:?}, expected X,Y")]
    Point(String),

    #[error("Session stopped at step {step}: {count} violation(s)")]
    Blocked { step: String, count: usize },

    #[error("Font size {0} is outside 6..=36 points")]
    FontSize(f32),

    #[error("Template {template} has {count} placement(s) outside the page")]
    OutOfBounds { template: String, count: usize },
}
