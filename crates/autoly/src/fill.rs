use std::collections::BTreeSet;
use std::path::PathBuf;

use autoly_core::{Advance, FieldId, Sequencer, SessionState, ValidationError, Values};

use crate::config::Context;
use crate::prelude::{eprintln, println, *};

#[derive(Debug, clap::Args)]
pub struct FillOptions {
    /// Template name (see `autoly templates`)
    pub template: String,

    /// JSON object mapping field ids to answers; repeat groups take a list
    /// of row objects
    #[arg(short, long)]
    pub answers: PathBuf,

    /// Where to write the filled PDF
    #[arg(short, long)]
    pub output: PathBuf,
}

/// How far a set of answers got through a template.
#[derive(Debug)]
pub enum Outcome {
    Complete(SessionState),
    Blocked {
        step: String,
        violations: Vec<ValidationError>,
    },
}

pub fn run(options: FillOptions, global: crate::Global) -> Result<()> {
    let context = Context::load(&global)?;
    let sequencer = Sequencer::new(
        &context.catalog,
        &options.template,
        chrono::Local::now().date_naive(),
    )?;

    let text = std::fs::read_to_string(&options.answers)
        .wrap_err_with(|| format!("Failed to read {}", options.answers.display()))?;
    let answers: Values =
        serde_json::from_str(&text).map_err(|e| Error::Answers(e.to_string()))?;

    let state = match drive(&sequencer, &answers)? {
        Outcome::Complete(state) => state,
        Outcome::Blocked { step, violations } => {
            let mut table = new_table();
            table.add_row(prettytable::row!["Field", "Problem"]);
            for violation in &violations {
                table.add_row(prettytable::row![violation.key(), violation.message]);
            }
            eprintln!("Step {step} has problems:");
            table.printstd();
            return Err(Error::Blocked {
                step,
                count: violations.len(),
            }
            .into());
        }
    };

    let request = sequencer.build_render_request(&state)?;
    let rendered = context.renderer.render(&request)?;
    for warning in &rendered.warnings {
        eprintln!("warning: {warning}");
    }

    std::fs::write(&options.output, &rendered.bytes)
        .wrap_err_with(|| format!("Failed to write {}", options.output.display()))?;

    if global.verbose {
        eprintln!("{} field(s) filled", state.values.len());
    }
    println!(
        "Wrote {} ({} bytes)",
        options.output.display(),
        rendered.bytes.len()
    );

    Ok(())
}

/// Walk a fresh session through every step, entering whatever `answers`
/// holds for each one. Stops at the first step that does not validate.
pub fn drive(sequencer: &Sequencer<'_>, answers: &Values) -> Result<Outcome> {
    let mut state = sequencer.start();
    let mut used: BTreeSet<&FieldId> = BTreeSet::new();

    while !state.is_complete() {
        let step = sequencer.current_step(&state)?;
        for id in step.field_ids() {
            if let Some((key, value)) = answers.get_key_value(id.as_str()) {
                sequencer.set_value(&mut state, id.as_str(), value.clone())?;
                used.insert(key);
            }
        }

        if let Advance::Blocked(violations) = sequencer.advance(&mut state)? {
            return Ok(Outcome::Blocked {
                step: step.name.clone(),
                violations,
            });
        }
    }

    for key in answers.keys().filter(|key| !used.contains(key)) {
        log::warn!("answer {key} is not collected by {}", state.template);
    }

    Ok(Outcome::Complete(state))
}
