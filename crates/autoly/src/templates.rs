use autoly_core::{Catalog, FieldKind, Step};

use crate::config::{self, Config};
use crate::prelude::{println, *};

#[derive(Debug, clap::Args)]
pub struct TemplatesOptions {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, clap::Args)]
pub struct StepsOptions {
    /// Template name (see `autoly templates`)
    pub template: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run_templates(options: TemplatesOptions, global: crate::Global) -> Result<()> {
    let catalog = &config::load_catalog(&Config::resolve(&global)?)?;

    if options.json {
        let blueprints: Vec<_> = catalog.registry.iter().collect();
        println!("{}", serde_json::to_string_pretty(&blueprints)?);
        return Ok(());
    }

    let mut table = new_table();
    table.add_row(prettytable::row!["Name", "Title", "Form code", "Steps", "Template"]);
    for blueprint in catalog.registry.iter() {
        table.add_row(prettytable::row![
            blueprint.name,
            blueprint.title,
            blueprint.gov_form_code.as_deref().unwrap_or("-"),
            blueprint.steps.len(),
            blueprint.template_file
        ]);
    }
    table.printstd();

    Ok(())
}

pub fn run_steps(options: StepsOptions, global: crate::Global) -> Result<()> {
    let catalog = config::load_catalog(&Config::resolve(&global)?)?;
    let steps = catalog.steps_for(&options.template)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&steps)?);
        return Ok(());
    }

    for (index, step) in steps.iter().enumerate() {
        println!("{}. {} ({})", index + 1, step.title, step.name);
        if !step.subtitle.is_empty() {
            println!("   {}", step.subtitle);
        }
        let mut table = new_table();
        for (id, label, kind) in step_fields(&catalog, step)? {
            table.add_row(prettytable::row![id, label, kind]);
        }
        table.printstd();
        println!();
    }

    Ok(())
}

/// `(id, label, kind)` of every field a step collects.
fn step_fields(catalog: &Catalog, step: &Step) -> Result<Vec<(String, String, String)>> {
    step.field_ids()
        .map(|id| -> Result<(String, String, String)> {
            let spec = catalog.schema.lookup(id.as_str())?;
            Ok((id.to_string(), spec.label.clone(), kind_name(&spec.kind)))
        })
        .collect()
}

fn kind_name(kind: &FieldKind) -> String {
    match kind {
        FieldKind::Text => "text".to_string(),
        FieldKind::Number => "number".to_string(),
        FieldKind::Date { format } => format!("date ({})", format.pattern()),
        FieldKind::Enum { options } => format!("one of {} options", options.len()),
        FieldKind::Group(group) => format!(
            "rows of {} (up to {})",
            group
                .row_fields
                .iter()
                .map(|f| f.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            group.capacity
        ),
    }
}
