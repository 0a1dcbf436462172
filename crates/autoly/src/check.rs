use autoly_core::Catalog;
use pdf::{RenderError, Renderer};

use crate::config::Context;
use crate::prelude::{println, *};

#[derive(Debug, clap::Args)]
pub struct CheckOptions {
    /// Template name; every registered template when omitted
    pub template: Option<String>,
}

pub fn run(options: CheckOptions, global: crate::Global) -> Result<()> {
    let context = Context::load(&global)?;
    let names: Vec<String> = match options.template {
        Some(name) => vec![name],
        None => context.catalog.registry.names().map(str::to_string).collect(),
    };

    let mut failures = Vec::new();
    for name in &names {
        let problems = check_template(&context.catalog, &context.renderer, name)?;
        if problems.is_empty() {
            println!("{name}: ok");
            continue;
        }

        println!("{name}: {} placement(s) outside the page", problems.len());
        for problem in &problems {
            println!("  {problem}");
        }
        if global.verbose {
            let blueprint = context.catalog.blueprint(name)?;
            println!(
                "  template file: {}",
                context.renderer.template_path(&blueprint.template_file).display()
            );
        }
        failures.push((name.clone(), problems.len()));
    }

    match failures.as_slice() {
        [] => Ok(()),
        [(template, count)] => Err(Error::OutOfBounds {
            template: template.clone(),
            count: *count,
        }
        .into()),
        many => Err(eyre!("{} template(s) failed the placement check", many.len())),
    }
}

/// Every probe point of `template` that does not land on its page.
pub fn check_template(
    catalog: &Catalog,
    renderer: &Renderer,
    template: &str,
) -> Result<Vec<RenderError>> {
    let blueprint = catalog.blueprint(template)?;
    let fields = blueprint.field_specs(&catalog.schema)?;
    Ok(renderer.check(&blueprint.template_file, &fields)?)
}
