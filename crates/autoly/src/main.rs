use crate::prelude::*;
use clap::Parser;
use std::path::PathBuf;

mod catalog;
mod check;
mod config;
mod error;
mod fill;
mod prelude;
mod probe;
mod serve;
mod templates;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Fill Vietnamese government PDF forms, such as the personal history (Sơ yếu lý lịch), from step-by-step answers"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// TOML settings file
    #[clap(long, env = "AUTOLY_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Directory holding the blank PDF templates
    #[clap(long, env = "AUTOLY_TEMPLATE_DIR", global = true)]
    template_dir: Option<PathBuf>,

    /// TrueType font used for the filled text
    #[clap(long, env = "AUTOLY_FONT", global = true)]
    font: Option<PathBuf>,

    /// Catalog TOML file replacing the built-in fields and templates
    #[clap(long, env = "AUTOLY_CATALOG", global = true)]
    catalog: Option<PathBuf>,

    /// Whether to display additional information.
    #[clap(long, env = "AUTOLY_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// List the registered templates
    Templates(crate::templates::TemplatesOptions),

    /// Show the steps of a template and the fields each one collects
    Steps(crate::templates::StepsOptions),

    /// Fill a template from a JSON answers file
    Fill(crate::fill::FillOptions),

    /// Verify every placement of a template lands on its PDF page
    Check(crate::check::CheckOptions),

    /// List text spans of a PDF with their coordinates
    Probe(crate::probe::ProbeOptions),

    /// Serve the form session HTTP API
    Serve(crate::serve::ServeOptions),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Templates(options) => crate::templates::run_templates(options, app.global),
        SubCommands::Steps(options) => crate::templates::run_steps(options, app.global),
        SubCommands::Fill(options) => crate::fill::run(options, app.global),
        SubCommands::Check(options) => crate::check::run(options, app.global),
        SubCommands::Probe(options) => crate::probe::run(options, app.global),
        SubCommands::Serve(options) => crate::serve::run(options, app.global).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
