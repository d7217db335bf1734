//! Pipeline entry point.

use clap::Parser;
use sales_forecast::config::PipelineConfig;
use sales_forecast::error::Result;
use sales_forecast::logging;
use sales_forecast::pipeline::Pipeline;
use std::path::PathBuf;
use tracing::info;

/// Clean weekly regional sales data and produce national and regional
/// forecasts for every configured country
#[derive(Debug, Parser)]
#[command(name = "sales-forecast", version)]
struct Cli {
    /// Path to the YAML pipeline configuration
    #[arg(long, default_value = "configs/config.yaml")]
    config: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = PipelineConfig::from_yaml(&cli.config)?;
    let log = logging::init(&config.log_dir)?;
    info!(
        config = %cli.config.display(),
        log_file = %log.path().display(),
        countries = config.countries.len(),
        "configuration loaded"
    );

    Pipeline::new(config).run()
}
