use anyhow::{bail, Context, Result};
use clap::Parser;
use dcdoc::config::{load_config, RunConfig};
use dcdoc::csv_export::CsvExport;
use dcdoc::error::ConfigError;
use dcdoc::inventory::{Inventory, InventoryOptions};
use dcdoc::mac_mappings;
use dcdoc::report::render_summary;
use dcdoc::scenarios::{run_job, run_scenarios, ReportJob};
use dcdoc::templates::Templates;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, OutputFormat};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let file_config = match &cli.config {
        Some(path) => Some(load_config(path)?),
        None => None,
    };
    let config = RunConfig::resolve(file_config, cli.overrides())?;
    for path in [&cli.input.scenarios, &cli.input.input].into_iter().flatten() {
        if !path.is_file() {
            return Err(ConfigError::NotAFile(path.clone()).into());
        }
    }

    mac_mappings::install(config.mappings.as_deref());
    let templates =
        Templates::load(&config.templates_path, config.templates.clone()).context("failed to load templates")?;

    let mut inventory = Inventory::new(InventoryOptions {
        oma_uri_dir: config.generate.oma_uri.clone(),
    });
    let loaded = inventory.load(&config.paths);
    if loaded == 0 {
        tracing::warn!(event = "Load", "no policy files found");
    }

    match cli.format {
        OutputFormat::Csv => run_csv(&inventory, &config),
        OutputFormat::Text => run_text(&cli, &inventory, &config, &templates),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_csv(inventory: &Inventory, config: &RunConfig) -> Result<()> {
    let written = CsvExport::from_inventory(inventory)
        .write(&config.dest)
        .with_context(|| format!("failed to write csv files to {}", config.dest.display()))?;
    println!("wrote {} csv files to {}", written.len(), config.dest.display());
    Ok(())
}

fn run_text(cli: &Cli, inventory: &Inventory, config: &RunConfig, templates: &Templates) -> Result<()> {
    if let Some(scenarios) = &cli.input.scenarios {
        let (reports, readme) = run_scenarios(inventory, scenarios, config, templates)
            .with_context(|| format!("failed to process scenarios {}", scenarios.display()))?;
        for report in &reports {
            println!("{}", render_summary(&report.title, &report.result, &report.path));
        }
        println!("readme -> {}", readme.display());
        return Ok(());
    }

    let job = match (&cli.input.input, &cli.input.query) {
        (Some(input), _) => {
            let mut job = ReportJob::for_input(input);
            if let Some(title) = &config.title {
                job.title = title.clone();
            }
            if let Some(output) = &cli.output {
                job.out_file = output.clone();
            }
            job
        }
        (None, Some(query)) => ReportJob::for_query(query, config.title.clone(), cli.output.clone()),
        (None, None) => ReportJob::for_query("*", config.title.clone(), cli.output.clone()),
    };
    if job.out_file.trim().is_empty() {
        bail!("output file name is empty");
    }

    let report = run_job(inventory, &job, config, templates)
        .with_context(|| format!("failed to write report {}", job.out_file))?;
    println!("{}", render_summary(&report.title, &report.result, &report.path));
    Ok(())
}
