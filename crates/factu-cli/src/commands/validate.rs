//! Validate command - re-run the review gate over a saved record.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::debug;

use factu_core::models::invoice::InvoiceExtract;
use factu_core::ReviewGate;

use super::extract::{format_record, OutputFormat};
use super::load_config;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// JSON record produced by `factu extract`
    #[arg(required = true)]
    input: PathBuf,

    /// Write the normalized record here (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Exit with an error when the record needs review
    #[arg(long)]
    strict: bool,
}

pub fn run(args: ValidateArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    let content = fs::read_to_string(&args.input)?;
    let record: InvoiceExtract = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("{} is not an invoice record: {}", args.input.display(), e))?;

    let gate = ReviewGate::from_config(&config.extraction);
    let record = gate.validate(record);
    let issues = gate.issues(&record);
    debug!("{} review issues", issues.len());

    if !issues.is_empty() {
        eprintln!("{}", style("Review issues:").yellow());
        for issue in &issues {
            eprintln!("  - {}", issue);
        }
    }

    let output = format_record(&record, args.format)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.strict && record.needs_review {
        anyhow::bail!("Record needs review");
    }

    Ok(())
}
