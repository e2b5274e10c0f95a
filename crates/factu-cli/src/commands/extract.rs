//! Extract command - pull invoice fields from a single document.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use tracing::{debug, info};

use factu_core::invoice::rules::{format_amount, format_cuit};
use factu_core::models::config::FactuConfig;
use factu_core::models::invoice::{InvoiceExtract, RolePreference};
use factu_core::{Document, Pipeline};

use super::{force_offline, load_config};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input file (text, PDF or image) or document URL
    #[arg(required = true)]
    input: String,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Party the business name resolves to (issuer or recipient)
    #[arg(long)]
    role: Option<RolePreference>,

    /// Show confidence, review flag and provider
    #[arg(long)]
    show_confidence: bool,

    /// Use only local providers
    #[arg(long)]
    offline: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if args.offline {
        force_offline(&mut config);
    }

    let document = open_document(&args.input, &config)?;
    info!("Processing {}", document.reference());

    let pipeline = Pipeline::from_config(&config)?;
    let role = args.role.unwrap_or(config.extraction.role_preference);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.set_message("Extracting invoice data...");
    pb.enable_steady_tick(Duration::from_millis(120));

    let record = pipeline.extract_with_role(&document, role).await;

    pb.finish_and_clear();

    let output = format_record(&record, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        print_confidence(&record);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Resolve the input argument to a document.
pub fn open_document(input: &str, config: &FactuConfig) -> anyhow::Result<Document> {
    if ["http://", "https://", "data:"]
        .iter()
        .any(|scheme| input.starts_with(scheme))
    {
        return Ok(Document::url(input));
    }

    let path = Path::new(input);
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }
    Ok(Document::from_path(path, &config.pdf)?)
}

fn print_confidence(record: &InvoiceExtract) {
    println!();
    println!(
        "{} Extraction confidence: {:.1}%",
        style("ℹ").blue(),
        record.confidence * 100.0
    );
    println!(
        "{} Provider: {}",
        style("ℹ").blue(),
        record.audit.final_provider.as_deref().unwrap_or("none")
    );
    if record.needs_review {
        println!("{} Needs review", style("!").yellow());
    } else {
        println!("{} Ready", style("✓").green());
    }
    for error in &record.audit.error_logs {
        println!("  - {}", style(error).dim());
    }
}

pub fn format_record(record: &InvoiceExtract, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(record)?),
        OutputFormat::Csv => format_csv(record),
        OutputFormat::Text => Ok(format_text(record)),
    }
}

fn opt_text<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

fn format_csv(record: &InvoiceExtract) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "document_id",
        "type_letter",
        "point_of_sale",
        "invoice_number",
        "issue_date",
        "due_date",
        "supplier_name",
        "supplier_tax_id",
        "customer_name",
        "customer_tax_id",
        "net",
        "taxes",
        "total",
        "currency",
        "cae",
        "confidence",
        "needs_review",
    ])?;

    let taxes = if record.amounts.taxes.is_empty() {
        String::new()
    } else {
        opt_text(&record.amounts.tax_sum())
    };

    wtr.write_record([
        &opt_text(&record.document_id),
        &opt_text(&record.type_letter),
        &opt_text(&record.point_of_sale),
        &opt_text(&record.invoice_number),
        &opt_text(&record.issue_date),
        &opt_text(&record.due_date),
        &opt_text(&record.supplier.name),
        &opt_text(&record.supplier.tax_id),
        &opt_text(&record.customer.name),
        &opt_text(&record.customer.tax_id),
        &opt_text(&record.amounts.net),
        &taxes,
        &opt_text(&record.amounts.total),
        &record.amounts.currency_code,
        &opt_text(&record.authorization.number),
        &format!("{:.2}", record.confidence),
        &record.needs_review.to_string(),
    ])?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

pub fn format_text(record: &InvoiceExtract) -> String {
    let mut output = String::new();
    let currency = &record.amounts.currency_code;

    output.push_str(&format!(
        "Invoice: {}\n",
        record.document_id.as_deref().unwrap_or("(unknown)")
    ));
    if let Some(date) = record.issue_date {
        output.push_str(&format!("Date: {}\n", date));
    }
    output.push('\n');

    output.push_str("Supplier:\n");
    output.push_str(&format!(
        "  {}\n",
        record.supplier.name.as_deref().unwrap_or("(unknown)")
    ));
    if let Some(tax_id) = &record.supplier.tax_id {
        output.push_str(&format!("  CUIT: {}\n", format_cuit(tax_id)));
    }

    if record.customer.name.is_some() || record.customer.tax_id.is_some() {
        output.push_str("\nCustomer:\n");
        if let Some(name) = &record.customer.name {
            output.push_str(&format!("  {}\n", name));
        }
        if let Some(tax_id) = &record.customer.tax_id {
            output.push_str(&format!("  CUIT: {}\n", format_cuit(tax_id)));
        }
    }

    output.push_str("\nAmounts:\n");
    if let Some(net) = record.amounts.net {
        output.push_str(&format!("  Net:   {} {}\n", format_amount(net), currency));
    }
    for tax in &record.amounts.taxes {
        output.push_str(&format!(
            "  {} {}%: {} {}\n",
            tax.kind,
            (tax.rate * Decimal::ONE_HUNDRED).normalize(),
            format_amount(tax.amount),
            currency
        ));
    }
    match record.amounts.total {
        Some(total) => output.push_str(&format!("  Total: {} {}\n", format_amount(total), currency)),
        None => output.push_str("  Total: (unknown)\n"),
    }
    if record.amounts.estimated {
        output.push_str("  (net and tax estimated from the total)\n");
    }

    if let Some(due_date) = record.due_date {
        output.push_str(&format!("\nPayment due: {}\n", due_date));
    }
    if let Some(cae) = &record.authorization.number {
        output.push_str(&format!("CAE: {}", cae));
        if let Some(due) = record.authorization.due_date {
            output.push_str(&format!(" (valid until {})", due));
        }
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use factu_core::models::invoice::TypeLetter;

    #[test]
    fn test_open_document_url() {
        let config = FactuConfig::default();
        let doc = open_document("https://example.com/f.png", &config).unwrap();
        assert_eq!(doc, Document::url("https://example.com/f.png"));
    }

    #[test]
    fn test_open_document_missing_file() {
        let config = FactuConfig::default();
        assert!(open_document("/nonexistent/factura.pdf", &config).is_err());
    }

    #[test]
    fn test_csv_has_header_and_row() {
        let mut record = InvoiceExtract::new("memo.txt");
        record.type_letter = Some(TypeLetter::B);
        let csv = format_csv(&record).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("document_id,type_letter"));
        assert!(lines[1].starts_with(",B,"));
    }
}
