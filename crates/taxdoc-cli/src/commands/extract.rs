//! Extract command - run documents through normalization and field extraction.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use taxdoc_core::layout::SUPPORTED_EXTENSIONS;
use taxdoc_core::{
    BatchFailure, DocumentNormalizer, DocumentType, EngineOptions, ExtractedDataset,
    FieldExtractor, FieldRequest, InputFormat, NativeLayoutEngine, OllamaClient, Pipeline,
    RecordPolicy, Upload,
};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input files or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Document type (W-2, 1099-INT, 1099-DIV, 1099-MISC, 1099-NEC, UK-PAYE-Payslip, UK-P60, UK-P45, Custom)
    #[arg(short = 't', long = "doc-type", default_value = "W-2")]
    doc_type: DocumentType,

    /// Extract only these default fields (comma-separated)
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,

    /// Additional field to extract (repeatable)
    #[arg(long = "field")]
    fields: Vec<String>,

    /// Output file (default: stdout; required for xlsx)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Print totals of numeric columns
    #[arg(long)]
    summary: bool,

    /// Documents processed concurrently
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Language model to use
    #[arg(long)]
    model: Option<String>,

    /// Skip OCR and use only PDF text layers
    #[arg(long)]
    no_ocr: bool,

    /// OCR model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON array of records
    Json,
    /// CSV with one row per document
    Csv,
    /// Plain text listing
    Text,
    /// Excel workbook with one row per document
    Xlsx,
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    if matches!(args.format, OutputFormat::Xlsx) && args.output.is_none() {
        anyhow::bail!("xlsx output is binary; name a file with -o/--output");
    }

    let mut config = super::load_config(config_path)?;
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }
    if let Some(dir) = &args.model_dir {
        config.engine.model_dir = dir.clone();
    }
    if args.no_ocr {
        config.engine.ocr_enabled = false;
    }
    let jobs = args.jobs.unwrap_or(config.batch.jobs);

    let request = build_request(&args)?;
    let files = expand_inputs(&args.inputs)?;

    eprintln!(
        "{} Extracting {} fields from {} files as {}",
        style("ℹ").blue(),
        request.field_names().len(),
        files.len(),
        style(request.document_type()).cyan()
    );

    let mut uploads = Vec::with_capacity(files.len());
    let mut read_failures = Vec::new();
    for path in &files {
        match Upload::from_path(path) {
            Ok(upload) => uploads.push(upload),
            Err(e) => read_failures.push(BatchFailure {
                filename: path.display().to_string(),
                error: e.to_string(),
            }),
        }
    }

    let engine = NativeLayoutEngine::new(&config.engine).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load OCR models: {}. Run 'taxdoc models status' or pass --no-ocr.",
            e
        )
    })?;
    let client = OllamaClient::new(config.llm.clone())?;
    if !client.is_available().await {
        anyhow::bail!(
            "Language model runtime not reachable at {}",
            config.llm.endpoint
        );
    }

    let pipeline = Pipeline::new(
        DocumentNormalizer::new(engine, EngineOptions::from(&config.engine)),
        FieldExtractor::new(client).with_max_text_chars(config.extraction.max_text_chars),
        RecordPolicy::from(&config.extraction),
    );

    let pb = ProgressBar::new(uploads.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let mut dataset = ExtractedDataset::new();
    let mut report = pipeline
        .run_batch(&uploads, &request, &mut dataset, jobs, |name, _| {
            pb.set_message(name.to_string());
            pb.inc(1);
        })
        .await;
    pb.finish_and_clear();
    report.failures.extend(read_failures);

    let content = render(&dataset, args.format)?;
    match &args.output {
        Some(path) => {
            fs::write(path, &content)?;
            debug!("Wrote output to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&content)?;
            stdout.flush()?;
        }
    }

    if args.summary {
        print_summary(&dataset);
    }

    eprintln!();
    eprintln!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        files.len(),
        start.elapsed()
    );
    eprintln!(
        "   {} extracted, {} unparsed, {} failed",
        style(report.succeeded).green(),
        style(report.unparsed).yellow(),
        style(report.failures.len()).red()
    );

    if !report.failures.is_empty() {
        eprintln!();
        eprintln!("{}", style("Failed files:").red());
        for failure in &report.failures {
            eprintln!("  - {}: {}", failure.filename, failure.error);
        }
    }

    if report.succeeded == 0 {
        anyhow::bail!("No documents could be processed");
    }

    Ok(())
}

/// Field list from the type defaults, narrowed by `--only` and extended by `--field`.
fn build_request(args: &ExtractArgs) -> anyhow::Result<FieldRequest> {
    let defaults = args.doc_type.default_fields();

    let base: Vec<String> = if args.only.is_empty() {
        defaults.iter().map(|f| f.to_string()).collect()
    } else {
        for name in &args.only {
            if !defaults.contains(&name.trim()) {
                warn!("{} is not a default field of {}", name, args.doc_type);
            }
        }
        args.only.clone()
    };

    FieldRequest::new(args.doc_type.label(), base.iter().chain(args.fields.iter())).map_err(|e| {
        anyhow::anyhow!("{}. Use --field to name the fields to extract.", e)
    })
}

/// Expand globs and keep files with a supported extension.
fn expand_inputs(inputs: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        let matches: Vec<PathBuf> = glob(input)?.filter_map(|r| r.ok()).collect();
        if matches.is_empty() {
            warn!("No files match {}", input);
        }

        for path in matches {
            if !path.is_file() {
                continue;
            }
            if !InputFormat::is_supported(&path) {
                warn!("Skipping unsupported file {}", path.display());
                continue;
            }
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }

    if files.is_empty() {
        anyhow::bail!(
            "No supported input files found (accepted: {})",
            SUPPORTED_EXTENSIONS.join(", ")
        );
    }

    Ok(files)
}

fn render(dataset: &ExtractedDataset, format: OutputFormat) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        OutputFormat::Json => {
            buf.extend(dataset.to_json()?.into_bytes());
            buf.push(b'\n');
        }
        OutputFormat::Csv => dataset.write_csv(&mut buf)?,
        OutputFormat::Text => buf.extend(format_text(dataset).into_bytes()),
        OutputFormat::Xlsx => dataset.write_xlsx(&mut buf)?,
    }
    Ok(buf)
}

fn format_text(dataset: &ExtractedDataset) -> String {
    let mut output = String::new();

    for record in dataset.records() {
        output.push_str(&format!(
            "{} ({})\n",
            record.source_file().unwrap_or("-"),
            record.document_type().unwrap_or("-")
        ));

        match record.fields() {
            Some(fields) => {
                let width = fields.keys().map(str::len).max().unwrap_or(0);
                for (key, value) in fields.iter() {
                    output.push_str(&format!(
                        "  {:<width$}  {}\n",
                        key,
                        value.unwrap_or("-"),
                        width = width
                    ));
                }
            }
            None => {
                output.push_str(&format!("  error: {}\n", record.error().unwrap_or_default()));
                output.push_str(&format!("  raw:   {}\n", record.raw().unwrap_or_default()));
            }
        }
        output.push('\n');
    }

    output
}

fn print_summary(dataset: &ExtractedDataset) {
    let totals = dataset.summary();

    eprintln!();
    eprintln!("{}", style("Totals").bold());
    if totals.is_empty() {
        eprintln!("  {}", style("no numeric columns").dim());
        return;
    }

    let width = totals.iter().map(|t| t.column.len()).max().unwrap_or(0);
    for total in &totals {
        eprintln!(
            "  {:<width$}  {:>14}  ({} values)",
            total.column,
            total.total.to_string(),
            total.count,
            width = width
        );
    }
}
