use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use bulk_text_renderer::{
    Alignment, BatchStatus, MeasurementUnit, RunReport, progress::format_progress,
};
use clap::Parser;

const EXIT_SETUP_ERROR: u8 = 1;
const EXIT_PARTIAL: u8 = 3;
const EXIT_ALL_FAILED: u8 = 4;

#[derive(Parser, Debug)]
#[command(
    name = "bulk-render",
    version,
    about = "Bulk render text onto PDF, PNG, or JPEG templates using data from a CSV file"
)]
struct Cli {
    /// Template file (pdf, png, jpg or jpeg)
    #[arg(short = 't', long = "template", required_unless_present = "list_fonts")]
    template: Option<PathBuf>,

    /// CSV file with one `name[,prefix[,postfix]]` entry per line
    #[arg(short = 'c', long = "csv", required_unless_present = "list_fonts")]
    csv: Option<PathBuf>,

    /// Output folder
    #[arg(short = 'o', long = "output", default_value = "./output")]
    output: PathBuf,

    /// X coordinate of the text anchor, from the left edge
    #[arg(long = "x", required_unless_present = "list_fonts", allow_negative_numbers = true)]
    x: Option<f32>,

    /// Y coordinate of the text baseline, from the top edge
    #[arg(long = "y", required_unless_present = "list_fonts", allow_negative_numbers = true)]
    y: Option<f32>,

    /// Unit for --x and --y
    #[arg(short = 'u', long = "unit", value_enum, ignore_case = true, default_value_t = MeasurementUnit::Px)]
    unit: MeasurementUnit,

    /// Text alignment relative to --x
    #[arg(short = 'a', long = "align", value_enum, ignore_case = true, default_value_t = Alignment::Left)]
    align: Alignment,

    /// Font name (default: Times New Roman, or [render] font in settings)
    #[arg(short = 'f', long = "font")]
    font: Option<String>,

    /// Font size in points (default: 12)
    #[arg(short = 's', long = "font-size")]
    font_size: Option<f32>,

    /// Font color as #RRGGBB or #RGB (default: #000000)
    #[arg(short = 'C', long = "color")]
    color: Option<String>,

    /// Use bold font style
    #[arg(short = 'b', long = "bold")]
    bold: bool,

    /// Use italic font style
    #[arg(short = 'i', long = "italic")]
    italic: bool,

    /// Maximum concurrent renders (default: available processors)
    #[arg(short = 'p', long = "threads")]
    threads: Option<usize>,

    /// Batches smaller than this run sequentially; 0 always runs in parallel (default: 10)
    #[arg(long = "sequential-threshold")]
    sequential_threshold: Option<usize>,

    /// Give up on the batch after this many seconds (default: 3600)
    #[arg(long = "timeout-secs")]
    timeout_secs: Option<u64>,

    /// Output filename prefix
    #[arg(long = "prefix")]
    prefix: Option<String>,

    /// Output filename postfix
    #[arg(long = "postfix")]
    postfix: Option<String>,

    /// List fonts usable for PDF, PNG and JPEG rendering and exit
    #[arg(long = "list-fonts")]
    list_fonts: bool,

    /// Write a JSON summary of the batch to this path
    #[arg(long = "report")]
    report: Option<PathBuf>,

    /// Read extra settings from a TOML file
    #[arg(short = 'r', long = "config")]
    config: Option<PathBuf>,

    /// Enable verbose logging (INFO level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Enable debug logging (DEBUG level)
    #[arg(long = "debug")]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = bulk_text_renderer::logging::init(cli.verbose, cli.debug) {
        eprintln!("Error: {:#}", err);
        return ExitCode::from(EXIT_SETUP_ERROR);
    }

    let report_path = cli.report.clone();
    let config = bulk_text_renderer::Config {
        template: cli.template,
        csv: cli.csv,
        output: cli.output,
        x: cli.x,
        y: cli.y,
        unit: cli.unit,
        alignment: cli.align,
        font: cli.font,
        font_size: cli.font_size,
        color: cli.color,
        bold: cli.bold,
        italic: cli.italic,
        threads: cli.threads,
        sequential_threshold: cli.sequential_threshold,
        timeout_secs: cli.timeout_secs,
        prefix: cli.prefix,
        postfix: cli.postfix,
        settings_path: cli.config,
        list_fonts: cli.list_fonts,
    };

    let show_progress = io::stderr().is_terminal();
    let result = bulk_text_renderer::run(config, move |update| {
        if show_progress {
            let mut stderr = io::stderr().lock();
            let _ = write!(stderr, "\r{}", format_progress(update));
            let _ = stderr.flush();
        }
    })
    .await;

    let batch = match result {
        Ok(RunReport::Fonts(listing)) => {
            println!("{}", listing);
            return ExitCode::SUCCESS;
        }
        Ok(RunReport::Batch(batch)) => batch,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            return ExitCode::from(EXIT_SETUP_ERROR);
        }
    };
    if show_progress && batch.outcome.total > 0 {
        eprintln!();
    }

    let outcome = &batch.outcome;
    if let Some(path) = report_path {
        if let Err(err) = bulk_text_renderer::write_report(&path, outcome) {
            eprintln!("Error: {:#}", err);
        }
    }

    match outcome.status() {
        BatchStatus::Empty => {
            println!("No entries found in CSV file.");
            ExitCode::SUCCESS
        }
        BatchStatus::Complete => {
            println!(
                "Completed {} entries ({} mode). Output files saved to: {}",
                outcome.success_count,
                bulk_text_renderer::strategy_label(batch.strategy),
                batch.output_dir.display()
            );
            ExitCode::SUCCESS
        }
        status => {
            eprintln!(
                "{} of {} entries failed{}:",
                outcome.failure_count(),
                outcome.total,
                if outcome.timed_out { " (batch timed out)" } else { "" }
            );
            for failure in &outcome.failures {
                eprintln!("  {}: {}", failure.text, failure.reason);
            }
            if status == BatchStatus::Failed {
                ExitCode::from(EXIT_ALL_FAILED)
            } else {
                println!(
                    "Output files for {} entries saved to: {}",
                    outcome.success_count,
                    batch.output_dir.display()
                );
                ExitCode::from(EXIT_PARTIAL)
            }
        }
    }
}
