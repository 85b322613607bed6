use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub mod csv;
pub mod executor;
pub mod font;
pub mod logging;
pub mod model;
pub mod output_name;
pub mod progress;
pub mod render;
pub mod settings;
#[cfg(test)]
mod test_util;

pub use executor::{
    BatchOutcome, BatchStatus, ExecutorConfig, ExecutorError, JobExecutor, JobFailure, Strategy,
};
pub use font::{FontCategory, FontInfo, FontResolver};
pub use model::{
    Alignment, CsvEntry, FontStyle, MeasurementUnit, RenderJob, Rgb, StyleConfig, StyleError,
};
pub use progress::{ProgressTracker, ProgressUpdate};
pub use render::{Renderer, TemplateFormat, TemplateRenderer};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub template: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    pub output: PathBuf,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub unit: MeasurementUnit,
    pub alignment: Alignment,
    pub font: Option<String>,
    pub font_size: Option<f32>,
    pub color: Option<String>,
    pub bold: bool,
    pub italic: bool,
    pub threads: Option<usize>,
    pub sequential_threshold: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub prefix: Option<String>,
    pub postfix: Option<String>,
    pub settings_path: Option<PathBuf>,
    pub list_fonts: bool,
}

#[derive(Debug)]
pub enum RunReport {
    /// `--list-fonts` output, ready to print.
    Fonts(String),
    Batch(BatchReport),
}

#[derive(Debug)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    pub strategy: Strategy,
    pub output_dir: PathBuf,
}

pub async fn run<F>(config: Config, on_progress: F) -> Result<RunReport>
where
    F: Fn(ProgressUpdate) + Send + Sync + 'static,
{
    let settings = settings::load_settings(config.settings_path.as_deref())?;
    let font_dirs = settings.font_directories.clone();

    if config.list_fonts {
        let fonts = TemplateRenderer::for_format(TemplateFormat::Pdf, &font_dirs).available_fonts();
        return Ok(RunReport::Fonts(format_font_list(&fonts)));
    }

    let template = required(config.template.as_deref(), "--template")?;
    let csv_path = required(config.csv.as_deref(), "--csv")?;
    let x = config.x.ok_or_else(|| anyhow!("missing required option '--x'"))?;
    let y = config.y.ok_or_else(|| anyhow!("missing required option '--y'"))?;
    if !template.exists() {
        return Err(anyhow!("template file does not exist: {}", template.display()));
    }
    if !csv_path.exists() {
        return Err(anyhow!("CSV file does not exist: {}", csv_path.display()));
    }
    let format = TemplateFormat::from_path(template)?;

    let color_value = config.color.as_deref().unwrap_or(&settings.color);
    let style = StyleConfig {
        x: config.unit.to_pixels(x),
        y: config.unit.to_pixels(y),
        alignment: config.alignment,
        font_name: Some(config.font.clone().unwrap_or_else(|| settings.font.clone())),
        font_size: config.font_size.unwrap_or(settings.font_size),
        color: Rgb::parse_hex(color_value)?,
        font_style: FontStyle::from_flags(config.bold, config.italic),
    };
    style.validate()?;
    debug!(
        "style: ({}, {}) {:?} -> ({}, {}) px, color {}, {:?}",
        x,
        y,
        config.unit,
        style.x,
        style.y,
        style.color.to_hex(),
        style.font_style
    );

    let executor = JobExecutor::new(ExecutorConfig {
        max_concurrency: config.threads.unwrap_or(settings.threads),
        sequential_threshold: config
            .sequential_threshold
            .unwrap_or(settings.sequential_threshold),
        timeout: Duration::from_secs(config.timeout_secs.unwrap_or(settings.timeout_secs)),
    })?;

    fs::create_dir_all(&config.output).with_context(|| {
        format!("failed to create output directory: {}", config.output.display())
    })?;

    let entries = csv::read_entries(csv_path)?;
    if entries.is_empty() {
        warn!("no entries found in {}", csv_path.display());
    }

    let extension = template
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let jobs: Vec<RenderJob> = entries
        .iter()
        .map(|entry| RenderJob {
            text: entry.display_text(),
            style: style.clone(),
            template_path: template.to_path_buf(),
            output_path: config.output.join(output_name::output_file_name(
                template,
                &entry.name,
                config.prefix.as_deref(),
                config.postfix.as_deref(),
                &extension,
            )),
        })
        .collect();

    let strategy = executor.strategy_for(jobs.len());
    info!(
        "processing {} entries ({} mode, {} threads)",
        jobs.len(),
        strategy_label(strategy),
        executor.config().max_concurrency
    );

    let renderer = TemplateRenderer::for_format(format, &font_dirs);
    let progress = Arc::new(ProgressTracker::new(jobs.len()).with_listener(on_progress));
    let outcome = executor
        .execute_all(jobs, renderer.renderer(), progress)
        .await;
    info!(
        "finished: {} succeeded, {} failed, output in {}",
        outcome.success_count,
        outcome.failure_count(),
        config.output.display()
    );

    Ok(RunReport::Batch(BatchReport {
        outcome,
        strategy,
        output_dir: config.output,
    }))
}

fn required<'a>(value: Option<&'a Path>, flag: &str) -> Result<&'a Path> {
    value.ok_or_else(|| anyhow!("missing required option '{}'", flag))
}

pub fn strategy_label(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::Sequential => "sequential",
        Strategy::Parallel => "parallel",
    }
}

pub fn format_font_list(fonts: &[FontInfo]) -> String {
    let mut lines = vec!["=== Available Fonts ===".to_string(), String::new()];
    lines.push("[Built-in - PDF, PNG, JPEG]".to_string());
    lines.extend(
        fonts
            .iter()
            .filter(|font| font.category == FontCategory::BuiltIn)
            .map(|font| format!("  {}", font.name)),
    );
    lines.push(String::new());
    lines.push("[System Fonts - PDF, PNG, JPEG]".to_string());
    let system: Vec<String> = fonts
        .iter()
        .filter(|font| font.category == FontCategory::System)
        .map(|font| format!("  {}", font.name))
        .collect();
    if system.is_empty() {
        lines.push("  (none found)".to_string());
    }
    lines.extend(system);
    lines.join("\n")
}

#[derive(Debug, Serialize)]
struct ReportFile<'a> {
    status: BatchStatus,
    total: usize,
    success_count: usize,
    failure_count: usize,
    timed_out: bool,
    failures: &'a [JobFailure],
}

pub fn report_json(outcome: &BatchOutcome) -> Result<String> {
    let report = ReportFile {
        status: outcome.status(),
        total: outcome.total,
        success_count: outcome.success_count,
        failure_count: outcome.failure_count(),
        timed_out: outcome.timed_out,
        failures: &outcome.failures,
    };
    serde_json::to_string_pretty(&report).with_context(|| "failed to serialize batch report")
}

pub fn write_report(path: &Path, outcome: &BatchOutcome) -> Result<()> {
    let json = report_json(outcome)?;
    fs::write(path, json + "\n")
        .with_context(|| format!("failed to write report: {}", path.display()))
}
