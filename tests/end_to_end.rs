use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex};

use bulk_text_renderer::{BatchStatus, Config, RunReport, Strategy};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

fn write_png(path: &Path, width: u32, height: u32) {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([240, 240, 240]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png");
    fs::write(path, bytes).expect("write png");
}

fn write_jpeg(path: &Path, width: u32, height: u32) {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([250, 250, 250]));
    image
        .save_with_format(path, image::ImageFormat::Jpeg)
        .expect("write jpeg");
}

fn write_pdf(path: &Path) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content = Content {
        operations: vec![
            Operation::new("re", vec![10.into(), 10.into(), 100.into(), 50.into()]),
            Operation::new("S", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("encode content"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("write pdf");
}

fn config(dir: &Path, template: &str) -> Config {
    Config {
        template: Some(dir.join(template)),
        csv: Some(dir.join("names.csv")),
        output: dir.join("out"),
        x: Some(20.0),
        y: Some(40.0),
        font: Some("Helvetica".to_string()),
        font_size: Some(14.0),
        ..Config::default()
    }
}

fn batch(report: RunReport) -> bulk_text_renderer::BatchReport {
    match report {
        RunReport::Batch(batch) => batch,
        RunReport::Fonts(_) => panic!("expected a batch report"),
    }
}

fn sorted_outputs(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read output dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn stamps_every_csv_row_onto_a_pdf_template() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_pdf(&dir.path().join("certificate.pdf"));
    fs::write(
        dir.path().join("names.csv"),
        "Adam Smith,Mr.\n\nJane Doe,Dr.,PhD\nJohn Williams,,Jr.\n",
    )
    .expect("csv");

    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);
    let report = bulk_text_renderer::run(config(dir.path(), "certificate.pdf"), move |update| {
        sink.lock().expect("updates").push(update.completed);
    })
    .await
    .expect("run");

    let batch = batch(report);
    assert_eq!(batch.outcome.status(), BatchStatus::Complete);
    assert_eq!(batch.outcome.success_count, 3);
    assert_eq!(batch.strategy, Strategy::Sequential);
    assert_eq!(*updates.lock().expect("updates"), vec![1, 2, 3]);
    assert_eq!(
        sorted_outputs(&dir.path().join("out")),
        [
            "certificate-Adam.pdf",
            "certificate-Jane.pdf",
            "certificate-John.pdf"
        ]
    );

    let doc = Document::load(dir.path().join("out/certificate-Jane.pdf")).expect("load output");
    let page_id = *doc.get_pages().get(&1).expect("page 1");
    let content = doc.get_page_content(page_id).expect("content");
    let operations = Content::decode(&content).expect("decode").operations;
    let shown = operations
        .iter()
        .find(|op| op.operator == "Tj")
        .and_then(|op| op.operands.first())
        .and_then(|text| text.as_str().ok())
        .expect("stamped text");
    assert_eq!(shown, b"Dr. Jane Doe PhD".as_slice());
    assert!(operations.iter().any(|op| op.operator == "re"));
}

#[tokio::test]
async fn renders_png_templates_in_parallel() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_png(&dir.path().join("badge.png"), 160, 60);
    let names: Vec<String> = (0..12).map(|i| format!("Guest{i:02}")).collect();
    fs::write(dir.path().join("names.csv"), names.join("\n")).expect("csv");

    let mut config = config(dir.path(), "badge.png");
    config.sequential_threshold = Some(0);
    config.threads = Some(3);
    config.prefix = Some("2024".to_string());
    let batch = batch(bulk_text_renderer::run(config, |_| {}).await.expect("run"));

    assert_eq!(batch.strategy, Strategy::Parallel);
    assert_eq!(batch.outcome.status(), BatchStatus::Complete);
    assert_eq!(batch.outcome.success_count, 12);
    let output = dir.path().join("out/2024-badge-Guest07.png");
    let decoded = image::open(&output).expect("decode output");
    assert_eq!((decoded.width(), decoded.height()), (160, 60));
}

#[tokio::test]
async fn jpeg_template_produces_jpeg_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_jpeg(&dir.path().join("card.jpeg"), 80, 40);
    fs::write(dir.path().join("names.csv"), "Zoe\n").expect("csv");

    let mut config = config(dir.path(), "card.jpeg");
    config.color = Some("#c00".to_string());
    config.postfix = Some("v2".to_string());
    let batch = batch(bulk_text_renderer::run(config, |_| {}).await.expect("run"));

    assert_eq!(batch.outcome.status(), BatchStatus::Complete);
    let output = dir.path().join("out/card-Zoe-v2.jpeg");
    let bytes = fs::read(&output).expect("read output");
    assert_eq!(
        image::guess_format(&bytes).expect("format"),
        image::ImageFormat::Jpeg
    );
}

#[tokio::test]
async fn one_bad_row_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_png(&dir.path().join("card.png"), 40, 20);
    fs::write(dir.path().join("names.csv"), "Ann\nBob\nCid\n").expect("csv");
    // A directory where Bob's output file should go makes that write fail.
    fs::create_dir_all(dir.path().join("out/card-Bob.png")).expect("blocker");

    let batch = batch(
        bulk_text_renderer::run(config(dir.path(), "card.png"), |_| {})
            .await
            .expect("run"),
    );
    assert_eq!(batch.outcome.status(), BatchStatus::Partial);
    assert_eq!(batch.outcome.success_count, 2);
    assert_eq!(batch.outcome.failures.len(), 1);
    assert_eq!(batch.outcome.failures[0].text, "Bob");
}

fn cli(dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_bulk-render"));
    command.current_dir(dir);
    command
}

fn template_args(template: &str) -> Vec<String> {
    [
        "--template", template, "--csv", "names.csv", "--output", "out", "--x", "5", "--y",
        "15", "--font", "Courier",
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect()
}

#[test]
fn cli_exit_code_reflects_partial_failure_and_writes_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_png(&dir.path().join("card.png"), 40, 20);
    fs::write(dir.path().join("names.csv"), "Ann\nBob\n").expect("csv");
    fs::create_dir_all(dir.path().join("out/card-Ann.png")).expect("blocker");

    let status = cli(dir.path())
        .args(template_args("card.png"))
        .args(["--report", "report.json"])
        .status()
        .expect("run binary");
    assert_eq!(status.code(), Some(3));

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("report.json")).expect("report"))
            .expect("parse report");
    assert_eq!(report["status"], "partial");
    assert_eq!(report["success_count"], 1);
    assert_eq!(report["failures"][0]["text"], "Ann");
}

#[test]
fn cli_exit_codes_for_setup_errors_and_total_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("names.csv"), "Ann\n").expect("csv");

    let missing = cli(dir.path())
        .args(template_args("missing.pdf"))
        .status()
        .expect("run binary");
    assert_eq!(missing.code(), Some(1));

    fs::write(dir.path().join("broken.pdf"), b"not a pdf").expect("broken template");
    let failed = cli(dir.path())
        .args(template_args("broken.pdf"))
        .status()
        .expect("run binary");
    assert_eq!(failed.code(), Some(4));
}

#[test]
fn cli_lists_fonts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = cli(dir.path())
        .arg("--list-fonts")
        .output()
        .expect("run binary");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[Built-in - PDF, PNG, JPEG]"));
    assert!(stdout.contains("  Helvetica"));
}
