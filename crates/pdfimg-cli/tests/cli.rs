//! Command-line behavior of the `pdfimg` binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use predicates::prelude::*;

const FAKE_JPEG: &[u8] = b"\xFF\xD8\xFF\xE0fake jpeg payload\xFF\xD9";

/// A `pages`-page PDF where every page draws the same JPEG.
fn write_pdf(path: &Path, pages: usize) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 1,
            "Height" => 1,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        FAKE_JPEG.to_vec(),
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![50.into(), 0.into(), 0.into(), 50.into(), 0.into(), 0.into()],
            ),
            Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im1" => image_id },
                },
            })
            .into()
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

fn pdfimg(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pdfimg").unwrap();
    cmd.arg("--config").arg(config_dir.join("config.json"));
    cmd
}

fn read_report(folder: &Path) -> serde_json::Value {
    let text = fs::read_to_string(folder.join("extraction_report.json")).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[test]
fn test_help() {
    Command::cargo_bin("pdfimg")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("batch"));
}

#[test]
fn test_extract_writes_images_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("doc.pdf");
    let out = dir.path().join("out");
    write_pdf(&pdf, 3);

    pdfimg(dir.path())
        .arg("extract")
        .arg(&pdf)
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("page-001: extracted 1 image(s)"))
        .stdout(predicate::str::contains("page-002: no embedded images"))
        .stdout(predicate::str::contains("Completed successfully"));

    assert_eq!(fs::read(out.join("page-001-img-1.jpg")).unwrap(), FAKE_JPEG);
    assert!(!out.join("page-002-img-1.jpg").exists());

    let report = read_report(&out);
    assert_eq!(report["batch_mode"], false);
    assert_eq!(report["file_count"], 1);
    assert_eq!(report["files"][0]["total_pages"], 3);
    assert_eq!(report["files"][0]["pages_processed"], serde_json::json!([1, 2, 3]));
    assert_eq!(report["summary"]["total_images"], 1);
}

#[test]
fn test_extract_with_page_selection_and_collisions() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("doc.pdf");
    let out = dir.path().join("out");
    write_pdf(&pdf, 4);

    for _ in 0..2 {
        pdfimg(dir.path())
            .args(["extract", "--pages", "3-10,2"])
            .arg(&pdf)
            .arg(&out)
            .assert()
            .success();
    }

    assert!(out.join("page-002-img-1.jpg").is_file());
    assert!(out.join("page-002-img-1-2.jpg").is_file());
    let report = read_report(&out);
    assert_eq!(report["files"][0]["pages_processed"], serde_json::json!([2, 3, 4]));
}

#[test]
fn test_extract_rejects_bad_input() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");

    pdfimg(dir.path())
        .arg("extract")
        .arg(dir.path().join("missing.pdf"))
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input PDF not found"));

    let text = dir.path().join("notes.txt");
    fs::write(&text, b"hello").unwrap();
    pdfimg(dir.path())
        .arg("extract")
        .arg(&text)
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a PDF"));

    assert!(!out.exists());
}

#[test]
fn test_extract_rejects_bad_options() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("doc.pdf");
    let out = dir.path().join("out");
    write_pdf(&pdf, 1);

    pdfimg(dir.path())
        .args(["extract", "--pages", "1,x-3"])
        .arg(&pdf)
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid page selector"));

    pdfimg(dir.path())
        .args(["extract", "--dpi", "10"])
        .arg(&pdf)
        .arg(&out)
        .assert()
        .failure();

    assert!(!out.exists());
}

#[test]
fn test_extract_corrupt_pdf_fails_but_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("broken.pdf");
    let out = dir.path().join("out");
    fs::write(&pdf, b"not a pdf at all").unwrap();

    pdfimg(dir.path())
        .arg("extract")
        .arg(&pdf)
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open PDF"));

    let report = read_report(&out);
    assert_eq!(report["file_count"], 0);
    assert_eq!(report["global_errors"].as_array().unwrap().len(), 1);
}

#[test]
fn test_batch_processes_folder() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    let out = dir.path().join("out");
    fs::create_dir(&input).unwrap();
    write_pdf(&input.join("first.pdf"), 2);
    write_pdf(&input.join("second.pdf"), 1);
    fs::write(input.join("third.pdf"), b"garbage").unwrap();
    fs::write(input.join("ignored.txt"), b"text").unwrap();

    pdfimg(dir.path())
        .arg("batch")
        .arg(&input)
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Batch mode: found 3 PDF(s)"))
        .stdout(predicate::str::contains("Completed with"));

    assert!(out.join("first").join("page-001-img-1.jpg").is_file());
    assert!(out.join("second").join("page-001-img-1.jpg").is_file());

    let report = read_report(&out);
    assert_eq!(report["batch_mode"], true);
    assert_eq!(report["file_count"], 2);
    assert_eq!(report["summary"]["total_images"], 2);
    let files = report["files"].as_array().unwrap();
    let images: u64 = files.iter().map(|f| f["images_extracted"].as_u64().unwrap()).sum();
    assert_eq!(report["summary"]["total_images"], images);
    let errors = report["global_errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].as_str().unwrap().contains("third.pdf"));
}

#[test]
fn test_batch_requires_folder() {
    let dir = tempfile::tempdir().unwrap();

    pdfimg(dir.path())
        .arg("batch")
        .arg(dir.path().join("nope"))
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input folder not found"));
}

#[test]
fn test_config_roundtrip() {
    let dir = tempfile::tempdir().unwrap();

    pdfimg(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not created"));

    pdfimg(dir.path())
        .args(["config", "set", "dpi", "300"])
        .assert()
        .success();

    pdfimg(dir.path())
        .args(["config", "get", "dpi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("300"));

    pdfimg(dir.path())
        .args(["config", "set", "dpi", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("dpi must be between"));

    pdfimg(dir.path())
        .args(["config", "set", "colour", "blue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown preference"));

    pdfimg(dir.path()).args(["config", "reset"]).assert().success();
    pdfimg(dir.path())
        .args(["config", "get", "dpi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("200"));
}

#[test]
fn test_runs_remember_last_paths() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("doc.pdf");
    let out = dir.path().join("out");
    write_pdf(&pdf, 1);

    pdfimg(dir.path())
        .args(["extract", "--dpi", "150"])
        .arg(&pdf)
        .arg(&out)
        .assert()
        .success();

    let prefs: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("config.json")).unwrap()).unwrap();
    assert_eq!(prefs["dpi"], 150);
    assert_eq!(prefs["last_pdf"], pdf.display().to_string());
}

#[test]
fn test_run_options_are_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("doc.pdf");
    let out = dir.path().join("out");
    write_pdf(&pdf, 1);

    pdfimg(dir.path())
        .args(["extract", "--overwrite"])
        .arg(&pdf)
        .arg(&out)
        .assert()
        .success();

    let prefs: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("config.json")).unwrap()).unwrap();
    assert!(prefs.get("overwrite").is_none());
    assert!(prefs.get("export_pages").is_none());

    for key in ["overwrite", "export_pages"] {
        pdfimg(dir.path())
            .args(["config", "set", key, "true"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown preference"));
    }

    // A second run without the flag must not overwrite the first run's image.
    pdfimg(dir.path()).arg("extract").arg(&pdf).arg(&out).assert().success();
    assert!(out.join("page-001-img-1-2.jpg").is_file());
}
