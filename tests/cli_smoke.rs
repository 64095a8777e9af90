use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const CIRCLE: &str = r##"<svg width="200" height="200" viewBox="0 0 200 200" xmlns="http://www.w3.org/2000/svg">
  <circle cx="100" cy="100" r="80" fill="#007acc" />
</svg>"##;

fn run(dir: &Path, args: &[&str]) -> (Output, serde_json::Value) {
    let config = dir.join("studio.json");
    fs::write(&config, r#"{"raster": {"loadSystemFonts": false}}"#).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_svgstudio-cli"))
        .arg("--config")
        .arg(&config)
        .args(args)
        .output()
        .unwrap();
    let json = serde_json::from_slice(&output.stdout).unwrap();
    (output, json)
}

#[test]
fn cli_validate_reports_reason_and_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad.svg");
    fs::write(&bad, "<svg><rect></svg>").unwrap();

    let (output, json) = run(dir.path(), &["validate", bad.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(json["valid"], false);
    assert_eq!(json["reason"], "mismatched tag");
    assert_eq!(json["diagnostics"][0]["severity"], "error");
}

#[test]
fn cli_export_pdf_writes_payload() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("design.svg");
    fs::write(&src, CIRCLE).unwrap();
    let out = dir.path().join("out");

    let (output, json) = run(
        dir.path(),
        &["export", src.to_str().unwrap(), "--format", "pdf", "--out-dir", out.to_str().unwrap()],
    );
    assert!(output.status.success());
    assert_eq!(json["filename"], "design.pdf");
    assert_eq!(json["mimeType"], "application/pdf");

    let bytes = fs::read(out.join("design.pdf")).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
    assert_eq!(json["size"], bytes.len());
    assert_eq!(json["sha256"], svgstudio_core::sha256_hex(&bytes));
}

#[test]
fn cli_export_eps_inline_is_source() {
    use base64::Engine as _;

    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("design.svg");
    fs::write(&src, CIRCLE).unwrap();

    let (output, json) = run(dir.path(), &["export", src.to_str().unwrap(), "--format", "eps", "--inline"]);
    assert!(output.status.success());
    assert_eq!(json["filename"], "design.eps");

    let data = base64::engine::general_purpose::STANDARD
        .decode(json["dataBase64"].as_str().unwrap())
        .unwrap();
    assert_eq!(data, CIRCLE.as_bytes());
}

#[test]
fn cli_replay_keeps_history_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("1.svg");
    let second = dir.path().join("2.svg");
    fs::write(&first, "<svg>").unwrap();
    fs::write(&second, "<svg><a></b></svg>").unwrap();

    let (output, json) = run(dir.path(), &["replay", first.to_str().unwrap(), second.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(json["snapshots"], 2);
    assert_eq!(json["problems"][0]["message"], "Syntax Error: mismatched tag");
    assert_eq!(json["problems"][1]["message"], "Syntax Error: unclosed tag");
}

#[test]
fn cli_export_pdf_undecodable_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("broken.svg");
    fs::write(&src, "<svg><rect></svg>").unwrap();

    let (output, json) = run(dir.path(), &["export", src.to_str().unwrap(), "--format", "pdf", "--inline"]);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(json["success"], false);
    assert_eq!(json["diagnostics"][0]["message"], "Failed to render SVG for PDF export. Check syntax.");
    assert_eq!(json["diagnostics"][1]["message"], "Syntax Error: mismatched tag");
}

#[test]
fn cli_missing_config_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("design.svg");
    fs::write(&src, CIRCLE).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_svgstudio-cli"))
        .arg("--config")
        .arg(dir.path().join("missing.json"))
        .args(["validate", src.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(json["error"].is_string());
}
