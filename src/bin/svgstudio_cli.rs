//! SVG Studio CLI - validate and export SVG documents
//!
//! Commands: validate, export, replay
//! Outputs JSON to stdout, tracing to stderr
//! Returns 1 on usage/IO failure, 2 on validation or export failure

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use base64::Engine as _;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;

use svgstudio_core::{
    Diagnostic, EditingSession, ExportFormat, ExportedPayload, StudioConfig, ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "svgstudio-cli")]
#[command(about = "SVG Studio CLI - validation and multi-format export")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log pipeline details to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Pdf,
    Eps,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Pdf => ExportFormat::Pdf,
            FormatArg::Eps => ExportFormat::Eps,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one SVG document
    Validate {
        /// SVG source file
        file: PathBuf,
    },

    /// Export an SVG document as PDF or EPS
    Export {
        /// SVG source file
        file: PathBuf,

        /// Target format
        #[arg(short, long, value_enum)]
        format: FormatArg,

        /// Directory the payload is written to
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Embed the payload as base64 instead of writing a file
        #[arg(long)]
        inline: bool,
    },

    /// Apply files as successive edits and print the diagnostics views
    Replay {
        /// SVG snapshots, in edit order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    let config = match &cli.config {
        Some(path) => match StudioConfig::load(path) {
            Ok(c) => c,
            Err(e) => return fail(json!({ "error": e.to_string() })),
        },
        None => StudioConfig::default(),
    };

    let mut session = EditingSession::new(&config);

    match cli.command {
        Commands::Validate { file } => {
            let document = match read_document(&file) {
                Ok(d) => d,
                Err(e) => return fail(json!({ "valid": false, "error": e })),
            };

            let result = session.apply_edit(document);
            print_json(&json!({
                "valid": result.is_valid(),
                "reason": result.reason(),
                "diagnostics": session.terminal(),
            }));
            if result.is_valid() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2) // Validation failure
            }
        }

        Commands::Export { file, format, out_dir, inline } => {
            let document = match read_document(&file) {
                Ok(d) => d,
                Err(e) => return fail(json!({ "success": false, "error": e })),
            };

            // Export is never gated on validation; the pass only adds context
            session.apply_edit(document);

            let payload = match ExportFormat::from(format) {
                ExportFormat::Pdf => session.export_pdf().await,
                ExportFormat::Eps => Ok(session.export_eps()),
            };

            let payload = match payload {
                Ok(p) => p,
                Err(e) => {
                    print_json(&json!({
                        "success": false,
                        "error": e.to_string(),
                        "diagnostics": session.terminal(),
                    }));
                    return ExitCode::from(2);
                }
            };

            let mut manifest = json!({
                "success": true,
                "engineVersion": ENGINE_VERSION,
                "filename": payload.filename,
                "mimeType": payload.mime_type,
                "size": payload.bytes.len(),
                "sha256": payload.sha256(),
                "diagnostics": session.terminal(),
            });

            if inline {
                manifest["dataBase64"] = json!(base64::engine::general_purpose::STANDARD.encode(&payload.bytes));
            } else {
                match write_payload(&payload, &out_dir) {
                    Ok(path) => manifest["path"] = json!(path.display().to_string()),
                    Err(e) => return fail(json!({ "success": false, "error": e })),
                }
            }

            print_json(&manifest);
            ExitCode::SUCCESS
        }

        Commands::Replay { files } => {
            for file in &files {
                match read_document(file) {
                    Ok(document) => {
                        session.apply_edit(document);
                    }
                    Err(e) => return fail(json!({ "error": e })),
                }
            }

            let problems: Vec<&Diagnostic> = session.problems();
            print_json(&json!({
                "snapshots": files.len(),
                "problems": problems,
                "terminal": session.terminal(),
            }));
            if problems.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
    }
}

fn read_document(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

/// Persist a payload under its own filename.
fn write_payload(payload: &ExportedPayload, out_dir: &Path) -> Result<PathBuf, String> {
    fs::create_dir_all(out_dir).map_err(|e| format!("Failed to create {}: {}", out_dir.display(), e))?;
    let path = out_dir.join(&payload.filename);
    fs::write(&path, &payload.bytes).map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    tracing::info!(path = %path.display(), mime_type = %payload.mime_type, "payload written");
    Ok(path)
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("failed to serialize output: {}", e),
    }
}

fn fail(value: serde_json::Value) -> ExitCode {
    print_json(&value);
    ExitCode::FAILURE
}
