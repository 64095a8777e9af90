//! SVG Studio Core - Validation & Multi-Format Export Pipeline
//!
//! # Flow
//! 1. Every edit is a full document snapshot, validated synchronously
//! 2. Failures become diagnostics, never errors to the editor
//! 3. PDF export rasterizes off the editing path, then embeds the bitmap
//! 4. EPS export relabels the source bytes as-is

pub mod config;
pub mod diagnostics;
pub mod export;
pub mod hashing;
pub mod pdf;
pub mod print;
pub mod raster;
pub mod session;
pub mod validation;

pub use config::{ConfigError, StudioConfig};
pub use diagnostics::{Diagnostic, DiagnosticsLog, Severity};
pub use export::{ExportError, ExportFormat, ExportedPayload, Exporter, PassthroughExporter, RasterDocumentExporter};
pub use hashing::sha256_hex;
pub use print::PageLayout;
pub use raster::{Bitmap, DecodeError, RasterBackend, RasterOptions, RasterTask, Rasterizer, ResvgBackend};
pub use session::{EditingSession, DEFAULT_DOCUMENT};
pub use validation::{MarkupValidator, SyntaxError, ValidationResult};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
