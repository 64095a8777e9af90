//! Export System - Named Byte Payloads
//!
//! Two exporters share the naming side of [`Exporter`]:
//! - PDF embeds a rasterized bitmap (fidelity is whatever the raster keeps)
//! - EPS relabels the raw source bytes without converting them
//!
//! Persisting the payload is the caller's job.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnostics::{DiagnosticsLog, Severity};
use crate::pdf::{assemble_pdf, AssemblyError};
use crate::print::PageLayout;
use crate::raster::{DecodeError, Rasterizer};

pub const PDF_SUCCESS_MESSAGE: &str = "Successfully exported to PDF";
pub const PDF_DECODE_FAILURE_MESSAGE: &str = "Failed to render SVG for PDF export. Check syntax.";
pub const EPS_PASSTHROUGH_MESSAGE: &str =
    "Exported as EPS (Source SVG wrapped). Note: True EPS requires server-side processing.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Eps,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Eps => "eps",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Eps => "application/postscript",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

/// Terminal value handed to whoever writes files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedPayload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
    pub format: ExportFormat,
}

impl ExportedPayload {
    pub fn sha256(&self) -> String {
        crate::hashing::sha256_hex(&self.bytes)
    }
}

/// Naming shared by every exporter.
pub trait Exporter {
    fn format(&self) -> ExportFormat;

    /// Filename stem, e.g. `design`.
    fn base_name(&self) -> &str;

    fn filename(&self) -> String {
        format!("{}.{}", self.base_name(), self.format().extension())
    }

    fn payload(&self, bytes: Vec<u8>) -> ExportedPayload {
        ExportedPayload {
            bytes,
            filename: self.filename(),
            mime_type: self.format().mime_type().to_string(),
            format: self.format(),
        }
    }
}

/// Rasterize, then embed the bitmap on a single PDF page.
#[derive(Clone)]
pub struct RasterDocumentExporter {
    rasterizer: Rasterizer,
    layout: PageLayout,
    base_name: String,
}

impl RasterDocumentExporter {
    pub fn new(rasterizer: Rasterizer, layout: PageLayout, base_name: impl Into<String>) -> Self {
        Self {
            rasterizer,
            layout,
            base_name: base_name.into(),
        }
    }

    /// Exactly one diagnostic is appended: success, or the failure that
    /// stopped the export. No payload is returned on failure.
    #[tracing::instrument(skip_all, fields(bytes = document.len()))]
    pub async fn export(
        &self,
        document: &str,
        log: &mut DiagnosticsLog,
    ) -> Result<ExportedPayload, ExportError> {
        let bitmap = match self.rasterizer.rasterize(document).await {
            Ok(bitmap) => bitmap,
            Err(err) => {
                tracing::warn!(error = %err, "pdf export: decode failed");
                log.append(Severity::Error, PDF_DECODE_FAILURE_MESSAGE);
                return Err(err.into());
            }
        };

        let bytes = match assemble_pdf(&bitmap, &self.layout) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "pdf export: assembly failed");
                log.append(Severity::Error, format!("Export failed: {}", err));
                return Err(err.into());
            }
        };

        let payload = self.payload(bytes);
        tracing::info!(filename = %payload.filename, size = payload.bytes.len(), "pdf export complete");
        log.append(Severity::Success, PDF_SUCCESS_MESSAGE);
        Ok(payload)
    }
}

impl Exporter for RasterDocumentExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Pdf
    }

    fn base_name(&self) -> &str {
        &self.base_name
    }
}

/// Labeled fallback: source bytes under an EPS name. Never fails.
#[derive(Debug, Clone)]
pub struct PassthroughExporter {
    base_name: String,
}

impl PassthroughExporter {
    pub fn new(base_name: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
        }
    }

    pub fn export(&self, document: &str, log: &mut DiagnosticsLog) -> ExportedPayload {
        let payload = self.payload(document.as_bytes().to_vec());
        tracing::info!(filename = %payload.filename, size = payload.bytes.len(), "eps passthrough export");
        log.append(Severity::Info, EPS_PASSTHROUGH_MESSAGE);
        payload
    }
}

impl Exporter for PassthroughExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Eps
    }

    fn base_name(&self) -> &str {
        &self.base_name
    }
}
