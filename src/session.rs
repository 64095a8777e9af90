//! Editing Session - Single Entry Point
//!
//! Owns the diagnostics log for its whole lifetime and hands it to each
//! component explicitly. Edits arrive as complete snapshots; every snapshot
//! triggers one validation pass, in arrival order.

use std::sync::Arc;

use crate::config::StudioConfig;
use crate::diagnostics::{Diagnostic, DiagnosticsLog};
use crate::export::{ExportError, ExportedPayload, PassthroughExporter, RasterDocumentExporter};
use crate::raster::{RasterBackend, Rasterizer, ResvgBackend};
use crate::validation::{MarkupValidator, ValidationResult};

/// Starting document of a new session.
pub const DEFAULT_DOCUMENT: &str = r##"<svg width="200" height="200" viewBox="0 0 200 200" xmlns="http://www.w3.org/2000/svg">
  <circle cx="100" cy="100" r="80" fill="#007acc" />
  <rect x="50" y="50" width="100" height="100" fill="none" stroke="white" stroke-width="4" />
  <text x="100" y="105" font-family="Arial" font-size="24" text-anchor="middle" fill="white">Hello</text>
</svg>"##;

pub struct EditingSession {
    document: String,
    log: DiagnosticsLog,
    validator: MarkupValidator,
    pdf: RasterDocumentExporter,
    eps: PassthroughExporter,
}

impl EditingSession {
    /// Session backed by the resvg rasterizer.
    pub fn new(config: &StudioConfig) -> Self {
        Self::with_backend(config, Arc::new(ResvgBackend::new(&config.raster)))
    }

    pub fn with_backend(config: &StudioConfig, backend: Arc<dyn RasterBackend>) -> Self {
        Self {
            document: DEFAULT_DOCUMENT.to_string(),
            log: DiagnosticsLog::new(),
            validator: MarkupValidator::new(),
            pdf: RasterDocumentExporter::new(Rasterizer::new(backend), config.page, config.base_name.clone()),
            eps: PassthroughExporter::new(config.base_name.clone()),
        }
    }

    /// Replace the document with `snapshot` and validate it.
    pub fn apply_edit(&mut self, snapshot: impl Into<String>) -> ValidationResult {
        self.document = snapshot.into();
        self.validator.validate(&self.document, &mut self.log)
    }

    pub async fn export_pdf(&mut self) -> Result<ExportedPayload, ExportError> {
        self.pdf.export(&self.document, &mut self.log).await
    }

    pub fn export_eps(&mut self) -> ExportedPayload {
        self.eps.export(&self.document, &mut self.log)
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn log(&self) -> &DiagnosticsLog {
        &self.log
    }

    pub fn problems(&self) -> Vec<&Diagnostic> {
        self.log.problems()
    }

    pub fn terminal(&self) -> Vec<&Diagnostic> {
        self.log.terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::raster::{Bitmap, DecodeError};

    struct OnePixel;

    impl RasterBackend for OnePixel {
        fn decode(&self, _document: &str) -> Result<Bitmap, DecodeError> {
            Ok(Bitmap::from_rgba(1, 1, vec![0, 0, 0, 255]).unwrap())
        }
    }

    fn session() -> EditingSession {
        EditingSession::with_backend(&StudioConfig::default(), Arc::new(OnePixel))
    }

    #[test]
    fn test_new_session_starts_clean() {
        let session = session();
        assert_eq!(session.document(), DEFAULT_DOCUMENT);
        assert!(session.log().is_empty());
        assert!(MarkupValidator::new().check(DEFAULT_DOCUMENT).is_ok());
    }

    #[test]
    fn test_successful_edit_keeps_prior_errors() {
        let mut session = session();
        assert!(!session.apply_edit("<svg>").is_valid());
        assert!(session.apply_edit("<svg/>").is_valid());
        assert_eq!(session.problems().len(), 1);
        assert_eq!(session.document(), "<svg/>");
    }

    #[test]
    fn test_eps_exports_current_snapshot() {
        let mut session = session();
        session.apply_edit("<svg><g/></svg>");
        let payload = session.export_eps();
        assert_eq!(payload.bytes, b"<svg><g/></svg>");
        assert_eq!(session.terminal()[0].severity, Severity::Info);
    }

    #[tokio::test]
    async fn test_pdf_export_logs_success() {
        let mut session = session();
        let payload = session.export_pdf().await.unwrap();
        assert_eq!(payload.filename, "design.pdf");
        assert_eq!(session.log().count(Severity::Success), 1);
    }
}
