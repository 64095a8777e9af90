//! Rasterizer - Vector Source to Pixel Grid
//!
//! Decoding is the only suspension point of the export path. The backend
//! runs on tokio's blocking pool and hands its result back through a
//! [`RasterTask`], so editing and validation never wait on it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("svg decode failed: {0}")]
    Parse(String),

    #[error("svg has an empty intrinsic size")]
    EmptySize,

    #[error("svg raster size too large: {width}x{height} (max {max}x{max})")]
    TooLarge { width: u32, height: u32, max: u32 },

    #[error("failed to allocate {0}x{1} pixmap")]
    Allocation(u32, u32),

    #[error("rasterization was cancelled")]
    Cancelled,

    #[error("rasterization backend failed: {0}")]
    Backend(String),
}

/// Straight (non-premultiplied) RGBA8 pixels at the source's intrinsic size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Bitmap {
    /// Returns `None` when either side is zero or `rgba` is not `width * height * 4` bytes.
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        if width == 0 || height == 0 || rgba.len() != expected {
            return None;
        }
        Some(Self { width, height, rgba })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Colour channels with alpha dropped.
    pub fn rgb(&self) -> Vec<u8> {
        self.rgba
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect()
    }

    pub fn alpha(&self) -> Vec<u8> {
        self.rgba.chunks_exact(4).map(|px| px[3]).collect()
    }

    pub fn is_opaque(&self) -> bool {
        self.rgba.chunks_exact(4).all(|px| px[3] == u8::MAX)
    }
}

/// Turns a document string into pixels. Implementations must be callable
/// from any thread.
pub trait RasterBackend: Send + Sync {
    fn decode(&self, document: &str) -> Result<Bitmap, DecodeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct RasterOptions {
    /// Needed for `<text>`; costs a font scan at startup.
    pub load_system_fonts: bool,
    pub max_dimension: u32,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            load_system_fonts: true,
            max_dimension: 16_384,
        }
    }
}

/// Production backend built on usvg/resvg.
pub struct ResvgBackend {
    options: usvg::Options<'static>,
    max_dimension: u32,
}

impl ResvgBackend {
    pub fn new(raster: &RasterOptions) -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        if raster.load_system_fonts {
            fontdb.load_system_fonts();
        }
        tracing::debug!(faces = fontdb.len(), "svg font database ready");

        Self {
            options: usvg::Options {
                fontdb: Arc::new(fontdb),
                ..Default::default()
            },
            max_dimension: raster.max_dimension,
        }
    }
}

impl RasterBackend for ResvgBackend {
    fn decode(&self, document: &str) -> Result<Bitmap, DecodeError> {
        let tree = usvg::Tree::from_str(document, &self.options)
            .map_err(|e| DecodeError::Parse(e.to_string()))?;

        let size = tree.size().to_int_size();
        let (width, height) = (size.width(), size.height());
        if width == 0 || height == 0 {
            return Err(DecodeError::EmptySize);
        }
        if width > self.max_dimension || height > self.max_dimension {
            return Err(DecodeError::TooLarge {
                width,
                height,
                max: self.max_dimension,
            });
        }

        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
            .ok_or(DecodeError::Allocation(width, height))?;
        resvg::render(&tree, resvg::tiny_skia::Transform::identity(), &mut pixmap.as_mut());

        let rgba = pixmap
            .pixels()
            .iter()
            .flat_map(|px| {
                let c = px.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();

        Bitmap::from_rgba(width, height, rgba).ok_or(DecodeError::Allocation(width, height))
    }
}

/// Dispatches decodes to a backend, one task per request.
#[derive(Clone)]
pub struct Rasterizer {
    backend: Arc<dyn RasterBackend>,
}

impl Rasterizer {
    pub fn new(backend: Arc<dyn RasterBackend>) -> Self {
        Self { backend }
    }

    /// Start decoding `document` on the blocking pool.
    ///
    /// Fails with `DecodeError::Backend` outside a tokio runtime. Requests
    /// are never coalesced: every call gets its own task.
    pub fn spawn(&self, document: &str) -> Result<RasterTask, DecodeError> {
        let runtime = Handle::try_current().map_err(|e| DecodeError::Backend(e.to_string()))?;
        let backend = Arc::clone(&self.backend);
        let document = document.to_owned();
        let handle = runtime.spawn_blocking(move || backend.decode(&document));
        Ok(RasterTask { handle })
    }

    #[tracing::instrument(level = "debug", skip_all, fields(bytes = document.len()))]
    pub async fn rasterize(&self, document: &str) -> Result<Bitmap, DecodeError> {
        let bitmap = self.spawn(document)?.await?;
        tracing::debug!(width = bitmap.width(), height = bitmap.height(), "rasterized");
        Ok(bitmap)
    }
}

/// Pending decode. Resolves exactly once; no partial bitmap is ever produced.
#[derive(Debug)]
pub struct RasterTask {
    handle: JoinHandle<Result<Bitmap, DecodeError>>,
}

impl RasterTask {
    /// Abandon the decode. Only a decode still queued for a blocking thread
    /// is stopped and resolves to `DecodeError::Cancelled`; one that has
    /// already started runs to completion and resolves with its own result.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for RasterTask {
    type Output = Result<Bitmap, DecodeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(err)) if err.is_cancelled() => Poll::Ready(Err(DecodeError::Cancelled)),
            Poll::Ready(Err(err)) => Poll::Ready(Err(DecodeError::Backend(err.to_string()))),
        }
    }
}
