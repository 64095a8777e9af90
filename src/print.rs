//! Page Layout - Where the Raster Lands on the Page
//!
//! All user-facing measurements are millimetres measured from the top-left
//! corner of the page. PDF user space is points from the bottom-left, so
//! conversion happens here and nowhere else.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// PDF points per millimetre.
pub const PT_PER_MM: f32 = 72.0 / 25.4;

#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("{0} must be a positive, finite length (got {1})")]
    NonPositive(&'static str, f32),

    #[error("image offset ({0}mm, {1}mm) lies outside the page")]
    OffsetOutsidePage(f32, f32),
}

/// Single-page layout for the raster-embedding export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct PageLayout {
    pub width_mm: f32,
    pub height_mm: f32,
    pub offset_x_mm: f32,
    pub offset_y_mm: f32,
    /// Height follows from the bitmap's aspect ratio.
    pub image_width_mm: f32,
}

impl Default for PageLayout {
    /// A4 portrait, image 100mm wide at 10mm/10mm.
    fn default() -> Self {
        Self {
            width_mm: 210.0,
            height_mm: 297.0,
            offset_x_mm: 10.0,
            offset_y_mm: 10.0,
            image_width_mm: 100.0,
        }
    }
}

/// Image rectangle in PDF points, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageLayout {
    /// Check user-provided measurements.
    pub fn validated(self) -> Result<Self, LayoutError> {
        for (name, value) in [
            ("page width", self.width_mm),
            ("page height", self.height_mm),
            ("image width", self.image_width_mm),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(LayoutError::NonPositive(name, value));
            }
        }

        let inside = |offset: f32, extent: f32| offset.is_finite() && (0.0..extent).contains(&offset);
        if !inside(self.offset_x_mm, self.width_mm) || !inside(self.offset_y_mm, self.height_mm) {
            return Err(LayoutError::OffsetOutsidePage(self.offset_x_mm, self.offset_y_mm));
        }

        Ok(self)
    }

    pub fn media_box(&self) -> (f32, f32) {
        (self.width_mm * PT_PER_MM, self.height_mm * PT_PER_MM)
    }

    /// Image height in millimetres for a bitmap of `pixel_width` x `pixel_height`.
    pub fn image_height_mm(&self, pixel_width: u32, pixel_height: u32) -> f32 {
        self.image_width_mm * (pixel_height as f32 / pixel_width.max(1) as f32)
    }

    pub fn placement(&self, pixel_width: u32, pixel_height: u32) -> Placement {
        let height_mm = self.image_height_mm(pixel_width, pixel_height);
        Placement {
            x: self.offset_x_mm * PT_PER_MM,
            y: (self.height_mm - self.offset_y_mm - height_mm) * PT_PER_MM,
            width: self.image_width_mm * PT_PER_MM,
            height: height_mm * PT_PER_MM,
        }
    }
}
