//! PDF Assembly - One Page, One Embedded Raster
//!
//! The bitmap is PNG-encoded and its zlib stream is handed to the PDF
//! untouched: `FlateDecode` plus PNG predictor parameters reverse exactly
//! what the PNG encoder did. Alpha travels in a separate gray soft mask.

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref};
use thiserror::Error;

use crate::print::{LayoutError, PageLayout};
use crate::raster::Bitmap;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Per-row adaptive PNG filtering.
const PNG_OPTIMUM_PREDICTOR: i32 = 15;

const IMAGE_NAME: Name<'static> = Name(b"Im1");

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("png encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("malformed png stream: {0}")]
    Png(&'static str),

    #[error("invalid page layout: {0}")]
    Layout(#[from] LayoutError),
}

/// Encode 8-bit samples as a PNG file.
pub fn encode_png(
    samples: &[u8],
    width: u32,
    height: u32,
    color: ExtendedColorType,
) -> Result<Vec<u8>, AssemblyError> {
    let mut png = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut png, CompressionType::Best, FilterType::Adaptive);
    encoder.write_image(samples, width, height, color)?;
    Ok(png)
}

/// Concatenated IDAT payload of a PNG file: one zlib stream of filtered rows.
pub fn idat_stream(png: &[u8]) -> Result<Vec<u8>, AssemblyError> {
    let mut rest = png
        .strip_prefix(&PNG_SIGNATURE[..])
        .ok_or(AssemblyError::Png("missing signature"))?;
    let mut data = Vec::new();

    while rest.len() >= 12 {
        let len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        let kind = &rest[4..8];
        let end = 8usize
            .checked_add(len)
            .filter(|end| end + 4 <= rest.len())
            .ok_or(AssemblyError::Png("truncated chunk"))?;

        match kind {
            b"IHDR" if len >= 13 && rest[8 + 12] != 0 => {
                return Err(AssemblyError::Png("interlaced images are not supported"));
            }
            b"IDAT" => data.extend_from_slice(&rest[8..end]),
            b"IEND" => break,
            _ => {}
        }
        rest = &rest[end + 4..];
    }

    if data.is_empty() {
        return Err(AssemblyError::Png("no image data"));
    }
    Ok(data)
}

fn png_samples(samples: &[u8], bitmap: &Bitmap, color: ExtendedColorType) -> Result<Vec<u8>, AssemblyError> {
    idat_stream(&encode_png(samples, bitmap.width(), bitmap.height(), color)?)
}

/// Serialize a single-page PDF showing `bitmap` at the layout's position.
pub fn assemble_pdf(bitmap: &Bitmap, layout: &PageLayout) -> Result<Vec<u8>, AssemblyError> {
    let layout = layout.validated()?;
    let (width, height) = (bitmap.width(), bitmap.height());

    let color = png_samples(&bitmap.rgb(), bitmap, ExtendedColorType::Rgb8)?;
    let alpha = if bitmap.is_opaque() {
        None
    } else {
        Some(png_samples(&bitmap.alpha(), bitmap, ExtendedColorType::L8)?)
    };

    let catalog_id = Ref::new(1);
    let page_tree_id = Ref::new(2);
    let page_id = Ref::new(3);
    let content_id = Ref::new(4);
    let image_id = Ref::new(5);
    let smask_id = Ref::new(6);

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(page_tree_id);
    pdf.pages(page_tree_id).kids([page_id]).count(1);

    let (media_w, media_h) = layout.media_box();
    let mut page = pdf.page(page_id);
    page.media_box(Rect::new(0.0, 0.0, media_w, media_h));
    page.parent(page_tree_id);
    page.contents(content_id);
    page.resources().x_objects().pair(IMAGE_NAME, image_id);
    page.finish();

    let mut image = pdf.image_xobject(image_id, &color);
    image.filter(Filter::FlateDecode);
    image.width(width as i32);
    image.height(height as i32);
    image.color_space().device_rgb();
    image.bits_per_component(8);
    image
        .insert(Name(b"DecodeParms"))
        .dict()
        .pair(Name(b"Predictor"), PNG_OPTIMUM_PREDICTOR)
        .pair(Name(b"Colors"), 3)
        .pair(Name(b"BitsPerComponent"), 8)
        .pair(Name(b"Columns"), width as i32);
    if alpha.is_some() {
        image.s_mask(smask_id);
    }
    image.finish();

    if let Some(alpha) = &alpha {
        let mut mask = pdf.image_xobject(smask_id, alpha);
        mask.filter(Filter::FlateDecode);
        mask.width(width as i32);
        mask.height(height as i32);
        mask.color_space().device_gray();
        mask.bits_per_component(8);
        mask.insert(Name(b"DecodeParms"))
            .dict()
            .pair(Name(b"Predictor"), PNG_OPTIMUM_PREDICTOR)
            .pair(Name(b"Colors"), 1)
            .pair(Name(b"BitsPerComponent"), 8)
            .pair(Name(b"Columns"), width as i32);
        mask.finish();
    }

    let placement = layout.placement(width, height);
    let mut content = Content::new();
    content.save_state();
    content.transform([placement.width, 0.0, 0.0, placement.height, placement.x, placement.y]);
    content.x_object(IMAGE_NAME);
    content.restore_state();
    pdf.stream(content_id, &content.finish());

    Ok(pdf.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle.as_bytes())
    }

    #[test]
    fn test_idat_stream_is_zlib() {
        let png = encode_png(&[255, 0, 0, 0, 255, 0], 2, 1, ExtendedColorType::Rgb8).unwrap();
        let idat = idat_stream(&png).unwrap();
        // zlib header: deflate method, window size nibble, header checksum
        assert_eq!(idat[0] & 0x0f, 8);
        assert_eq!(((idat[0] as u16) << 8 | idat[1] as u16) % 31, 0);
    }

    #[test]
    fn test_idat_stream_rejects_garbage() {
        assert!(matches!(idat_stream(b"not a png"), Err(AssemblyError::Png(_))));
        assert!(matches!(idat_stream(&PNG_SIGNATURE), Err(AssemblyError::Png("no image data"))));
    }

    #[test]
    fn test_opaque_bitmap_has_no_soft_mask() {
        let bitmap = Bitmap::from_rgba(2, 2, vec![10, 20, 30, 255].repeat(4)).unwrap();
        let bytes = assemble_pdf(&bitmap, &PageLayout::default()).unwrap();

        assert!(bytes.starts_with(b"%PDF-"));
        assert!(contains(&bytes, "/Subtype /Image"));
        assert!(contains(&bytes, "/Predictor 15"));
        assert!(contains(&bytes, "/Im1 Do"));
        assert!(!contains(&bytes, "/SMask"));
    }

    #[test]
    fn test_transparent_bitmap_carries_soft_mask() {
        let bitmap = Bitmap::from_rgba(2, 1, vec![10, 20, 30, 0, 10, 20, 30, 128]).unwrap();
        let bytes = assemble_pdf(&bitmap, &PageLayout::default()).unwrap();
        assert!(contains(&bytes, "/SMask 6 0 R"));
        assert!(contains(&bytes, "/DeviceGray"));
    }

    #[test]
    fn test_invalid_layout_is_an_assembly_error() {
        let bitmap = Bitmap::from_rgba(1, 1, vec![0, 0, 0, 255]).unwrap();
        let layout = PageLayout { width_mm: -1.0, ..Default::default() };
        assert!(matches!(assemble_pdf(&bitmap, &layout), Err(AssemblyError::Layout(_))));
    }
}
