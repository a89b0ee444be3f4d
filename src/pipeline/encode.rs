//! PDF encoding: [`PagedArtifact`] → PDF bytes.
//!
//! Each raster page becomes one PDF page of the artifact's physical size with
//! the page image drawn full-bleed. Images are stored as baseline JPEG
//! (`DCTDecode`), which PDF readers decode natively; invoice pages are mostly
//! flat white so they compress to a few tens of kilobytes each.

use crate::error::{InvoiceError, Result};
use crate::pipeline::assemble::PagedArtifact;
use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::{RgbImage, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tracing::debug;

const POINTS_PER_MM: f64 = 72.0 / 25.4;

/// Serialise `artifact` into a PDF document.
pub fn to_pdf(artifact: &PagedArtifact, jpeg_quality: u8) -> Result<Vec<u8>> {
    let fail = |detail: String| InvoiceError::PdfEncodingFailed {
        file_name: artifact.file_name.clone(),
        detail,
    };
    if artifact.pages.is_empty() {
        return Err(InvoiceError::EmptyArtifact {
            record: artifact.record_id.clone(),
        });
    }

    let width_pt = (artifact.page_width_mm * POINTS_PER_MM) as f32;
    let height_pt = (artifact.page_height_mm * POINTS_PER_MM) as f32;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(artifact.pages.len());

    for page in &artifact.pages {
        let jpeg = encode_jpeg(&page.image, jpeg_quality).map_err(|e| fail(e.to_string()))?;
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => page.image.width() as i64,
                "Height" => page.image.height() as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        width_pt.into(),
                        0.into(),
                        0.into(),
                        height_pt.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().map_err(|e| fail(e.to_string()))?,
        ));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width_pt.into(), height_pt.into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| fail(e.to_string()))?;
    debug!(
        "Encoded {} → {} page(s), {} bytes",
        artifact.file_name,
        count,
        out.len()
    );
    Ok(out)
}

/// Encode one page image as JPEG, dropping the alpha channel.
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> std::result::Result<Vec<u8>, image::ImageError> {
    let rgb: RgbImage = image.convert();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&rgb)?;
    Ok(buf)
}
