//! PDF handling: a text-PDF fast path (embedded text extraction via
//! `pdf-extract`) and an image-PDF path for scanned documents. The image
//! path extracts embedded raster images per page via `lopdf` rather than
//! full page rendering — no renderer crate (`pdfium-render`, `mupdf`)
//! appears anywhere in the retrieved corpus, and those pull in native
//! library dependencies that don't belong in this transformation (see
//! DESIGN.md). Scanned documents are, in practice, one embedded JPEG per
//! page, which this covers; pages with vector-only content beyond an
//! extractable image are logged and skipped.

use lopdf::Document;

use crate::ocr_engine::{OcrEngine, OcrEngineError};

const TEXT_PDF_MIN_CHARS: usize = 20;

#[derive(Debug, Clone, thiserror::Error)]
pub enum PdfError {
    #[error("failed to parse PDF: {0}")]
    Parse(String),
    #[error("failed to extract text: {0}")]
    TextExtraction(String),
}

pub enum PdfContent {
    /// Embedded text was sufficient to skip OCR entirely.
    Text(String),
    /// One JPEG buffer per page, in page order, for the OCR engine.
    Images(Vec<Vec<u8>>),
}

pub fn classify_and_extract(bytes: &[u8]) -> Result<PdfContent, PdfError> {
    if let Ok(text) = pdf_extract::extract_text_from_mem(bytes) {
        if text.chars().filter(|c| !c.is_whitespace()).count() >= TEXT_PDF_MIN_CHARS {
            return Ok(PdfContent::Text(text));
        }
    }

    extract_page_images(bytes).map(PdfContent::Images)
}

fn extract_page_images(bytes: &[u8]) -> Result<Vec<Vec<u8>>, PdfError> {
    let doc = Document::load_mem(bytes).map_err(|e| PdfError::Parse(e.to_string()))?;
    let pages = doc.get_pages();

    let mut images = Vec::with_capacity(pages.len());
    for (page_num, page_id) in pages {
        match extract_first_image(&doc, page_id) {
            Some(jpeg_bytes) => images.push(jpeg_bytes),
            None => {
                tracing::warn!(page_num, "no extractable raster image on PDF page, skipping");
            }
        }
    }
    Ok(images)
}

fn extract_first_image(doc: &Document, page_id: (u32, u16)) -> Option<Vec<u8>> {
    let dict = doc.get_dictionary(page_id).ok()?;
    let resources_id = dict.get(b"Resources").ok()?;
    let resources = doc
        .get_dictionary(resources_id.as_reference().ok()?)
        .or_else(|_| resources_id.as_dict())
        .ok()?;
    let xobjects = doc
        .get_dictionary(resources.get(b"XObject").ok()?.as_reference().ok()?)
        .ok()?;

    for (_name, xobj_ref) in xobjects.iter() {
        let Ok(obj_id) = xobj_ref.as_reference() else { continue };
        let Ok(object) = doc.get_object(obj_id) else { continue };
        let Ok(stream) = object.as_stream() else { continue };

        let is_image = stream
            .dict
            .get(b"Subtype")
            .and_then(|v| v.as_name())
            .map(|n| n == b"Image")
            .unwrap_or(false);
        if !is_image {
            continue;
        }

        let is_jpeg = stream
            .dict
            .get(b"Filter")
            .and_then(|v| v.as_name())
            .map(|n| n == b"DCTDecode")
            .unwrap_or(false);

        if is_jpeg {
            return Some(stream.content.clone());
        }
    }

    None
}

pub async fn recognize_pages(
    engine: &dyn OcrEngine,
    pages: &[Vec<u8>],
    language: &str,
    page_concurrency: usize,
) -> Result<Vec<crate::ocr_engine::OcrPage>, OcrEngineError> {
    use futures_util::stream::{self, StreamExt};

    let results: Vec<Result<crate::ocr_engine::OcrPage, OcrEngineError>> = stream::iter(pages)
        .map(|page_bytes| async move { engine.recognize_page(page_bytes, language).await })
        .buffered(page_concurrency.max(1))
        .collect()
        .await;

    let mut ok_pages = Vec::with_capacity(results.len());
    for (idx, result) in results.into_iter().enumerate() {
        match result {
            Ok(page) => ok_pages.push(page),
            Err(e) => tracing::warn!(page = idx, error = %e, "page OCR failed, skipping"),
        }
    }
    Ok(ok_pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_bytes() {
        let result = extract_page_images(b"not a pdf");
        assert!(result.is_err());
    }
}
