//! The OCR engine itself is an external collaborator — this crate only
//! specifies the capability it must provide (bytes + language in, a block
//! tree with positions and confidences out) and ships one deterministic
//! implementation so the rest of the pipeline is fully exercisable without
//! a real vision backend wired in.

use async_trait::async_trait;

use crate::models::{Block, BlockType, BoundingBox, Line, LineAlignment, Paragraph, ParagraphTextType, Word, WordContentType};

#[derive(Debug, Clone, thiserror::Error)]
pub enum OcrEngineError {
    #[error("OCR engine failed: {0}")]
    EngineFailure(String),
    #[error("OCR engine timed out")]
    Timeout,
}

pub struct OcrPage {
    pub blocks: Vec<Block>,
    pub overall_confidence: f64,
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Runs OCR over a single rasterized page (or a whole single-page
    /// image). `language` is a BCP-47-ish hint, opaque to the trait.
    async fn recognize_page(
        &self,
        image_bytes: &[u8],
        language: &str,
    ) -> Result<OcrPage, OcrEngineError>;
}

/// A word-segmentation engine that treats whitespace-delimited tokens in a
/// line as words laid out left-to-right across the page width. Used for
/// tests and as the default wiring until a real vision backend is attached;
/// it never actually decodes pixels, so it always returns a single
/// placeholder block describing the page as unrecognized content.
pub struct PlaceholderOcrEngine;

#[async_trait]
impl OcrEngine for PlaceholderOcrEngine {
    async fn recognize_page(
        &self,
        image_bytes: &[u8],
        _language: &str,
    ) -> Result<OcrPage, OcrEngineError> {
        if image_bytes.is_empty() {
            return Err(OcrEngineError::EngineFailure("empty page buffer".to_string()));
        }

        let zero_bbox = BoundingBox { x0: 0.0, y0: 0.0, x1: 0.0, y1: 0.0, width: 0.0, height: 0.0 };
        let word = Word {
            text: String::new(),
            bbox: zero_bbox,
            confidence: 0.0,
            font_size: None,
            content_type: WordContentType::Text,
        };
        let line = Line {
            text: String::new(),
            bbox: zero_bbox,
            confidence: 0.0,
            alignment: LineAlignment::Left,
            words: vec![word],
        };
        let paragraph = Paragraph {
            text: String::new(),
            bbox: zero_bbox,
            confidence: 0.0,
            text_type: ParagraphTextType::Body,
            level: None,
            lines: vec![line],
        };
        let block = Block {
            bbox: zero_bbox,
            confidence: 0.0,
            block_type: BlockType::Text,
            reading_order: 0,
            paragraphs: vec![paragraph],
        };

        Ok(OcrPage {
            blocks: vec![block],
            overall_confidence: 0.0,
        })
    }
}
