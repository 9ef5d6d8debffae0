//! File content validation gate. Pure, synchronous, no I/O beyond the bytes
//! handed to it — mirrors the decode-then-classify shape of
//! `ssokolow-verify_files`'s `builtin_handlers::image`, generalized to the
//! set of formats this service accepts and to PDF structural checks.

use std::io::Cursor;
use std::net::IpAddr;

use image::ImageReader;

pub const MAX_FILE_SIZE_BYTES: usize = 50 * 1024 * 1024;
const MAX_IMAGE_DIMENSION: u32 = 50_000;
const MAX_IMAGE_PIXELS: u64 = 178_956_970;
const MIN_PDF_PAGES: usize = 1;
const MAX_PDF_PAGES: usize = 500;
const PDF_SCAN_WINDOW: usize = 1024 * 1024;

const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/tiff",
    "image/bmp",
    "image/webp",
    "application/pdf",
];

#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("file exceeds the {} MiB size limit", MAX_FILE_SIZE_BYTES / 1024 / 1024)]
    FileTooLarge,
    #[error("file content type could not be determined")]
    UnknownType,
    #[error("file type '{0}' is not supported")]
    UnsupportedType(String),
    #[error("claimed type '{claimed}' does not match detected type '{detected}'")]
    TypeMismatch { claimed: String, detected: String },
    #[error("image could not be decoded: {0}")]
    MalformedImage(String),
    #[error("encrypted PDFs are not supported")]
    EncryptedPdf,
    #[error("PDF has {0} pages, outside the supported range of {MIN_PDF_PAGES}-{MAX_PDF_PAGES}")]
    PdfPageCountOutOfRange(usize),
    #[error("PDF could not be parsed: {0}")]
    PdfParseFailed(String),
}

#[derive(Debug, Clone)]
pub struct ValidatedFile {
    pub detected_mime: String,
    pub page_count: Option<u32>,
}

/// Normalizes loose client-supplied MIME aliases to the canonical form used
/// throughout the rest of the pipeline.
fn normalize_mime(mime: &str) -> String {
    match mime.to_ascii_lowercase().as_str() {
        "image/jpg" => "image/jpeg".to_string(),
        "image/tif" => "image/tiff".to_string(),
        other => other.to_string(),
    }
}

pub fn validate_file(bytes: &[u8], claimed_mime: &str) -> Result<ValidatedFile, ValidationError> {
    if bytes.len() > MAX_FILE_SIZE_BYTES {
        return Err(ValidationError::FileTooLarge);
    }

    let detected_mime = infer::get(bytes)
        .map(|kind| kind.mime_type().to_string())
        .ok_or(ValidationError::UnknownType)?;

    if !ALLOWED_MIME_TYPES.contains(&detected_mime.as_str()) {
        return Err(ValidationError::UnsupportedType(detected_mime));
    }

    let claimed_normalized = normalize_mime(claimed_mime);
    if claimed_normalized != detected_mime {
        return Err(ValidationError::TypeMismatch {
            claimed: claimed_normalized,
            detected: detected_mime,
        });
    }

    let page_count = if detected_mime == "application/pdf" {
        Some(validate_pdf(bytes)?)
    } else {
        validate_image(bytes)?;
        None
    };

    Ok(ValidatedFile {
        detected_mime,
        page_count,
    })
}

fn validate_image(bytes: &[u8]) -> Result<(), ValidationError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ValidationError::MalformedImage(e.to_string()))?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ValidationError::MalformedImage(e.to_string()))?;

    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(ValidationError::MalformedImage(format!(
            "dimensions {width}x{height} exceed the {MAX_IMAGE_DIMENSION}px limit"
        )));
    }
    if (width as u64) * (height as u64) > MAX_IMAGE_PIXELS {
        return Err(ValidationError::MalformedImage(format!(
            "{width}x{height} ({} px) exceeds the {MAX_IMAGE_PIXELS} pixel limit",
            width as u64 * height as u64
        )));
    }

    // Trial decode + downscale confirms the pixel data is actually
    // reconstructible, not just that the header parses.
    let image = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ValidationError::MalformedImage(e.to_string()))?
        .decode()
        .map_err(|e| ValidationError::MalformedImage(e.to_string()))?;
    let _thumbnail = image.thumbnail(64, 64);

    Ok(())
}

fn validate_pdf(bytes: &[u8]) -> Result<u32, ValidationError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| ValidationError::PdfParseFailed(e.to_string()))?;

    if doc.is_encrypted() {
        return Err(ValidationError::EncryptedPdf);
    }

    let page_count = doc.get_pages().len();
    if !(MIN_PDF_PAGES..=MAX_PDF_PAGES).contains(&page_count) {
        return Err(ValidationError::PdfPageCountOutOfRange(page_count));
    }

    let scan_len = bytes.len().min(PDF_SCAN_WINDOW);
    for token in [&b"/JavaScript"[..], b"/JS", b"/OpenAction", b"/AA"] {
        if contains_subslice(&bytes[..scan_len], token) {
            tracing::warn!(
                token = %String::from_utf8_lossy(token),
                "PDF contains an active-content token in its first scan window"
            );
        }
    }

    Ok(page_count as u32)
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

// ---------------------------------------------------------------------------
// Webhook URL validation (best-effort SSRF defense, literal checks only)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum WebhookUrlError {
    #[error("webhook URL is not a valid URL")]
    Malformed,
    #[error("webhook URL scheme must be http or https")]
    UnsupportedScheme,
    #[error("webhook URL host is not permitted")]
    BlockedHost,
}

const BLOCKED_HOSTNAMES: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0", "::1"];

pub fn validate_webhook_url(raw: &str) -> Result<(), WebhookUrlError> {
    let url = url::Url::parse(raw).map_err(|_| WebhookUrlError::Malformed)?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(WebhookUrlError::UnsupportedScheme);
    }

    let host = url.host_str().ok_or(WebhookUrlError::Malformed)?;

    if BLOCKED_HOSTNAMES.contains(&host) {
        return Err(WebhookUrlError::BlockedHost);
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_blocked_ip(ip) {
            return Err(WebhookUrlError::BlockedHost);
        }
    }

    Ok(())
}

fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            // 10.0.0.0/8
            octets[0] == 10
                // 172.16.0.0/12
                || (octets[0] == 172 && (16..=31).contains(&octets[1]))
                // 192.168.0.0/16
                || (octets[0] == 192 && octets[1] == 168)
                // 169.254.0.0/16 (link-local / cloud metadata)
                || (octets[0] == 169 && octets[1] == 254)
        }
        IpAddr::V6(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_file() {
        let bytes = vec![0u8; MAX_FILE_SIZE_BYTES + 1];
        assert!(matches!(
            validate_file(&bytes, "image/png"),
            Err(ValidationError::FileTooLarge)
        ));
    }

    #[test]
    fn rejects_undetectable_type() {
        let bytes = vec![0u8; 16];
        assert!(matches!(
            validate_file(&bytes, "image/png"),
            Err(ValidationError::UnknownType)
        ));
    }

    #[test]
    fn normalizes_jpg_alias() {
        assert_eq!(normalize_mime("image/jpg"), "image/jpeg");
        assert_eq!(normalize_mime("image/tif"), "image/tiff");
        assert_eq!(normalize_mime("application/pdf"), "application/pdf");
    }

    #[test]
    fn webhook_url_blocks_literal_loopback() {
        assert!(validate_webhook_url("http://127.0.0.1/hook").is_err());
        assert!(validate_webhook_url("http://localhost:3000/hook").is_err());
    }

    #[test]
    fn webhook_url_accepts_nearby_non_loopback_ip() {
        // Only the literal 127.0.0.1 is blocked, not the whole 127.0.0.0/8 block.
        assert!(validate_webhook_url("http://127.0.0.2/hook").is_ok());
    }

    #[test]
    fn webhook_url_blocks_private_ranges() {
        assert!(validate_webhook_url("http://10.1.2.3/hook").is_err());
        assert!(validate_webhook_url("http://172.16.0.5/hook").is_err());
        assert!(validate_webhook_url("http://192.168.1.1/hook").is_err());
        assert!(validate_webhook_url("http://169.254.169.254/hook").is_err());
    }

    #[test]
    fn webhook_url_accepts_public_https() {
        assert!(validate_webhook_url("https://example.com/hook").is_ok());
    }

    #[test]
    fn webhook_url_rejects_non_http_scheme() {
        assert!(matches!(
            validate_webhook_url("ftp://example.com/hook"),
            Err(WebhookUrlError::UnsupportedScheme)
        ));
    }
}
