//! Content-type detection by magic bytes. The client's declared content-type
//! is never trusted; this is the only source of truth for what a stored
//! artifact actually is.

const PDF_MAGIC: &[u8] = b"%PDF-";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];
const GIF_MAGIC: &[u8] = b"GIF8";

/// Inspects up to the first bytes of a buffer and returns a MIME type.
/// Zip-based office formats (docx/xlsx/pptx) and plain zip both sniff as
/// `application/zip`; callers that need the distinction use the declared
/// extension as a tiebreaker, never as the sole source of truth.
pub fn sniff(buf: &[u8]) -> &'static str {
    if buf.starts_with(PDF_MAGIC) {
        "application/pdf"
    } else if buf.starts_with(ZIP_MAGIC) {
        "application/zip"
    } else if buf.starts_with(JPEG_MAGIC) {
        "image/jpeg"
    } else if buf.starts_with(PNG_MAGIC) {
        "image/png"
    } else if buf.starts_with(GIF_MAGIC) {
        "image/gif"
    } else if std::str::from_utf8(buf).is_ok() {
        "text/plain"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_pdf() {
        assert_eq!(sniff(b"%PDF-1.7\n..."), "application/pdf");
    }

    #[test]
    fn sniffs_zip_based_office_formats() {
        assert_eq!(sniff(b"PK\x03\x04rest-of-docx"), "application/zip");
    }

    #[test]
    fn falls_back_to_octet_stream() {
        assert_eq!(sniff(&[0x00, 0x01, 0x02, 0xFE]), "application/octet-stream");
    }
}
