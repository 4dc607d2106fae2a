//! File signature sniffing and text decoding.
//!
//! Only plain text is ingested. Files whose leading bytes match a known
//! binary signature are skipped; text files are decoded from UTF-8 (with or
//! without BOM) or UTF-16 with BOM.

/// What the leading bytes of a file say about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Byte-order-marked or signature-free content that may be text
    Text(TextEncoding),
    /// A known binary format, by conventional extension
    Binary(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    Utf32Be,
}

const TEXT_BOMS: &[(&[u8], TextEncoding)] = &[
    (&[0x00, 0x00, 0xFE, 0xFF], TextEncoding::Utf32Be),
    (&[0xEF, 0xBB, 0xBF], TextEncoding::Utf8Bom),
    (&[0xFF, 0xFE], TextEncoding::Utf16Le),
    (&[0xFE, 0xFF], TextEncoding::Utf16Be),
];

const BINARY_SIGNATURES: &[(&str, &[u8])] = &[
    ("gif", &[0x47, 0x49, 0x46, 0x38]),
    ("png", &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
    ("jpeg", &[0xFF, 0xD8, 0xFF]),
    (
        "jpeg2000",
        &[0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20, 0x0D, 0x0A, 0x87, 0x0A],
    ),
    ("zip", &[0x50, 0x4B, 0x03, 0x04]),
    ("zip", &[0x50, 0x4B, 0x05, 0x06]),
    ("zip", &[0x50, 0x4B, 0x07, 0x08]),
    ("zip", &[0x50, 0x4B, 0x4C, 0x49, 0x54, 0x45]),
    ("zip", &[0x50, 0x4B, 0x53, 0x70, 0x58]),
    ("zip", &[0x57, 0x69, 0x6E, 0x5A, 0x69, 0x70]),
    ("pdf", &[0x25, 0x50, 0x44, 0x46]),
    ("z", &[0x1F, 0x9D]),
    ("z", &[0x1F, 0xA0]),
    ("gz", &[0x1F, 0x8B]),
    ("tar", &[0x75, 0x73, 0x74, 0x61, 0x72, 0x00, 0x30, 0x30]),
    ("tar", &[0x75, 0x73, 0x74, 0x61, 0x72, 0x20, 0x20, 0x00]),
    ("tiff", &[0x49, 0x49, 0x2A, 0x00]),
    ("tiff", &[0x4D, 0x4D, 0x00, 0x2A]),
    ("rar", &[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x00]),
    ("rar", &[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x01, 0x00]),
    ("7z", &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C]),
    ("mp3", &[0xFF, 0xFB]),
    ("mp3", &[0xFF, 0xF3]),
    ("mp3", &[0xFF, 0xF2]),
    ("mp3", &[0x49, 0x44, 0x33]),
];

/// Classify content by its leading bytes.
pub fn sniff(bytes: &[u8]) -> FileKind {
    if let Some((_, encoding)) = TEXT_BOMS.iter().find(|(bom, _)| bytes.starts_with(bom)) {
        return FileKind::Text(*encoding);
    }

    if let Some((ext, _)) = BINARY_SIGNATURES
        .iter()
        .find(|(_, sig)| bytes.starts_with(sig))
    {
        return FileKind::Binary(*ext);
    }

    FileKind::Text(TextEncoding::Utf8)
}

/// Decode file content to a string, or `None` when it is not text.
pub fn decode_text(bytes: &[u8]) -> Option<String> {
    match sniff(bytes) {
        FileKind::Binary(_) => None,
        FileKind::Text(TextEncoding::Utf8) => {
            // NUL bytes do not occur in text files
            if bytes.contains(&0) {
                return None;
            }
            String::from_utf8(bytes.to_vec()).ok()
        }
        FileKind::Text(TextEncoding::Utf8Bom) => String::from_utf8(bytes[3..].to_vec()).ok(),
        FileKind::Text(TextEncoding::Utf16Le) => decode_utf16(&bytes[2..], u16::from_le_bytes),
        FileKind::Text(TextEncoding::Utf16Be) => decode_utf16(&bytes[2..], u16::from_be_bytes),
        FileKind::Text(TextEncoding::Utf32Be) => {
            let units = bytes[4..].chunks_exact(4).map(|c| {
                char::from_u32(u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            });
            units.collect()
        }
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_signatures() {
        assert_eq!(sniff(b"%PDF-1.7 ..."), FileKind::Binary("pdf"));
        assert_eq!(sniff(&[0x50, 0x4B, 0x03, 0x04, 0x14]), FileKind::Binary("zip"));
        assert_eq!(
            sniff(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00]),
            FileKind::Binary("png")
        );
        assert_eq!(sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), FileKind::Binary("jpeg"));
    }

    #[test]
    fn test_plain_ascii_is_text() {
        assert_eq!(sniff(b"hello"), FileKind::Text(TextEncoding::Utf8));
        assert_eq!(decode_text(b"hello\nworld").as_deref(), Some("hello\nworld"));
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let bytes = [&[0xEF, 0xBB, 0xBF][..], "привет".as_bytes()].concat();
        assert_eq!(decode_text(&bytes).as_deref(), Some("привет"));
    }

    #[test]
    fn test_utf16_le_and_be() {
        let mut le = vec![0xFF, 0xFE];
        let mut be = vec![0xFE, 0xFF];
        for unit in "héllo".encode_utf16() {
            le.extend_from_slice(&unit.to_le_bytes());
            be.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_text(&le).as_deref(), Some("héllo"));
        assert_eq!(decode_text(&be).as_deref(), Some("héllo"));
    }

    #[test]
    fn test_invalid_utf8_and_nul_are_rejected() {
        assert_eq!(decode_text(&[0x66, 0x6F, 0xC3, 0x28]), None);
        assert_eq!(decode_text(b"abc\0def"), None);
        assert_eq!(decode_text(b"%PDF-1.4"), None);
    }
}
