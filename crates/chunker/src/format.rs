use crate::error::{ChunkerError, Result};
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, GBK};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};
use std::path::Path;

/// Source document formats the chunker can read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    /// Plain text with charset sniffing
    Text,
    /// Markdown, read verbatim
    Markdown,
    /// Word processing document (.docx), paragraph text
    Docx,
    /// Page-oriented document (.pdf), page text concatenated
    Pdf,
}

impl DocumentFormat {
    /// Format for a file extension (without the dot, any case)
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            "docx" => Some(Self::Docx),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Format for a path, or `UnsupportedFormat`
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        Self::from_extension(ext).ok_or_else(|| {
            ChunkerError::unsupported_format(if ext.is_empty() {
                path.display().to_string()
            } else {
                format!(".{ext}")
            })
        })
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Docx => "docx",
            Self::Pdf => "pdf",
        }
    }

    /// Extract text from raw document bytes
    pub fn extract(self, bytes: &[u8]) -> Result<String> {
        match self {
            Self::Text | Self::Markdown => Ok(decode_text(bytes)),
            Self::Docx => extract_docx(bytes),
            Self::Pdf => extract_pdf(bytes),
        }
    }
}

/// Decode text bytes of unknown encoding.
///
/// Order: byte-order mark, sniffed charset, UTF-8, then GBK with replacement characters.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let guessed = detector.guess(None, true);
    if let Some(text) = guessed.decode_without_bom_handling_and_without_replacement(bytes) {
        return text.into_owned();
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_owned();
    }

    let (text, _, had_errors) = GBK.decode(bytes);
    if had_errors {
        log::debug!("Lossy GBK decode after {} sniffing failed", guessed.name());
    }
    text.into_owned()
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|err| ChunkerError::extraction("docx", err))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|err| ChunkerError::extraction("docx", err))?
        .read_to_string(&mut xml)?;
    paragraphs_from_document_xml(&xml)
}

/// Paragraph texts of a WordprocessingML body, one per line, empty paragraphs skipped.
fn paragraphs_from_document_xml(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) if tag.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::End(tag)) => match tag.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    if !current.is_empty() {
                        paragraphs.push(std::mem::take(&mut current));
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(tag)) => match tag.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(text)) if in_text => {
                let unescaped = text
                    .unescape()
                    .map_err(|err| ChunkerError::extraction("docx", err))?;
                current.push_str(&unescaped);
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(ChunkerError::extraction("docx", err)),
            _ => {}
        }
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    Ok(paragraphs.join("\n"))
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let document =
        lopdf::Document::load_mem(bytes).map_err(|err| ChunkerError::extraction("pdf", err))?;

    let mut pages = Vec::new();
    for page_number in document.get_pages().keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) => pages.push(text),
            Err(err) => log::warn!("Skipping unreadable PDF page {page_number}: {err}"),
        }
    }

    Ok(pages.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn detects_formats_from_extension() {
        assert_eq!(DocumentFormat::from_path("a/b.TXT").unwrap(), DocumentFormat::Text);
        assert_eq!(
            DocumentFormat::from_path("notes.markdown").unwrap(),
            DocumentFormat::Markdown
        );
        assert_eq!(DocumentFormat::from_path("x.docx").unwrap(), DocumentFormat::Docx);
        assert_eq!(DocumentFormat::from_path("x.pdf").unwrap(), DocumentFormat::Pdf);
    }

    #[test]
    fn rejects_unsupported_extensions() {
        let err = DocumentFormat::from_path("image.png").unwrap_err();
        assert!(matches!(err, ChunkerError::UnsupportedFormat(ref ext) if ext == ".png"));
        assert!(DocumentFormat::from_path("Makefile").is_err());
    }

    #[test]
    fn decodes_utf8() {
        assert_eq!(decode_text("héllo 世界".as_bytes()), "héllo 世界");
    }

    #[test]
    fn decodes_utf8_with_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"hello");
        assert_eq!(decode_text(&bytes), "hello");
    }

    #[test]
    fn decodes_gbk_text() {
        let source = "这是一个中文文档，用于测试编码检测。我们希望能够正确地读取它的内容。".repeat(4);
        let (encoded, _, _) = GBK.encode(&source);
        assert!(std::str::from_utf8(&encoded).is_err());
        assert_eq!(decode_text(&encoded), source);
    }

    #[test]
    fn extracts_docx_paragraphs() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>First</w:t></w:r><w:r><w:t xml:space="preserve"> paragraph &amp; more</w:t></w:r></w:p>
    <w:p></w:p>
    <w:p><w:r><w:t>Second</w:t><w:tab/><w:t>tabbed</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let text = DocumentFormat::Docx.extract(&docx_bytes(xml)).unwrap();
        assert_eq!(text, "First paragraph & more\nSecond\ttabbed");
    }

    #[test]
    fn docx_rejects_non_zip_bytes() {
        let err = DocumentFormat::Docx.extract(b"not a zip").unwrap_err();
        assert!(matches!(err, ChunkerError::Extraction { format: "docx", .. }));
    }

    #[test]
    fn invalid_pdf_fails() {
        let err = DocumentFormat::Pdf.extract(b"%PDF-garbage").unwrap_err();
        assert!(matches!(err, ChunkerError::Extraction { format: "pdf", .. }));
    }
}
