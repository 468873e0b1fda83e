use std::path::Path;

use thiserror::Error;

use parser::backend::{LopdfBackend, PageId, PdfBackend};

pub mod images;
pub mod parser;
pub mod structure;
pub mod text;
pub mod types;

pub use structure::classify;
pub use types::*;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("cannot open PDF: {0}")]
    Open(String),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("Page not found: {0}")]
    PageNotFound(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An open PDF document.
///
/// Pages are addressed by their 0-based index. The underlying handle is
/// released when the value is dropped, so holding a `Document` in a scope is
/// enough to close it on every exit path.
pub struct Document {
    backend: LopdfBackend,
    /// Page object ids in page order, resolved once on open.
    page_ids: Vec<PageId>,
    source: String,
}

impl Document {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PdfError> {
        let path = path.as_ref();
        let doc = Self::new(LopdfBackend::load_path(path)?, path.display().to_string());
        log::debug!("opened {} ({} pages)", doc.source, doc.page_count());
        Ok(doc)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        Ok(Self::new(
            LopdfBackend::load_bytes(bytes)?,
            "<memory>".to_string(),
        ))
    }

    fn new(backend: LopdfBackend, source: String) -> Self {
        let page_ids = backend.pages().into_values().collect();
        Document {
            backend,
            page_ids,
            source,
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn metadata(&self) -> DocumentMetadata {
        let raw = self.backend.metadata();
        DocumentMetadata {
            title: raw.get("Title").cloned(),
            author: raw.get("Author").cloned(),
            page_count: self.page_count(),
            creator: raw.get("Creator").cloned(),
        }
    }

    fn page_id(&self, index: usize) -> Result<PageId, PdfError> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(PdfError::PageNotFound(index))
    }

    /// Styled text runs of one page, in content-stream order.
    pub fn page_spans(&self, index: usize) -> Result<Vec<TextSpan>, PdfError> {
        parser::spans::extract_page_spans(&self.backend, self.page_id(index)?, index)
    }

    pub fn page_blocks(&self, index: usize) -> Result<Vec<TextBlock>, PdfError> {
        Ok(parser::layout::layout_page(index, self.page_spans(index)?))
    }

    pub fn page_layout(&self, index: usize) -> Result<PageLayout, PdfError> {
        Ok(PageLayout {
            index,
            blocks: self.page_blocks(index)?,
        })
    }

    /// Decode every page. A page that fails does not stop the others.
    pub fn decode_pages(&self) -> Vec<Result<PageLayout, PdfError>> {
        (0..self.page_count()).map(|i| self.page_layout(i)).collect()
    }

    pub fn page_text(&self, index: usize) -> Result<String, PdfError> {
        Ok(text::page_text(&self.page_blocks(index)?))
    }

    /// Embedded images of one page, ready to be written out as files.
    pub fn page_images(&self, index: usize) -> Result<Vec<ImageData>, PdfError> {
        images::page_images(&self.backend, self.page_id(index)?, index)
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        log::debug!("closed {}", self.source);
    }
}

#[cfg(test)]
mod tests {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    use super::*;

    fn show(font: &str, size: i64, x: i64, y: i64, text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.into(), Object::Integer(size)]),
            Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    }

    /// One page: a 24pt bold title, three 12pt body lines, one 1x1 RGB image.
    fn sample_pdf() -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        });
        let image = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            vec![255, 0, 0],
        ));

        let mut operations = show("F2", 24, 72, 780, "Annual Report 2024");
        operations.extend(show("F1", 12, 72, 740, "Revenue grew across every region"));
        operations.extend(show("F1", 12, 72, 726, "while operating costs stayed flat"));
        operations.extend(show("F1", 12, 72, 712, "for the third year running"));
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => regular, "F2" => bold },
                "XObject" => dictionary! { "Im1" => image },
            },
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_decode_and_classify_in_memory_pdf() {
        let doc = Document::from_bytes(&sample_pdf()).unwrap();
        assert_eq!(doc.page_count(), 1);

        let pages: Vec<PageLayout> = doc
            .decode_pages()
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(pages[0].blocks.len(), 2);
        assert_eq!(pages[0].blocks[0].text(), "Annual Report 2024");
        assert!(pages[0].blocks[0].is_bold());

        let structure = classify(&pages);
        assert_eq!(
            structure.titles,
            vec![Heading {
                page: 1,
                text: "Annual Report 2024".into()
            }]
        );
        assert!(structure.sections.is_empty());
    }

    #[test]
    fn test_page_text_lines() {
        let doc = Document::from_bytes(&sample_pdf()).unwrap();
        let text = doc.page_text(0).unwrap();
        assert!(text.starts_with("Annual Report 2024\nRevenue grew"));
        assert!(text.ends_with("third year running"));
    }

    #[test]
    fn test_page_images_reencoded_as_png() {
        let doc = Document::from_bytes(&sample_pdf()).unwrap();
        let images = doc.page_images(0).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id.as_str(), "Im1");
        assert_eq!(images[0].format, ImageFormat::Png);
        assert!(images[0].bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn test_page_ids_resolved_once_in_page_order() {
        let doc = Document::from_bytes(&sample_pdf()).unwrap();
        let expected: Vec<PageId> = doc.backend.pages().into_values().collect();
        assert_eq!(doc.page_ids, expected);
        assert_eq!(doc.page_count(), 1);
        assert!(doc.page_spans(0).is_ok());
    }

    #[test]
    fn test_page_out_of_range() {
        let doc = Document::from_bytes(&sample_pdf()).unwrap();
        assert!(matches!(doc.page_spans(5), Err(PdfError::PageNotFound(5))));
    }

    #[test]
    fn test_open_missing_file_is_io_error() {
        let err = Document::open("/nonexistent/dir/file.pdf").err().unwrap();
        assert!(matches!(err, PdfError::Io(_)));
    }

    #[test]
    fn test_from_bytes_rejects_non_pdf() {
        assert!(matches!(
            Document::from_bytes(b"%PDF-nope"),
            Err(PdfError::Open(_))
        ));
    }
}
