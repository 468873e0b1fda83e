use std::fmt;

use bitflags::bitflags;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        ImageId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Jpeg2000,
    Unknown,
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Jpeg => write!(f, "jpeg"),
            ImageFormat::Png => write!(f, "png"),
            ImageFormat::Jpeg2000 => write!(f, "jpeg2000"),
            ImageFormat::Unknown => write!(f, "unknown"),
        }
    }
}

/// Bytes of one embedded image, as extracted from a page.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub id: ImageId,
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub page_count: usize,
    pub creator: Option<String>,
}

bitflags! {
    /// Style bits attached to every [`TextSpan`].
    ///
    /// The bit layout mirrors the one layout engines commonly expose for
    /// span flags, so `BOLD` is bit 4 rather than the font descriptor's
    /// ForceBold bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SpanFlags: u32 {
        const SUPERSCRIPT = 1;
        const ITALIC = 1 << 1;
        const SERIFED = 1 << 2;
        const MONOSPACED = 1 << 3;
        const BOLD = 1 << 4;
    }
}

/// An atomic styled run of text on a page.
///
/// Construction goes through [`TextSpan::new`], which rejects sizes that
/// cannot come from a real glyph run (zero, negative, NaN, infinite).
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    page: usize,
    text: String,
    font_size: f32,
    font_name: String,
    flags: SpanFlags,
    x: f32,
    y: f32,
    width: f32,
}

impl TextSpan {
    pub fn new(
        page: usize,
        text: impl Into<String>,
        font_size: f32,
        font_name: impl Into<String>,
        flags: SpanFlags,
    ) -> Result<Self, InvalidSpan> {
        if !font_size.is_finite() || font_size <= 0.0 {
            return Err(InvalidSpan::FontSize(font_size));
        }
        Ok(TextSpan {
            page,
            text: text.into(),
            font_size,
            font_name: font_name.into(),
            flags,
            x: 0.0,
            y: 0.0,
            width: 0.0,
        })
    }

    /// Attach the layout position used to assemble lines and blocks.
    pub fn at(mut self, x: f32, y: f32, width: f32) -> Self {
        self.x = x;
        self.y = y;
        self.width = width;
        self
    }

    /// 0-based page index.
    pub fn page(&self) -> usize {
        self.page
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    pub fn font_name(&self) -> &str {
        &self.font_name
    }

    pub fn flags(&self) -> SpanFlags {
        self.flags
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    /// Bold by font name or by the `BOLD` flag bit.
    pub fn is_bold(&self) -> bool {
        self.font_name.contains("Bold") || self.flags.contains(SpanFlags::BOLD)
    }

    /// Glue `next` onto this span, optionally separated by a space, and
    /// extend the width up to the end of `next`.
    pub(crate) fn absorb(&mut self, next: &TextSpan, with_space: bool) {
        if with_space {
            self.text.push(' ');
        }
        self.text.push_str(&next.text);
        self.width = (next.x + next.width) - self.x;
    }

    /// Whether two spans carry the same font, size bucket, and style.
    pub(crate) fn same_style(&self, other: &TextSpan, size_tolerance: f32) -> bool {
        self.font_name == other.font_name
            && (self.font_size - other.font_size).abs() < size_tolerance
            && self.flags == other.flags
    }
}

/// A contiguous group of spans forming one paragraph-like layout unit.
///
/// A block always holds at least one span; [`TextBlock::new`] rejects empty
/// span lists so averages over the block are always defined.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    page: usize,
    spans: Vec<TextSpan>,
    /// Index of the first span of every line after the first.
    line_starts: Vec<usize>,
}

impl TextBlock {
    /// A block whose spans all sit on one line.
    pub fn new(page: usize, spans: Vec<TextSpan>) -> Result<Self, InvalidBlock> {
        Self::from_lines(page, vec![spans])
    }

    /// A block made of visual lines, top to bottom. Empty lines are skipped.
    pub fn from_lines(page: usize, lines: Vec<Vec<TextSpan>>) -> Result<Self, InvalidBlock> {
        let mut spans = Vec::new();
        let mut line_starts = Vec::new();
        for line in lines.into_iter().filter(|l| !l.is_empty()) {
            if !spans.is_empty() {
                line_starts.push(spans.len());
            }
            spans.extend(line);
        }
        if spans.is_empty() {
            return Err(InvalidBlock { page });
        }
        Ok(TextBlock {
            page,
            spans,
            line_starts,
        })
    }

    /// 0-based page index.
    pub fn page(&self) -> usize {
        self.page
    }

    pub fn spans(&self) -> &[TextSpan] {
        &self.spans
    }

    /// Span texts joined by a single space, trimmed.
    pub fn text(&self) -> String {
        self.spans
            .iter()
            .map(|s| s.text())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }

    /// Spans grouped by visual line, top to bottom.
    pub fn lines(&self) -> impl Iterator<Item = &[TextSpan]> + '_ {
        let mut bounds = Vec::with_capacity(self.line_starts.len() + 2);
        bounds.push(0);
        bounds.extend(&self.line_starts);
        bounds.push(self.spans.len());
        (0..bounds.len() - 1).map(move |i| &self.spans[bounds[i]..bounds[i + 1]])
    }

    /// Like [`TextBlock::text`], but with a `\n` between visual lines.
    pub fn text_by_line(&self) -> String {
        self.lines()
            .map(|line| {
                line.iter()
                    .map(|s| s.text())
                    .collect::<Vec<_>>()
                    .join(" ")
                    .trim()
                    .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Arithmetic mean of the span font sizes.
    ///
    /// Returns the shared size unchanged when every span has the same one,
    /// so a block set entirely in the document's largest font compares equal
    /// to that maximum.
    pub fn average_font_size(&self) -> f64 {
        let first = self.spans[0].font_size();
        if self.spans.iter().all(|s| s.font_size() == first) {
            return f64::from(first);
        }
        let total: f64 = self.spans.iter().map(|s| f64::from(s.font_size())).sum();
        total / self.spans.len() as f64
    }

    pub fn is_bold(&self) -> bool {
        self.spans.iter().any(TextSpan::is_bold)
    }

    pub fn word_count(&self) -> usize {
        self.text().split_whitespace().count()
    }
}

/// The decoded blocks of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    /// 0-based page index.
    pub index: usize,
    pub blocks: Vec<TextBlock>,
}

/// A detected title or section heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// 1-based page number.
    pub page: usize,
    pub text: String,
}

/// Titles and sections in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentStructure {
    pub titles: Vec<Heading>,
    pub sections: Vec<Heading>,
}

impl DocumentStructure {
    pub fn is_empty(&self) -> bool {
        self.titles.is_empty() && self.sections.is_empty()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum InvalidSpan {
    #[error("font size must be a positive finite number, got {0}")]
    FontSize(f32),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("text block on page {page} has no spans")]
pub struct InvalidBlock {
    pub page: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, size: f32) -> TextSpan {
        TextSpan::new(0, text, size, "Helvetica", SpanFlags::empty()).unwrap()
    }

    #[test]
    fn test_span_rejects_bad_font_sizes() {
        for size in [0.0, -3.0, f32::NAN, f32::INFINITY] {
            assert!(TextSpan::new(0, "x", size, "F", SpanFlags::empty()).is_err());
        }
    }

    #[test]
    fn test_span_bold_by_name_or_flag() {
        let by_name = TextSpan::new(0, "a", 12.0, "Arial-BoldMT", SpanFlags::empty()).unwrap();
        let by_flag = TextSpan::new(0, "a", 12.0, "Arial", SpanFlags::BOLD).unwrap();
        let italic = TextSpan::new(0, "a", 12.0, "Arial", SpanFlags::ITALIC).unwrap();
        assert!(by_name.is_bold());
        assert!(by_flag.is_bold());
        assert!(!italic.is_bold());
    }

    #[test]
    fn test_block_rejects_empty_spans() {
        assert_eq!(TextBlock::new(3, vec![]), Err(InvalidBlock { page: 3 }));
    }

    #[test]
    fn test_block_text_joins_and_trims() {
        let block = TextBlock::new(0, vec![span("  Hello", 12.0), span("world ", 12.0)]).unwrap();
        assert_eq!(block.text(), "Hello world");
        assert_eq!(block.word_count(), 2);
    }

    #[test]
    fn test_block_from_lines_keeps_line_breaks() {
        let block = TextBlock::from_lines(
            2,
            vec![
                vec![span("a informa-", 10.0)],
                vec![],
                vec![span("mação", 10.0), span("útil", 10.0)],
            ],
        )
        .unwrap();
        assert_eq!(block.lines().count(), 2);
        assert_eq!(block.text(), "a informa- mação útil");
        assert_eq!(block.text_by_line(), "a informa-\nmação útil");
        assert_eq!(TextBlock::from_lines(2, vec![vec![]]), Err(InvalidBlock { page: 2 }));
    }

    #[test]
    fn test_block_average_font_size() {
        let block = TextBlock::new(0, vec![span("a", 10.0), span("b", 14.0)]).unwrap();
        assert!((block.average_font_size() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_block_average_exact_for_uniform_sizes() {
        let size = 10.98_f32;
        let block = TextBlock::new(0, vec![span("a", size), span("b", size), span("c", size)])
            .unwrap();
        assert_eq!(block.average_font_size(), f64::from(size));
    }

    #[test]
    fn test_image_format_display() {
        assert_eq!(format!("{}", ImageFormat::Jpeg), "jpeg");
        assert_eq!(format!("{}", ImageFormat::Unknown), "unknown");
    }
}
