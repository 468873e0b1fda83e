//! Heuristic title and section detection.
//!
//! The classifier works from typography alone. One pass over every span
//! builds a [`FontProfile`] (largest size, most common size, section
//! threshold); a second pass tests each block against the rules below, in
//! order, and keeps the first match:
//!
//! 1. **Title**: set entirely in the document's largest size, at most
//!    [`TITLE_MAX_WORDS`] words.
//! 2. **Numbered section**: starts with an outline number such as `3` or
//!    `2.1.4`, at any size.
//! 3. **Font-size section**: average size strictly above
//!    `common * SECTION_FACTOR`, at most [`FONT_SECTION_MAX_WORDS`] words.
//! 4. **Bold section**: bold, at most [`BOLD_SECTION_MAX_WORDS`] words, and
//!    larger than the common size.
//!
//! Everything else is body text.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::{DocumentStructure, Heading, PageLayout, TextBlock};

pub const TITLE_MAX_WORDS: usize = 20;
pub const FONT_SECTION_MAX_WORDS: usize = 15;
pub const BOLD_SECTION_MAX_WORDS: usize = 12;
pub const SECTION_FACTOR: f64 = 1.55;

/// Document-wide font statistics, computed once per classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontProfile {
    pub max_font: f64,
    /// Most frequent span size. Ties resolve to the smallest tied size.
    pub common_font: f64,
    pub section_threshold: f64,
}

impl FontProfile {
    /// `None` when the pages carry no spans at all.
    pub fn from_pages(pages: &[PageLayout]) -> Option<Self> {
        let sizes = pages
            .iter()
            .flat_map(|p| &p.blocks)
            .flat_map(|b| b.spans())
            .map(|s| s.font_size());

        let mut counts: HashMap<u32, usize> = HashMap::new();
        let mut max_font = f32::MIN;
        for size in sizes {
            *counts.entry(size.to_bits()).or_insert(0) += 1;
            max_font = max_font.max(size);
        }

        let common_font = counts
            .into_iter()
            .map(|(bits, n)| (f32::from_bits(bits), n))
            .max_by(|(a_size, a_n), (b_size, b_n)| {
                a_n.cmp(b_n).then_with(|| b_size.total_cmp(a_size))
            })
            .map(|(size, _)| f64::from(size))?;

        Some(FontProfile {
            max_font: f64::from(max_font),
            common_font,
            section_threshold: common_font * SECTION_FACTOR,
        })
    }
}

/// Which rule made a block a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionRule {
    Numbered,
    FontSize,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockClass {
    Title,
    Section(SectionRule),
    Body,
}

fn numbered_heading() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\d+(\.\d+)*[\s\-–]*.+").unwrap())
}

/// Classify one block against a profile.
pub fn classify_block(block: &TextBlock, profile: &FontProfile) -> BlockClass {
    let text = block.text();
    let avg = block.average_font_size();
    let words = block.word_count();

    if avg == profile.max_font && words <= TITLE_MAX_WORDS {
        BlockClass::Title
    } else if numbered_heading().is_match(&text) {
        BlockClass::Section(SectionRule::Numbered)
    } else if avg > profile.section_threshold && words <= FONT_SECTION_MAX_WORDS {
        BlockClass::Section(SectionRule::FontSize)
    } else if block.is_bold() && words <= BOLD_SECTION_MAX_WORDS && avg > profile.common_font {
        BlockClass::Section(SectionRule::Bold)
    } else {
        BlockClass::Body
    }
}

/// Detect titles and sections across a whole document.
///
/// Output is in page order, then block order. Pages with no spans contribute
/// nothing; a document with no spans yields an empty structure.
pub fn classify(pages: &[PageLayout]) -> DocumentStructure {
    let mut structure = DocumentStructure::default();
    let Some(profile) = FontProfile::from_pages(pages) else {
        log::debug!("no text spans; skipping structure detection");
        return structure;
    };
    log::debug!(
        "font profile: max {:.2}, common {:.2}, section threshold {:.2}",
        profile.max_font,
        profile.common_font,
        profile.section_threshold
    );

    for block in pages.iter().flat_map(|p| &p.blocks) {
        let text = block.text();
        if text.is_empty() {
            continue;
        }
        let page = block.page() + 1;
        match classify_block(block, &profile) {
            BlockClass::Title => {
                log::debug!("title on page {}: {}", page, text);
                structure.titles.push(Heading { page, text });
            }
            BlockClass::Section(rule) => {
                log::debug!("section ({:?}) on page {}: {}", rule, page, text);
                structure.sections.push(Heading { page, text });
            }
            BlockClass::Body => {}
        }
    }

    structure
}
