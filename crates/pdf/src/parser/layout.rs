//! Span → line → block grouping.
//!
//! Spans are first bucketed into visual lines by their baseline, then
//! consecutive lines are grouped into [`TextBlock`]s. A block ends on a
//! vertical gap wider than [`BLOCK_GAP_FACTOR`] line heights, or when the
//! line's dominant font size or weight changes, so a heading set apart only
//! by typography still lands in a block of its own.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::{TextBlock, TextSpan};

/// Spans whose baselines differ by less than this share a line.
const Y_TOLERANCE: f32 = 1.0;

/// Minimum horizontal gap, in points, that reads as a word break.
const MIN_WORD_GAP: f32 = 1.5;

/// A vertical gap wider than this multiple of the previous line's font
/// size starts a new block.
const BLOCK_GAP_FACTOR: f32 = 1.4;

/// Two sizes closer than this are the same size.
const FONT_SIZE_BUCKET: f32 = 0.5;

/// Scripts written without inter-word spaces (CJK, Thai and neighbours).
pub fn is_spaceless_script_char(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF
        | 0x3400..=0x4DBF
        | 0x20000..=0x2A6DF
        | 0xF900..=0xFAFF
        | 0x3040..=0x30FF
        | 0x31F0..=0x31FF
        | 0xAC00..=0xD7AF
        | 0x1100..=0x11FF
        | 0x3130..=0x318F
        | 0x3000..=0x303F
        | 0xFF00..=0xFFEF
        | 0x0E00..=0x0EFF
        | 0x1000..=0x109F
        | 0x1780..=0x17FF
        | 0x0F00..=0x0FFF
    )
}

/// One visual line: spans sorted left to right, same-style neighbours merged.
#[derive(Debug, Clone)]
pub(crate) struct Line {
    spans: Vec<TextSpan>,
    y: f32,
    font_size: f32,
    bold: bool,
}

fn by_position(a: &TextSpan, b: &TextSpan) -> Ordering {
    b.y()
        .partial_cmp(&a.y())
        .unwrap_or(Ordering::Equal)
        .then(a.x().partial_cmp(&b.x()).unwrap_or(Ordering::Equal))
}

/// Group spans into lines, top of the page first.
pub(crate) fn group_spans_into_lines(mut spans: Vec<TextSpan>) -> Vec<Line> {
    spans.sort_by(by_position);

    let mut lines = Vec::new();
    let mut current: Vec<TextSpan> = Vec::new();

    for span in spans {
        if let Some(first) = current.first() {
            if (span.y() - first.y()).abs() > Y_TOLERANCE {
                lines.push(assemble_line(std::mem::take(&mut current)));
            }
        }
        current.push(span);
    }
    if !current.is_empty() {
        lines.push(assemble_line(current));
    }

    lines
}

fn boundary_is_spaceless(prev: &TextSpan, next: &TextSpan) -> bool {
    match (prev.text().chars().next_back(), next.text().chars().next()) {
        (Some(l), Some(f)) => is_spaceless_script_char(l) && is_spaceless_script_char(f),
        _ => false,
    }
}

fn assemble_line(mut spans: Vec<TextSpan>) -> Line {
    spans.sort_by(|a, b| a.x().partial_cmp(&b.x()).unwrap_or(Ordering::Equal));

    let mut merged: Vec<TextSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        if let Some(prev) = merged.last_mut() {
            let gap = span.x() - (prev.x() + prev.width());
            if prev.same_style(&span, FONT_SIZE_BUCKET) {
                if gap < MIN_WORD_GAP && gap > -prev.font_size() {
                    prev.absorb(&span, false);
                    continue;
                }
                if gap >= MIN_WORD_GAP && gap < prev.font_size() * 2.0 {
                    let with_space = !boundary_is_spaceless(prev, &span);
                    prev.absorb(&span, with_space);
                    continue;
                }
            }
        }
        merged.push(span);
    }

    Line {
        y: merged.first().map(TextSpan::y).unwrap_or_default(),
        font_size: dominant_font_size(&merged),
        bold: dominant_weight_is_bold(&merged),
        spans: merged,
    }
}

/// The font size covering the most characters.
fn dominant_font_size(spans: &[TextSpan]) -> f32 {
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for s in spans {
        let key = (s.font_size() * 100.0).round() as i32;
        *counts.entry(key).or_insert(0) += s.text().chars().count();
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(k, _)| k as f32 / 100.0)
        .unwrap_or_default()
}

fn dominant_weight_is_bold(spans: &[TextSpan]) -> bool {
    let (bold, regular) = spans.iter().fold((0, 0), |(b, r), s| {
        let n = s.text().chars().count();
        if s.is_bold() {
            (b + n, r)
        } else {
            (b, r + n)
        }
    });
    bold > regular
}

/// Group consecutive lines of one page into blocks.
pub(crate) fn group_lines_into_blocks(page: usize, lines: Vec<Line>) -> Vec<TextBlock> {
    let mut blocks = Vec::new();
    let mut current: Vec<Line> = Vec::new();

    for line in lines {
        if let Some(prev) = current.last() {
            let gap_break = (prev.y - line.y).abs() > prev.font_size * BLOCK_GAP_FACTOR;
            let size_change = (prev.font_size - line.font_size).abs() >= FONT_SIZE_BUCKET;
            let weight_change = prev.bold != line.bold;
            if gap_break || size_change || weight_change {
                blocks.extend(flush(page, std::mem::take(&mut current)));
            }
        }
        current.push(line);
    }
    blocks.extend(flush(page, current));

    blocks
}

fn flush(page: usize, lines: Vec<Line>) -> Option<TextBlock> {
    TextBlock::from_lines(page, lines.into_iter().map(|l| l.spans).collect()).ok()
}

/// Spans of one page to blocks, in reading order.
pub fn layout_page(page: usize, spans: Vec<TextSpan>) -> Vec<TextBlock> {
    group_lines_into_blocks(page, group_spans_into_lines(spans))
}
