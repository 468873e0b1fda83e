//! Content-stream text extraction.
//!
//! Walks a page's content operators with a reduced PDF text-state machine
//! and emits one [`TextSpan`] per shown string (or per contiguous `TJ` run).
//! Text inside Form XObjects is walked too, up to [`MAX_FORM_DEPTH`] levels.
//!
//! Span positions and sizes are in default user space: the text matrix
//! composed with the current transformation matrix (`cm`, `q`/`Q`, form
//! matrices), so pages drawn with a flipped y axis still read top-down.
//! Widths are approximate: glyph widths are estimated from the font size
//! because the width arrays of embedded fonts are not consulted.

use super::backend::{
    get_number_from_value, BackendFontInfo, ContentOp, Matrix, PageId, PdfBackend, PdfValue,
    ResourceOwner, IDENTITY_MATRIX,
};
use crate::images::MAX_FORM_DEPTH;
use crate::types::{SpanFlags, TextSpan};
use crate::PdfError;

/// Approximate glyph width as a fraction of the font size.
pub(crate) const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// `m` followed by `n`, in the row-vector convention of PDF matrices.
fn multiply(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

// Font descriptor `Flags` bits (PDF 32000-1, table 123).
const FD_FIXED_PITCH: u32 = 1;
const FD_SERIF: u32 = 1 << 1;
const FD_ITALIC: u32 = 1 << 6;
const FD_FORCE_BOLD: u32 = 1 << 18;

/// Style flags for a font, from its base-font name and descriptor flags.
pub fn font_flags(base_font: &str, descriptor_flags: Option<u32>) -> SpanFlags {
    let upper = base_font.to_uppercase();
    let fd = descriptor_flags.unwrap_or(0);

    let mut flags = SpanFlags::empty();
    flags.set(SpanFlags::BOLD, upper.contains("BOLD") || fd & FD_FORCE_BOLD != 0);
    flags.set(
        SpanFlags::ITALIC,
        upper.contains("ITALIC") || upper.contains("OBLIQUE") || fd & FD_ITALIC != 0,
    );
    flags.set(SpanFlags::MONOSPACED, fd & FD_FIXED_PITCH != 0);
    flags.set(SpanFlags::SERIFED, fd & FD_SERIF != 0);
    flags
}

/// Text state plus the current transformation matrix. `q` saves a copy and
/// `Q` restores it.
#[derive(Debug, Clone)]
struct TextState {
    ctm: Matrix,
    font_name: String,
    font_encoding: Option<String>,
    font_flags: SpanFlags,
    font_size: f32,
    text_matrix: Matrix,
    line_matrix: Matrix,
    /// `Tz` as a fraction.
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    text_rise: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY_MATRIX,
            font_name: String::new(),
            font_encoding: None,
            font_flags: SpanFlags::empty(),
            font_size: 0.0,
            text_matrix: IDENTITY_MATRIX,
            line_matrix: IDENTITY_MATRIX,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            text_rise: 0.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    /// Text space to user space: `[1 0 0 1 0 rise] x Tm x CTM`.
    fn rendering_matrix(&self) -> Matrix {
        let rise = [1.0, 0.0, 0.0, 1.0, 0.0, self.text_rise];
        multiply(&rise, &multiply(&self.text_matrix, &self.ctm))
    }

    /// Origin of the next glyph in user space.
    fn origin(&self) -> (f32, f32) {
        let m = self.rendering_matrix();
        (m[4], m[5])
    }

    /// Rendered size: the font size scaled by the length of the rendering
    /// matrix's y axis.
    fn effective_font_size(&self) -> f32 {
        let m = self.rendering_matrix();
        (self.font_size * m[2].hypot(m[3])).abs()
    }

    /// Estimated width of `text` in user space.
    fn rendered_width(&self, text: &str) -> f32 {
        let m = self.rendering_matrix();
        self.estimate_width(text) * m[0].hypot(m[1])
    }

    fn glyph_width(&self) -> f32 {
        self.font_size * APPROX_CHAR_WIDTH_RATIO * self.horiz_scale
    }

    fn estimate_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.glyph_width()
    }

    fn advance_x(&mut self, dx: f32) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }

    /// Advance past `text` as if it had just been painted.
    fn advance_after_show(&mut self, text: &str) {
        let dx: f32 = text
            .chars()
            .map(|ch| {
                let spacing = if ch == ' ' { self.word_spacing } else { 0.0 };
                self.glyph_width() + self.char_spacing + spacing
            })
            .sum();
        self.advance_x(dx);
    }

    /// `Td`: translate the line matrix and reset the text matrix to it.
    fn translate_line(&mut self, tx: f32, ty: f32) {
        let m = self.line_matrix;
        self.line_matrix[4] = m[0] * tx + m[2] * ty + m[4];
        self.line_matrix[5] = m[1] * tx + m[3] * ty + m[5];
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.translate_line(0.0, -self.leading);
    }

    fn set_font(&mut self, font: Option<&BackendFontInfo>, key: &[u8], size: f32) {
        self.font_size = size;
        match font {
            Some(info) => {
                let base = info.base_font.as_deref().unwrap_or_default();
                self.font_name = base.to_string();
                self.font_encoding = info.encoding.clone();
                self.font_flags = font_flags(base, info.descriptor_flags);
            }
            None => {
                // Unknown resource: fall back to the key itself as the name.
                let name = String::from_utf8_lossy(key).into_owned();
                self.font_flags = font_flags(&name, None);
                self.font_name = name;
                self.font_encoding = None;
            }
        }
    }
}

/// Collects spans for one page, dropping the ones that fail validation.
struct SpanSink<'a> {
    backend: &'a dyn PdfBackend,
    page_index: usize,
    spans: Vec<TextSpan>,
}

impl SpanSink<'_> {
    fn decode(&self, val: &PdfValue, state: &TextState) -> String {
        match val {
            PdfValue::Str(bytes) => self
                .backend
                .decode_text(state.font_encoding.as_deref(), bytes),
            _ => String::new(),
        }
    }

    fn push(&mut self, text: &str, (x, y): (f32, f32), state: &TextState) {
        let built = TextSpan::new(
            self.page_index,
            crate::text::normalize(text),
            state.effective_font_size(),
            state.font_name.clone(),
            state.font_flags,
        );
        match built {
            Ok(span) => self.spans.push(span.at(x, y, state.rendered_width(text))),
            Err(e) => log::warn!(
                "page {}: dropping span {:?}: {}",
                self.page_index,
                text,
                e
            ),
        }
    }

    /// `Tj`, `'` and `"`: paint one string at the current position.
    fn show(&mut self, operand: &PdfValue, state: &mut TextState) {
        let text = self.decode(operand, state);
        if text.is_empty() {
            return;
        }
        self.push(&text, state.origin(), state);
        state.advance_after_show(&text);
    }

    /// `TJ`: strings interleaved with kerning adjustments, emitted as one span.
    /// Adjustments wide enough to look like a word gap become a space.
    fn show_array(&mut self, elements: &[PdfValue], state: &mut TextState) {
        let mut buf = String::new();
        let mut start = state.origin();

        for elem in elements {
            if let PdfValue::Str(_) = elem {
                let fragment = self.decode(elem, state);
                if buf.is_empty() {
                    start = state.origin();
                }
                buf.push_str(&fragment);
                state.advance_after_show(&fragment);
            } else if let Some(adj) = get_number_from_value(elem) {
                let dx = -adj / 1000.0 * state.font_size * state.horiz_scale;
                if dx > state.glyph_width() * 0.3 && !buf.is_empty() {
                    buf.push(' ');
                }
                state.advance_x(dx);
            }
        }

        let trimmed = buf.trim_end();
        if !trimmed.is_empty() {
            self.push(trimmed, start, state);
        }
    }

    /// Run `ops` against `state`. Names resolve against `owner`'s resources
    /// and `fonts`; `depth` counts enclosing forms.
    fn walk(
        &mut self,
        ops: &[ContentOp],
        fonts: &[BackendFontInfo],
        owner: ResourceOwner,
        state: &mut TextState,
        depth: usize,
    ) {
        let mut saved: Vec<TextState> = Vec::new();

        for op in ops {
            let first = op.operands.first();
            match op.operator.as_str() {
                "q" => saved.push(state.clone()),
                "Q" => {
                    if let Some(restored) = saved.pop() {
                        *state = restored;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_operand(&op.operands) {
                        state.ctm = multiply(&m, &state.ctm);
                    }
                }
                "Do" => {
                    if let Some(PdfValue::Name(name)) = first {
                        self.paint_form(name, owner, state, depth);
                    }
                }
                "BT" => {
                    state.text_matrix = IDENTITY_MATRIX;
                    state.line_matrix = IDENTITY_MATRIX;
                }
                "Tf" => handle_tf(&op.operands, fonts, state),
                "Tm" => {
                    if let Some(m) = matrix_operand(&op.operands) {
                        state.text_matrix = m;
                        state.line_matrix = m;
                    }
                }
                "Td" => {
                    if let Some((tx, ty)) = pair(&op.operands) {
                        state.translate_line(tx, ty);
                    }
                }
                "TD" => {
                    if let Some((tx, ty)) = pair(&op.operands) {
                        state.leading = -ty;
                        state.translate_line(tx, ty);
                    }
                }
                "T*" => state.next_line(),
                "TL" => {
                    if let Some(v) = first.and_then(get_number_from_value) {
                        state.leading = v;
                    }
                }
                "Tc" => {
                    if let Some(v) = first.and_then(get_number_from_value) {
                        state.char_spacing = v;
                    }
                }
                "Tw" => {
                    if let Some(v) = first.and_then(get_number_from_value) {
                        state.word_spacing = v;
                    }
                }
                "Tz" => {
                    if let Some(v) = first.and_then(get_number_from_value) {
                        state.horiz_scale = v / 100.0;
                    }
                }
                "Ts" => {
                    if let Some(v) = first.and_then(get_number_from_value) {
                        state.text_rise = v;
                    }
                }
                "Tj" => {
                    if let Some(val) = first {
                        self.show(val, state);
                    }
                }
                "TJ" => {
                    if let Some(PdfValue::Array(arr)) = first {
                        self.show_array(arr, state);
                    }
                }
                "'" => {
                    state.next_line();
                    if let Some(val) = first {
                        self.show(val, state);
                    }
                }
                "\"" => {
                    if let [aw, ac, text, ..] = op.operands.as_slice() {
                        if let Some(aw) = get_number_from_value(aw) {
                            state.word_spacing = aw;
                        }
                        if let Some(ac) = get_number_from_value(ac) {
                            state.char_spacing = ac;
                        }
                        state.next_line();
                        self.show(text, state);
                    }
                }
                _ => {}
            }
        }
    }

    /// `Do` on a Form XObject: walk its content under `form matrix x CTM`.
    /// Images and unknown names paint no text.
    fn paint_form(
        &mut self,
        name: &[u8],
        owner: ResourceOwner,
        state: &TextState,
        depth: usize,
    ) {
        if depth >= MAX_FORM_DEPTH {
            log::debug!(
                "page {}: form {} nested too deep, skipping",
                self.page_index,
                String::from_utf8_lossy(name)
            );
            return;
        }
        let form = match self.backend.form_xobject(owner, name) {
            Ok(Some(form)) => form,
            Ok(None) => return,
            Err(e) => {
                log::warn!(
                    "page {}: skipping form {}: {}",
                    self.page_index,
                    String::from_utf8_lossy(name),
                    e
                );
                return;
            }
        };

        let mut inner = state.clone();
        inner.ctm = multiply(&form.matrix, &state.ctm);
        self.walk(&form.ops, &form.fonts, form.owner, &mut inner, depth + 1);
    }
}

fn handle_tf(operands: &[PdfValue], fonts: &[BackendFontInfo], state: &mut TextState) {
    let [key, size, ..] = operands else {
        return;
    };
    let key = match key {
        PdfValue::Name(n) | PdfValue::Str(n) => n.as_slice(),
        _ => return,
    };
    let size = get_number_from_value(size).unwrap_or(0.0);
    let font = fonts.iter().find(|info| info.name == key);
    state.set_font(font, key, size);
}

/// Six numeric operands, as taken by `cm` and `Tm`.
fn matrix_operand(operands: &[PdfValue]) -> Option<Matrix> {
    let values: Vec<f32> = operands
        .iter()
        .take(6)
        .filter_map(get_number_from_value)
        .collect();
    Matrix::try_from(values).ok()
}

fn pair(operands: &[PdfValue]) -> Option<(f32, f32)> {
    let [a, b, ..] = operands else {
        return None;
    };
    Some((
        get_number_from_value(a).unwrap_or(0.0),
        get_number_from_value(b).unwrap_or(0.0),
    ))
}

/// Extract the text spans of one page, in content-stream order.
///
/// `page_index` is the 0-based index recorded on every span.
pub fn extract_page_spans(
    backend: &dyn PdfBackend,
    page_id: PageId,
    page_index: usize,
) -> Result<Vec<TextSpan>, PdfError> {
    let raw_content = backend.page_content(page_id)?;
    let ops = backend.decode_content(&raw_content)?;
    let fonts = backend.page_fonts(page_id).unwrap_or_default();

    let mut sink = SpanSink {
        backend,
        page_index,
        spans: Vec::new(),
    };
    sink.walk(
        &ops,
        &fonts,
        ResourceOwner::Page(page_id),
        &mut TextState::default(),
        0,
    );
    Ok(sink.spans)
}
