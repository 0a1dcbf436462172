//! Text span extraction.
//!
//! Walks a page's content stream with a simplified text-state machine and
//! reports every shown string with its baseline origin, in PDF user space.
//! Used to read back what the renderer stamped.

use serde::Serialize;

use super::backend::{get_number_from_value, BackendFontInfo, PageId, PdfBackend, PdfValue};
use crate::PdfError;

/// A single run of text at a specific position on the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextSpan {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub font_name: String,
}

/// Approximate glyph advance as a fraction of the font size. Only used to
/// move the pen between consecutive show operators.
const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// The identity 2x3 text matrix: [a, b, c, d, tx, ty].
const IDENTITY_MATRIX: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

#[derive(Debug, Clone)]
struct TextState {
    font_key: Vec<u8>,
    font_name: String,
    font_size: f32,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    text_rise: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_key: Vec::new(),
            font_name: String::new(),
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
    fn x(&self) -> f32 {
        self.text_matrix[4]
    }

    fn y(&self) -> f32 {
        self.text_matrix[5] + self.text_rise
    }

    /// `font_size * sqrt(b^2 + d^2)` of the text matrix.
    fn effective_font_size(&self) -> f32 {
        let scale = (self.text_matrix[1].powi(2) + self.text_matrix[3].powi(2)).sqrt();
        (self.font_size * scale).abs()
    }

    fn advance_x(&mut self, dx: f32) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }

    /// Multiply the text line matrix by a translation (Td / TD / T*).
    fn translate_line(&mut self, tx: f32, ty: f32) {
        let new_tx = self.line_matrix[0] * tx + self.line_matrix[2] * ty + self.line_matrix[4];
        let new_ty = self.line_matrix[1] * tx + self.line_matrix[3] * ty + self.line_matrix[5];
        self.line_matrix[4] = new_tx;
        self.line_matrix[5] = new_ty;
        self.text_matrix = self.line_matrix;
    }

    fn advance_after_show(&mut self, text: &str) {
        let dx: f32 = text
            .chars()
            .map(|ch| {
                let w = self.font_size * APPROX_CHAR_WIDTH_RATIO * self.horiz_scale
                    + self.char_spacing;
                if ch == ' ' {
                    w + self.word_spacing
                } else {
                    w
                }
            })
            .sum();
        self.advance_x(dx);
    }
}

/// Walk a single page's content stream and produce a flat list of
/// [`TextSpan`]s.
///
/// | Operator | Action |
/// |----------|--------|
/// | `BT`     | Begin text object -- reset matrices |
/// | `Tf`     | Set font and size |
/// | `Tm`     | Set text matrix directly |
/// | `Td`/`TD`/`T*` | Move to a new line |
/// | `TL`/`Tc`/`Tw`/`Tz`/`Ts` | Text state parameters |
/// | `Tj`/`'`/`"` | Show a string |
/// | `TJ`     | Show strings with kerning adjustments |
pub fn extract_page_spans(
    backend: &dyn PdfBackend,
    page_id: PageId,
) -> Result<Vec<TextSpan>, PdfError> {
    let raw_content = backend.page_content(page_id)?;
    let ops = backend.decode_content(&raw_content)?;
    let fonts = backend.page_fonts(page_id).unwrap_or_default();

    let mut state = TextState::default();
    let mut spans = Vec::new();
    let number = |operands: &[PdfValue], i: usize| {
        operands.get(i).and_then(get_number_from_value).unwrap_or(0.0)
    };

    for op in &ops {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            "BT" => {
                state.text_matrix = IDENTITY_MATRIX;
                state.line_matrix = IDENTITY_MATRIX;
            }
            "Tf" => set_font(operands, &fonts, &mut state),
            "Tm" => {
                let vals: Vec<f32> = operands.iter().filter_map(get_number_from_value).collect();
                if let [a, b, c, d, e, f] = vals[..] {
                    state.text_matrix = [a, b, c, d, e, f];
                    state.line_matrix = state.text_matrix;
                }
            }
            "Td" => state.translate_line(number(operands, 0), number(operands, 1)),
            "TD" => {
                state.leading = -number(operands, 1);
                state.translate_line(number(operands, 0), number(operands, 1));
            }
            "T*" => state.translate_line(0.0, -state.leading),
            "TL" => state.leading = number(operands, 0),
            "Tc" => state.char_spacing = number(operands, 0),
            "Tw" => state.word_spacing = number(operands, 0),
            "Tz" => state.horiz_scale = number(operands, 0) / 100.0,
            "Ts" => state.text_rise = number(operands, 0),
            "Tj" => {
                if let Some(first) = operands.first() {
                    show(first, backend, page_id, &mut state, &mut spans);
                }
            }
            "'" => {
                state.translate_line(0.0, -state.leading);
                if let Some(first) = operands.first() {
                    show(first, backend, page_id, &mut state, &mut spans);
                }
            }
            "\"" => {
                if operands.len() >= 3 {
                    state.word_spacing = number(operands, 0);
                    state.char_spacing = number(operands, 1);
                    state.translate_line(0.0, -state.leading);
                    show(&operands[2], backend, page_id, &mut state, &mut spans);
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(arr)) = operands.first() {
                    show_array(arr, backend, page_id, &mut state, &mut spans);
                }
            }
            _ => {}
        }
    }

    Ok(spans)
}

fn set_font(operands: &[PdfValue], fonts: &[BackendFontInfo], state: &mut TextState) {
    let (Some(PdfValue::Name(key)), Some(size)) = (
        operands.first(),
        operands.get(1).and_then(get_number_from_value),
    ) else {
        return;
    };
    state.font_name = fonts
        .iter()
        .find(|info| &info.name == key)
        .and_then(|info| info.base_font.clone())
        .unwrap_or_else(|| String::from_utf8_lossy(key).into_owned());
    state.font_key = key.clone();
    state.font_size = size;
}

fn decode(val: &PdfValue, backend: &dyn PdfBackend, page_id: PageId, font_key: &[u8]) -> String {
    match val {
        PdfValue::Str(bytes) => backend.decode_text(page_id, font_key, bytes),
        _ => String::new(),
    }
}

fn push_span(text: String, x: f32, y: f32, state: &TextState, spans: &mut Vec<TextSpan>) {
    spans.push(TextSpan {
        text,
        x,
        y,
        font_size: state.effective_font_size(),
        font_name: state.font_name.clone(),
    });
}

fn show(
    operand: &PdfValue,
    backend: &dyn PdfBackend,
    page_id: PageId,
    state: &mut TextState,
    spans: &mut Vec<TextSpan>,
) {
    let text = decode(operand, backend, page_id, &state.font_key);
    if text.is_empty() {
        return;
    }
    let (x, y) = (state.x(), state.y());
    state.advance_after_show(&text);
    push_span(text, x, y, state, spans);
}

/// `TJ` elements are strings or kerning adjustments in thousandths of a
/// text-space unit. The whole array becomes one span; large gaps become
/// spaces.
fn show_array(
    arr: &[PdfValue],
    backend: &dyn PdfBackend,
    page_id: PageId,
    state: &mut TextState,
    spans: &mut Vec<TextSpan>,
) {
    let (x, y) = (state.x(), state.y());
    let mut buf = String::new();

    for elem in arr {
        if let PdfValue::Str(_) = elem {
            let fragment = decode(elem, backend, page_id, &state.font_key);
            state.advance_after_show(&fragment);
            buf.push_str(&fragment);
        } else if let Some(adj) = get_number_from_value(elem) {
            let dx = -adj / 1000.0 * state.font_size * state.horiz_scale;
            let gap = state.font_size * APPROX_CHAR_WIDTH_RATIO * state.horiz_scale * 0.3;
            if dx > gap && !buf.is_empty() {
                buf.push(' ');
            }
            state.advance_x(dx);
        }
    }

    let text = buf.trim_end();
    if !text.is_empty() {
        push_span(text.to_string(), x, y, state, spans);
    }
}

#[cfg(test)]
mod tests {
    use super::super::backend::ContentOp;
    use super::*;

    /// Serves a fixed operator list for page (1, 0).
    struct FakeBackend {
        ops: Vec<ContentOp>,
    }

    impl PdfBackend for FakeBackend {
        fn page_fonts(&self, _page: PageId) -> Result<Vec<BackendFontInfo>, PdfError> {
            Ok(vec![BackendFontInfo {
                name: b"F1".to_vec(),
                base_font: Some("Helvetica".to_string()),
            }])
        }

        fn page_content(&self, _page: PageId) -> Result<Vec<u8>, PdfError> {
            Ok(Vec::new())
        }

        fn decode_content(&self, _data: &[u8]) -> Result<Vec<ContentOp>, PdfError> {
            Ok(self.ops.clone())
        }

        fn decode_text(&self, _page: PageId, _font: &[u8], bytes: &[u8]) -> String {
            String::from_utf8_lossy(bytes).into_owned()
        }
    }

    fn op(operator: &str, operands: Vec<PdfValue>) -> ContentOp {
        ContentOp {
            operator: operator.to_string(),
            operands,
        }
    }

    fn s(text: &str) -> PdfValue {
        PdfValue::Str(text.as_bytes().to_vec())
    }

    fn n(v: f32) -> PdfValue {
        PdfValue::Real(v)
    }

    fn spans(ops: Vec<ContentOp>) -> Vec<TextSpan> {
        extract_page_spans(&FakeBackend { ops }, (1, 0)).unwrap()
    }

    #[test]
    fn test_tm_positions_span() {
        let result = spans(vec![
            op("BT", vec![]),
            op("Tf", vec![PdfValue::Name(b"F1".to_vec()), n(10.0)]),
            op("Tm", vec![n(1.0), n(0.0), n(0.0), n(1.0), n(100.0), n(592.0)]),
            op("Tj", vec![s("Nguyen Van A")]),
            op("ET", vec![]),
        ]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text, "Nguyen Van A");
        assert_eq!((result[0].x, result[0].y), (100.0, 592.0));
        assert_eq!(result[0].font_size, 10.0);
        assert_eq!(result[0].font_name, "Helvetica");
    }

    #[test]
    fn test_td_moves_relative_to_line_start() {
        let result = spans(vec![
            op("BT", vec![]),
            op("Tf", vec![PdfValue::Name(b"F1".to_vec()), n(12.0)]),
            op("Td", vec![n(50.0), n(700.0)]),
            op("Tj", vec![s("first")]),
            op("Td", vec![n(0.0), n(-20.0)]),
            op("Tj", vec![s("second")]),
            op("ET", vec![]),
        ]);
        assert_eq!((result[1].x, result[1].y), (50.0, 680.0));
    }

    #[test]
    fn test_tj_array_joins_fragments() {
        let result = spans(vec![
            op("BT", vec![]),
            op("Tf", vec![PdfValue::Name(b"F1".to_vec()), n(10.0)]),
            op(
                "TJ",
                vec![PdfValue::Array(vec![s("Ho"), n(-20.0), s("ten"), n(-400.0), s("day")])],
            ),
            op("ET", vec![]),
        ]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text, "Hoten day");
    }

    #[test]
    fn test_scaled_matrix_font_size() {
        let result = spans(vec![
            op("BT", vec![]),
            op("Tf", vec![PdfValue::Name(b"F1".to_vec()), n(1.0)]),
            op("Tm", vec![n(8.0), n(0.0), n(0.0), n(8.0), n(10.0), n(10.0)]),
            op("Tj", vec![s("x")]),
        ]);
        assert_eq!(result[0].font_size, 8.0);
    }
}
