//! PDF side of autoly: fills a template by drawing text on top of its pages.
//!
//! The layout itself is decided by [`autoly_core::plan`]; this crate opens the
//! template, checks every [`Stamp`](autoly_core::Stamp) against the page
//! geometry, draws it with the configured [`FontAsset`] and serializes the
//! result. It can also read text back out of a PDF, which is how the stamped
//! output is verified.

use std::path::{Path, PathBuf};

use autoly_core::{FieldSpec, LayoutDefaults, LayoutWarning, RenderRequest};
use serde::Serialize;
use thiserror::Error;

use parser::backend::{LopdfBackend, PdfBackend};

pub mod font;
pub mod parser;
pub mod stamp;

pub use font::FontAsset;
pub use parser::text::TextSpan;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("Page {page} not found, the document has {page_count} page(s)")]
    PageNotFound { page: usize, page_count: usize },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Cannot load template {}: {reason}", path.display())]
    TemplateLoad { path: PathBuf, reason: String },
    #[error(
        "Field {field} at ({x}, {y}) on page {page} is outside the template \
         ({page_count} page(s), page size {width}x{height})"
    )]
    CoordinateOutOfBounds {
        field: String,
        page: usize,
        x: f32,
        y: f32,
        page_count: usize,
        width: f32,
        height: f32,
    },
    #[error("Cannot load font: {0}")]
    FontLoad(String),
    #[error("Font {font} cannot draw {chars:?} in field {field}; configure a TrueType font that covers them")]
    UnsupportedText {
        field: String,
        font: String,
        chars: String,
    },
    #[error("PDF error: {0}")]
    Pdf(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PdfError> for RenderError {
    fn from(e: PdfError) -> Self {
        match e {
            PdfError::Io(e) => RenderError::Io(e),
            other => RenderError::Pdf(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// The filled document plus anything the layout had to leave out.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub warnings: Vec<LayoutWarning>,
}

/// Fills templates found under `template_dir`.
///
/// Every call to [`Renderer::render`] reads its own copy of the template, so a
/// single renderer can be shared between threads.
#[derive(Debug, Clone)]
pub struct Renderer {
    template_dir: PathBuf,
    font: FontAsset,
    defaults: LayoutDefaults,
}

impl Renderer {
    pub fn new(template_dir: impl Into<PathBuf>, font: FontAsset) -> Self {
        Renderer {
            template_dir: template_dir.into(),
            font,
            defaults: LayoutDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: LayoutDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn font(&self) -> &FontAsset {
        &self.font
    }

    pub fn template_path(&self, template_file: &str) -> PathBuf {
        self.template_dir.join(template_file)
    }

    /// Fill the request's template with its values.
    pub fn render(&self, request: &RenderRequest) -> Result<Rendered, RenderError> {
        let backend = self.open(&request.template_file)?;
        let plan = autoly_core::plan(request, &self.defaults);
        let pages = stamp::page_boxes(&backend)?;

        if let Some(err) = plan
            .stamps
            .iter()
            .find_map(|s| stamp::bounds_violation(&pages, s))
        {
            return Err(err);
        }

        let mut doc = backend.into_document();
        stamp::apply(&mut doc, &pages, &plan.stamps, &self.font)?;

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| RenderError::Pdf(format!("cannot serialize document: {e}")))?;

        log::debug!(
            "rendered {} with {} stamp(s), {} bytes",
            request.template,
            plan.stamps.len(),
            bytes.len()
        );

        Ok(Rendered {
            bytes,
            warnings: plan.warnings,
        })
    }

    /// Check every point `fields` can print at against `template_file`.
    /// Returns one error per point that falls outside the template.
    pub fn check(
        &self,
        template_file: &str,
        fields: &[FieldSpec],
    ) -> Result<Vec<RenderError>, RenderError> {
        let backend = self.open(template_file)?;
        let pages = stamp::page_boxes(&backend)?;
        Ok(autoly_core::probe_stamps(fields, &self.defaults)
            .iter()
            .filter_map(|s| stamp::bounds_violation(&pages, s))
            .collect())
    }

    fn open(&self, template_file: &str) -> Result<LopdfBackend, RenderError> {
        let path = self.template_path(template_file);
        let load_error = |path: &Path, reason: String| RenderError::TemplateLoad {
            path: path.to_path_buf(),
            reason,
        };

        let data = std::fs::read(&path).map_err(|e| load_error(&path, e.to_string()))?;
        let backend = LopdfBackend::load_bytes(&data).map_err(|e| load_error(&path, e.to_string()))?;
        if backend.page_count() == 0 {
            return Err(load_error(&path, "template has no pages".into()));
        }
        Ok(backend)
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageInfo {
    pub index: usize,
    pub width: f32,
    pub height: f32,
}

/// Page sizes of a PDF, first page at index 0.
pub fn inspect(bytes: &[u8]) -> Result<Vec<PageInfo>, PdfError> {
    let backend = LopdfBackend::load_bytes(bytes)?;
    backend
        .page_ids()
        .into_iter()
        .enumerate()
        .map(|(index, id)| -> Result<PageInfo, PdfError> {
            let (width, height) = backend.page_dimensions(id)?;
            Ok(PageInfo {
                index,
                width,
                height,
            })
        })
        .collect()
}

/// Text spans of page `page` (0-based), with top-left coordinates like the
/// ones used to place fields.
pub fn extract_spans(bytes: &[u8], page: usize) -> Result<Vec<TextSpan>, PdfError> {
    let backend = LopdfBackend::load_bytes(bytes)?;
    let page_ids = backend.page_ids();
    let page_id = *page_ids.get(page).ok_or(PdfError::PageNotFound {
        page,
        page_count: page_ids.len(),
    })?;
    let media_box = backend.media_box(page_id)?;

    let spans = parser::text::extract_page_spans(&backend as &dyn PdfBackend, page_id)?;
    Ok(spans
        .into_iter()
        .map(|span| {
            let (x, y) = media_box.from_user_space(span.x, span.y);
            TextSpan { x, y, ..span }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use autoly_core::{ColumnSource, FieldId, FieldValue, GroupColumn, GroupSpec, Record};
    use lopdf::{dictionary, Document, Object, Stream};

    fn number_array(values: [i64; 4]) -> Object {
        Object::Array(values.into_iter().map(Object::Integer).collect())
    }

    /// A template whose MediaBox and Resources live on the page tree root.
    fn template(page_count: usize, content: &[u8]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let header_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids = Vec::new();
        for _ in 0..page_count {
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
                "MediaBox" => number_array([0, 0, 595, 842]),
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => header_font },
                },
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn renderer_with(template_bytes: &[u8]) -> (tempfile::TempDir, Renderer) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("form.pdf"), template_bytes).unwrap();
        let renderer = Renderer::new(dir.path(), FontAsset::Standard);
        (dir, renderer)
    }

    fn request(fields: Vec<FieldSpec>, values: Vec<(&str, FieldValue)>) -> RenderRequest {
        RenderRequest {
            template: "form".into(),
            template_file: "form.pdf".into(),
            values: values
                .into_iter()
                .map(|(k, v)| (FieldId::from(k), v))
                .collect(),
            fields,
        }
    }

    fn name_and_birth() -> RenderRequest {
        request(
            vec![
                FieldSpec::text("fullName", "Name").at(0, 100.0, 200.0),
                FieldSpec::text("birthDate", "Birth").at(0, 100.0, 230.0),
            ],
            vec![
                ("fullName", FieldValue::text("Nguyen Van A")),
                ("birthDate", FieldValue::text("1999-01-01")),
            ],
        )
    }

    fn span_near<'a>(spans: &'a [TextSpan], text: &str) -> &'a TextSpan {
        spans
            .iter()
            .find(|s| s.text == text)
            .unwrap_or_else(|| panic!("no span {text:?} in {spans:?}"))
    }

    #[test]
    fn test_render_places_text_at_coordinates() {
        let (_dir, renderer) = renderer_with(&template(1, b"BT ET"));
        let rendered = renderer.render(&name_and_birth()).unwrap();
        assert!(rendered.warnings.is_empty());

        let spans = extract_spans(&rendered.bytes, 0).unwrap();
        let name = span_near(&spans, "Nguyen Van A");
        assert!((name.x - 100.0).abs() < 0.5 && (name.y - 200.0).abs() < 0.5);
        let birth = span_near(&spans, "1999-01-01");
        assert!((birth.x - 100.0).abs() < 0.5 && (birth.y - 230.0).abs() < 0.5);
        assert_eq!(birth.font_size, 10.0);
    }

    fn dejavu() -> FontAsset {
        FontAsset::load(Path::new(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../fonts/DejaVuSans.ttf"
        )))
        .unwrap()
    }

    fn vietnamese_name() -> RenderRequest {
        request(
            vec![
                FieldSpec::text("fullName", "Họ và tên").at(0, 100.0, 200.0),
                FieldSpec::text("birthPlace", "Nơi sinh").at(0, 100.0, 230.0),
            ],
            vec![
                ("fullName", FieldValue::text("NGUYỄN VĂN A")),
                ("birthPlace", FieldValue::text("Đống Đa, Hà Nội")),
            ],
        )
    }

    #[test]
    fn test_truetype_render_extracts_vietnamese() {
        let (dir, _) = renderer_with(&template(1, b"BT ET"));
        let renderer = Renderer::new(dir.path(), dejavu());

        let rendered = renderer.render(&vietnamese_name()).unwrap();
        let spans = extract_spans(&rendered.bytes, 0).unwrap();
        let name = span_near(&spans, "NGUYỄN VĂN A");
        assert!((name.x - 100.0).abs() < 0.5 && (name.y - 200.0).abs() < 0.5);
        assert_eq!(name.font_name, "DejaVuSans");
        let place = span_near(&spans, "Đống Đa, Hà Nội");
        assert!((place.y - 230.0).abs() < 0.5);

        let again = renderer.render(&vietnamese_name()).unwrap();
        assert_eq!(rendered.bytes, again.bytes);
    }

    #[test]
    fn test_standard_font_refuses_vietnamese() {
        let (_dir, renderer) = renderer_with(&template(1, b"BT ET"));
        match renderer.render(&vietnamese_name()) {
            Err(RenderError::UnsupportedText { field, font, chars }) => {
                assert_eq!(field, "fullName");
                assert_eq!(font, "Helvetica");
                assert_eq!(chars, "ĂỄ");
            }
            other => panic!("expected UnsupportedText, got {other:?}"),
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        let (_dir, renderer) = renderer_with(&template(1, b"BT ET"));
        let first = renderer.render(&name_and_birth()).unwrap();
        let second = renderer.render(&name_and_birth()).unwrap();
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn test_render_keeps_existing_content_and_fonts() {
        let header = b"BT /F1 12 Tf 50 800 Td (Header) Tj ET";
        let (_dir, renderer) = renderer_with(&template(1, header));
        let rendered = renderer.render(&name_and_birth()).unwrap();

        let spans = extract_spans(&rendered.bytes, 0).unwrap();
        let header_span = span_near(&spans, "Header");
        assert!((header_span.y - 42.0).abs() < 0.5);
        span_near(&spans, "Nguyen Van A");

        let doc = Document::load_mem(&rendered.bytes).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let fonts = doc.get_page_fonts(page_id).unwrap();
        assert!(fonts.contains_key(b"F1".as_slice()));
        assert!(fonts.contains_key(stamp::FONT_RESOURCE.as_bytes()));
    }

    #[test]
    fn test_untouched_page_left_alone() {
        let template_bytes = template(2, b"BT ET");
        let (_dir, renderer) = renderer_with(&template_bytes);
        let rendered = renderer.render(&name_and_birth()).unwrap();
        assert!(extract_spans(&rendered.bytes, 1).unwrap().is_empty());
        assert_eq!(inspect(&rendered.bytes).unwrap().len(), 2);
    }

    #[test]
    fn test_out_of_bounds_anchor_rejected() {
        let (_dir, renderer) = renderer_with(&template(1, b""));
        let req = request(
            vec![FieldSpec::text("fullName", "Name").at(0, 700.0, 200.0)],
            vec![("fullName", FieldValue::text("Nguyen Van A"))],
        );
        let err = renderer.render(&req).unwrap_err();
        assert!(matches!(
            err,
            RenderError::CoordinateOutOfBounds { ref field, page: 0, page_count: 1, .. }
                if field == "fullName"
        ));
    }

    #[test]
    fn test_missing_page_rejected() {
        let (_dir, renderer) = renderer_with(&template(1, b""));
        let req = request(
            vec![FieldSpec::text("fullName", "Name").at(1, 10.0, 10.0)],
            vec![("fullName", FieldValue::text("x"))],
        );
        assert!(matches!(
            renderer.render(&req),
            Err(RenderError::CoordinateOutOfBounds { page: 1, .. })
        ));
    }

    #[test]
    fn test_missing_template_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::new(dir.path(), FontAsset::Standard);
        match renderer.render(&name_and_birth()) {
            Err(RenderError::TemplateLoad { path, .. }) => {
                assert_eq!(path, dir.path().join("form.pdf"));
            }
            other => panic!("expected TemplateLoad, got {other:?}"),
        }
    }

    #[test]
    fn test_corrupt_template_rejected() {
        let (_dir, renderer) = renderer_with(b"%PDF-1.5 definitely not a pdf");
        assert!(matches!(
            renderer.render(&name_and_birth()),
            Err(RenderError::TemplateLoad { .. })
        ));
    }

    #[test]
    fn test_group_rows_over_capacity_warn() {
        let (_dir, renderer) = renderer_with(&template(1, b""));
        let group = FieldSpec::group(
            "jobs",
            "Jobs",
            GroupSpec {
                row_fields: vec!["unit".into()],
                columns: vec![GroupColumn {
                    x_offset: 0.0,
                    source: ColumnSource::Field {
                        field: "unit".into(),
                    },
                }],
                row_height: 20.0,
                capacity: 2,
                font_size: None,
            },
        )
        .at(0, 60.0, 400.0);
        let rows: Vec<Record> = ["ACME", "Globex", "Initech"]
            .iter()
            .map(|unit| {
                let mut row = Record::new();
                row.insert("unit".into(), unit.to_string());
                row
            })
            .collect();
        let req = request(
            vec![group, FieldSpec::text("unit", "Unit")],
            vec![("jobs", FieldValue::Rows(rows))],
        );

        let rendered = renderer.render(&req).unwrap();
        assert_eq!(rendered.warnings.len(), 1);
        let spans = extract_spans(&rendered.bytes, 0).unwrap();
        let texts: Vec<&str> = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["ACME", "Globex"]);
        assert!((spans[1].y - 420.0).abs() < 0.5);
        assert_eq!(spans[1].font_size, 8.0);
    }

    #[test]
    fn test_check_reports_every_bad_point() {
        let (_dir, renderer) = renderer_with(&template(1, b""));
        let fields = vec![
            FieldSpec::text("a", "A").at(0, 10.0, 10.0),
            FieldSpec::text("b", "B").at(0, 900.0, 10.0),
            FieldSpec::text("c", "C").at(2, 10.0, 10.0),
        ];
        let problems = renderer.check("form.pdf", &fields).unwrap();
        assert_eq!(problems.len(), 2);
    }

    #[test]
    fn test_inspect_page_sizes() {
        let pages = inspect(&template(2, b"")).unwrap();
        assert_eq!(
            pages[1],
            PageInfo {
                index: 1,
                width: 595.0,
                height: 842.0
            }
        );
    }

    #[test]
    fn test_extract_spans_unknown_page() {
        assert!(matches!(
            extract_spans(&template(1, b""), 4),
            Err(PdfError::PageNotFound { page: 4, page_count: 1 })
        ));
    }
}
