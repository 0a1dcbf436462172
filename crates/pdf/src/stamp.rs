//! Drawing planned stamps onto template pages.

use std::collections::BTreeMap;

use autoly_core::Stamp;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use unicode_normalization::UnicodeNormalization;

use crate::font::{FontAsset, PreparedFont};
use crate::parser::backend::{LopdfBackend, MediaBox, PageId};
use crate::RenderError;

/// Resource name of the stamping font inside each touched page.
pub const FONT_RESOURCE: &str = "FAutoly";

/// Shrinking never goes below this size; past it the text overflows.
const MIN_FONT_SIZE: f32 = 5.0;

/// Page ids and boxes in page order.
pub(crate) fn page_boxes(backend: &LopdfBackend) -> Result<Vec<(PageId, MediaBox)>, RenderError> {
    backend
        .page_ids()
        .into_iter()
        .map(|id| {
            backend
                .media_box(id)
                .map(|mb| (id, mb))
                .map_err(RenderError::from)
        })
        .collect()
}

/// The error for `stamp` if it falls outside its page, or off the document.
pub(crate) fn bounds_violation(pages: &[(PageId, MediaBox)], stamp: &Stamp) -> Option<RenderError> {
    let media_box = pages.get(stamp.page).map(|(_, mb)| *mb);
    if let Some(mb) = media_box {
        if mb.contains(stamp.x, stamp.y) {
            return None;
        }
    }
    let (width, height) = media_box.map_or((0.0, 0.0), |mb| (mb.width(), mb.height()));
    Some(RenderError::CoordinateOutOfBounds {
        field: stamp.field.to_string(),
        page: stamp.page,
        x: stamp.x,
        y: stamp.y,
        page_count: pages.len(),
        width,
        height,
    })
}

/// Draw `stamps` into `doc`. Every stamp must already have passed
/// [`bounds_violation`].
pub(crate) fn apply(
    doc: &mut Document,
    pages: &[(PageId, MediaBox)],
    stamps: &[Stamp],
    font: &FontAsset,
) -> Result<(), RenderError> {
    let texts: Vec<(&Stamp, String)> = stamps
        .iter()
        .map(|stamp| (stamp, stamp.text.nfc().collect::<String>()))
        .filter(|(_, text)| !text.trim().is_empty())
        .collect();
    if texts.is_empty() {
        return Ok(());
    }

    for (stamp, text) in &texts {
        let missing = font.missing_chars(text);
        if !missing.is_empty() {
            return Err(RenderError::UnsupportedText {
                field: stamp.field.to_string(),
                font: font.name().to_string(),
                chars: missing.into_iter().collect(),
            });
        }
    }

    let prepared = font.prepare(texts.iter().map(|(_, text)| text.as_str()))?;
    let font_id = prepared.embed(doc)?;

    let mut by_page: BTreeMap<usize, Vec<(&Stamp, &str)>> = BTreeMap::new();
    for (stamp, text) in &texts {
        by_page.entry(stamp.page).or_default().push((*stamp, text.as_str()));
    }

    for (page, items) in by_page {
        let (page_id, media_box) = pages.get(page).copied().ok_or_else(|| {
            RenderError::Pdf(format!("page {page} disappeared from the template"))
        })?;
        let operations = text_operations(&prepared, &media_box, &items);
        stamp_page(doc, page_id, operations, font_id)?;
        log::debug!("stamped {} string(s) on page {}", items.len(), page);
    }

    Ok(())
}

fn text_operations(
    font: &PreparedFont<'_>,
    media_box: &MediaBox,
    items: &[(&Stamp, &str)],
) -> Vec<Operation> {
    let mut ops = vec![Operation::new("BT", vec![])];
    for (stamp, text) in items {
        let size = fitted_size(font, text, stamp.font_size, stamp.max_width);
        if size < stamp.font_size {
            log::debug!("{}: shrunk {:?} to {:.1}pt", stamp.field, text, size);
        }
        let (x, y) = media_box.to_user_space(stamp.x, stamp.y);
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), Object::Real(size)],
        ));
        ops.push(Operation::new(
            "Tm",
            vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                Object::Real(x),
                Object::Real(y),
            ],
        ));
        ops.push(Operation::new("Tj", vec![font.encode(text)]));
    }
    ops.push(Operation::new("ET", vec![]));
    ops
}

/// Scale `size` down so `text` fits in `max_width`.
fn fitted_size(font: &PreparedFont<'_>, text: &str, size: f32, max_width: Option<f32>) -> f32 {
    let Some(max_width) = max_width else {
        return size;
    };
    let width = font.text_width(text, size);
    if width <= max_width || width <= 0.0 {
        return size;
    }
    (size * max_width / width).max(MIN_FONT_SIZE)
}

/// Wrap the page's existing content in `q`/`Q`, append ours, and register
/// the font in the page resources.
fn stamp_page(
    doc: &mut Document,
    page_id: PageId,
    operations: Vec<Operation>,
    font_id: ObjectId,
) -> Result<(), RenderError> {
    let existing = existing_contents(doc, page_id)?;
    let mut resources = inherited_resources(doc, page_id)?;

    let mut fonts = match resources.get(b"Font") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).cloned().unwrap_or_default(),
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    fonts.set(FONT_RESOURCE, font_id);
    resources.set("Font", fonts);

    let mut body = b"\nQ\nq\n".to_vec();
    body.extend(
        Content { operations }
            .encode()
            .map_err(|e| RenderError::Pdf(format!("cannot encode content stream: {e}")))?,
    );
    body.extend_from_slice(b"\nQ\n");

    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let body_id = doc.add_object(Stream::new(Dictionary::new(), body));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(body_id));

    let page = doc
        .get_dictionary_mut(page_id)
        .map_err(|e| RenderError::Pdf(format!("cannot get page object: {e}")))?;
    page.set("Contents", contents);
    page.set("Resources", resources);
    Ok(())
}

/// The page's content streams as a list, however the file spells them.
fn existing_contents(doc: &Document, page_id: PageId) -> Result<Vec<Object>, RenderError> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| RenderError::Pdf(format!("cannot get page object: {e}")))?;
    Ok(match page.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    })
}

/// A copy of the page's resource dictionary, looked up through the page
/// tree when the page itself has none.
fn inherited_resources(doc: &Document, page_id: PageId) -> Result<Dictionary, RenderError> {
    let mut node = doc
        .get_dictionary(page_id)
        .map_err(|e| RenderError::Pdf(format!("cannot get page object: {e}")))?;
    loop {
        match node.get(b"Resources") {
            Ok(Object::Dictionary(dict)) => return Ok(dict.clone()),
            Ok(Object::Reference(id)) => {
                return doc
                    .get_dictionary(*id)
                    .cloned()
                    .map_err(|e| RenderError::Pdf(format!("cannot resolve resources: {e}")));
            }
            _ => {}
        }
        let Some(parent) = node
            .get(b"Parent")
            .ok()
            .and_then(|p| p.as_reference().ok())
            .and_then(|id| doc.get_dictionary(id).ok())
        else {
            return Ok(Dictionary::new());
        };
        node = parent;
    }
}
