//! Page-level lopdf plumbing: inherited attributes, font resources and
//! appending a content stream on top of the existing page content.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::metrics::StandardFont;
use super::RenderError;

/// Page tree nodes deeper than this are treated as a reference cycle.
const MAX_TREE_DEPTH: usize = 32;

/// The page's MediaBox, lower-left corner plus extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageBox {
    pub llx: f32,
    pub lly: f32,
    pub width: f32,
    pub height: f32,
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object, lopdf::Error> {
    match obj {
        Object::Reference(id) => doc.get_object(*id),
        _ => Ok(obj),
    }
}

/// Looks `key` up on the page, then on its ancestors in the page tree.
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        if depth > MAX_TREE_DEPTH {
            return None;
        }
        let dict = doc.get_object(id).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }
    None
}

pub(crate) fn page_box(doc: &Document, page_id: ObjectId) -> Result<PageBox, RenderError> {
    let media_box = inherited_attribute(doc, page_id, b"MediaBox")
        .ok_or_else(|| RenderError::MalformedPage("page has no MediaBox".to_string()))?;
    let values = resolve(doc, &media_box)?.as_array()?;
    if values.len() != 4 {
        return Err(RenderError::MalformedPage(format!(
            "MediaBox has {} entries",
            values.len()
        )));
    }

    let coords = values
        .iter()
        .map(|v| resolve(doc, v).and_then(Object::as_float))
        .collect::<Result<Vec<f32>, _>>()?;

    Ok(PageBox {
        llx: coords[0].min(coords[2]),
        lly: coords[1].min(coords[3]),
        width: (coords[2] - coords[0]).abs(),
        height: (coords[3] - coords[1]).abs(),
    })
}

/// Adds `font` to the page's font resources and returns the resource name.
///
/// The page's effective resources (possibly inherited or shared) are copied
/// onto the page itself, so other pages keep their resources untouched.
pub(crate) fn register_font(
    doc: &mut Document,
    page_id: ObjectId,
    font: StandardFont,
) -> Result<Vec<u8>, RenderError> {
    let mut resources = match inherited_attribute(doc, page_id, b"Resources") {
        Some(obj) => resolve(doc, &obj)?.as_dict()?.clone(),
        None => Dictionary::new(),
    };

    let mut fonts = match resources.get(b"Font") {
        Ok(obj) => resolve(doc, obj)?.as_dict()?.clone(),
        Err(_) => Dictionary::new(),
    };

    let mut index = 1;
    let name = loop {
        let candidate = format!("FCert{}", index);
        if !fonts.has(candidate.as_bytes()) {
            break candidate.into_bytes();
        }
        index += 1;
    };

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.base_font(),
        "Encoding" => "WinAnsiEncoding",
    });
    fonts.set(name.clone(), Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Resources", Object::Dictionary(resources));

    Ok(name)
}

/// Draws `operations` on top of the page.
///
/// Existing content is bracketed by `q`/`Q` so a graphics state it leaves
/// behind (a CTM change, a clip) cannot displace the overlay.
pub(crate) fn overlay_content(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<(), RenderError> {
    let existing = {
        let page_dict = doc.get_object(page_id)?.as_dict()?;
        match page_dict.get(b"Contents") {
            Ok(Object::Array(items)) => items.clone(),
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(other) => vec![other.clone()],
            Err(_) => Vec::new(),
        }
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    let mut overlay_ops = operations;
    if !existing.is_empty() {
        let save = Content {
            operations: vec![Operation::new("q", vec![])],
        };
        let save_id = doc.add_object(Stream::new(dictionary! {}, encode(save)?));
        contents.push(Object::Reference(save_id));
        contents.extend(existing);
        overlay_ops.insert(0, Operation::new("Q", vec![]));
    }

    let overlay = Content {
        operations: overlay_ops,
    };
    let overlay_id = doc.add_object(Stream::new(dictionary! {}, encode(overlay)?));
    contents.push(Object::Reference(overlay_id));

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Contents", Object::Array(contents));

    Ok(())
}

fn encode(content: Content) -> Result<Vec<u8>, RenderError> {
    content
        .encode()
        .map_err(|e| RenderError::Encode(e.to_string()))
}
