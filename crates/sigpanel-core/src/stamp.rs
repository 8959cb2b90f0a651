//! Signature panel stamping

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::error::StampError;
use crate::font::{encode_win_ansi, EmbeddedFont};
use crate::layout::{PanelLayout, TextPlacement};
use crate::page::{page_resources, resolve, PageBox, PageView};

/// Resource name of the panel font on stamped pages
pub const FONT_RESOURCE: &str = "FSigPanel";

/// Content operations drawing `placements` on a page occupying `frame`
pub fn stamp_operations(placements: &[TextPlacement], frame: &PageBox) -> Vec<Operation> {
    let mut ops = Vec::with_capacity(placements.len() * 5 + 3);
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new("g", vec![Object::Integer(0)]));
    for placement in placements {
        let (x, y) = frame.to_pdf(placement.x, placement.y);
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![
                Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
                Object::Real(placement.size),
            ],
        ));
        ops.push(Operation::new("Td", vec![Object::Real(x), Object::Real(y)]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::string_literal(encode_win_ansi(&placement.text))],
        ));
        ops.push(Operation::new("ET", vec![]));
    }
    ops.push(Operation::new("Q", vec![]));
    ops
}

/// Stamp the panel onto every page of `doc`, keeping existing content.
///
/// The original content is wrapped in `q ... Q` so its graphics state
/// cannot leak into the panel. Pages keep their `/Rotate`; on rotated pages
/// the panel is laid out in the displayed frame and mapped back to user
/// space with `cm`, so it reads upright. Returns the number of stamped pages.
pub fn stamp_in_place(
    doc: &mut Document,
    font: &EmbeddedFont,
    layout: &PanelLayout,
) -> Result<u32, StampError> {
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
        return Ok(0);
    }

    let font_id = font.embed(doc);
    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));

    for (index, &page_id) in pages.iter().enumerate() {
        let view = PageView::of(doc, page_id);

        let mut operations = vec![Operation::new("Q", vec![])];
        if view.rotation == 0 {
            operations.extend(stamp_operations(
                &layout.placements(view.bbox.height()),
                &view.bbox,
            ));
        } else {
            let frame = view.frame();
            let to_user = view.to_user_matrix().into_iter().map(Object::Real).collect();
            operations.push(Operation::new("q", vec![]));
            operations.push(Operation::new("cm", to_user));
            operations.extend(stamp_operations(&layout.placements(frame.height()), &frame));
            operations.push(Operation::new("Q", vec![]));
        }
        let content = Content { operations }
            .encode()
            .map_err(|e| StampError::OperationError(e.to_string()))?;
        let stamp_id = doc.add_object(Stream::new(Dictionary::new(), content));

        let mut contents = vec![Object::Reference(save_id)];
        contents.extend(
            doc.get_page_contents(page_id)
                .into_iter()
                .map(Object::Reference),
        );
        contents.push(Object::Reference(stamp_id));

        let resources = resources_with_font(doc, page_id, font_id);

        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
        page.set("Contents", Object::Array(contents));
        page.set("Resources", Object::Dictionary(resources));

        debug!("Stamped page {} in place", index + 1);
    }

    Ok(pages.len() as u32)
}

/// The page's effective resources with the panel font added
fn resources_with_font(doc: &Document, page_id: ObjectId, font_id: ObjectId) -> Dictionary {
    let mut resources = page_resources(doc, page_id);
    let mut fonts = resources
        .get(b"Font")
        .ok()
        .and_then(|obj| resolve(doc, obj).as_dict().ok())
        .cloned()
        .unwrap_or_default();
    fonts.set(FONT_RESOURCE, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));
    resources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{
        create_inherited_pdf, create_rotated_test_pdf, create_test_pdf, minimal_truetype_font,
    };
    use crate::page::{page_content, page_rotation, visible_box};
    use pretty_assertions::assert_eq;

    fn stamp(input: &[u8]) -> (Document, u32) {
        let font = EmbeddedFont::parse(minimal_truetype_font()).unwrap();
        let mut doc = Document::load_mem(input).unwrap();
        let count = stamp_in_place(&mut doc, &font, &PanelLayout::default()).unwrap();
        (doc, count)
    }

    #[test]
    fn test_stamp_operations_convert_to_pdf_space() {
        let placements = vec![TextPlacement {
            x: 30.0,
            y: 812.0,
            size: 10.0,
            text: "Date: _____________".to_string(),
        }];
        let ops = stamp_operations(&placements, &PageBox::sized(1008.0, 842.0));
        let operators: Vec<&str> = ops.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(operators, vec!["q", "g", "BT", "Tf", "Td", "Tj", "ET", "Q"]);

        let td: Vec<f32> = ops[4].operands.iter().map(|o| o.as_float().unwrap()).collect();
        assert_eq!(td, vec![30.0, 30.0]);
    }

    #[test]
    fn test_stamp_in_place_keeps_original_content() {
        let (doc, count) = stamp(&create_test_pdf(2, "Result"));
        assert_eq!(count, 2);

        let page_id = doc.get_pages()[&2];
        let content = String::from_utf8_lossy(&page_content(&doc, page_id).unwrap()).into_owned();
        let original = content.find("(Result-Page-2) Tj").unwrap();
        let panel = content.find("(Prepared by) Tj").unwrap();
        assert!(original < panel, "panel is drawn over the original content");
        assert!(content.starts_with("q\n"));
    }

    #[test]
    fn test_stamp_in_place_adds_font_next_to_existing_fonts() {
        let (doc, _) = stamp(&create_test_pdf(1, "Result"));
        let page_id = doc.get_pages()[&1];
        let resources = page_resources(&doc, page_id);
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(FONT_RESOURCE.as_bytes()));
    }

    #[test]
    fn test_stamp_in_place_uses_crop_box_frame() {
        let (doc, _) = stamp(&create_inherited_pdf());
        let page_id = doc.get_pages()[&1];
        let ops = Content::decode(&page_content(&doc, page_id).unwrap())
            .unwrap()
            .operations;
        let last_td = ops.iter().rev().find(|op| op.operator == "Td").unwrap();
        let date: Vec<f32> = last_td
            .operands
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect();
        // date at (30, height - 30) in a crop box 10 20 1010 870
        assert_eq!(date, vec![40.0, 50.0]);
    }

    #[test]
    fn test_rotated_page_gets_upright_panel() {
        let (doc, _) = stamp(&create_rotated_test_pdf(1, "Rotated"));
        let page_id = doc.get_pages()[&1];
        assert_eq!(page_rotation(&doc, page_id), 90);
        assert_eq!(visible_box(&doc, page_id), PageBox::sized(842.0, 1008.0));

        let ops = Content::decode(&page_content(&doc, page_id).unwrap())
            .unwrap()
            .operations;
        let cm = ops.iter().rev().find(|op| op.operator == "cm").unwrap();
        let matrix: Vec<f32> = cm.operands.iter().map(|o| o.as_float().unwrap()).collect();
        assert_eq!(matrix, vec![0.0, 1.0, -1.0, 0.0, 842.0, 0.0]);

        // date sits at (30, 842 - 30) in the displayed 1008 x 842 frame
        let last_td = ops.iter().rev().find(|op| op.operator == "Td").unwrap();
        let date: Vec<f32> = last_td
            .operands
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect();
        assert_eq!(date, vec![30.0, 812.0]);
    }

    #[test]
    fn test_zero_pages_is_a_no_op() {
        let (doc, count) = stamp(&create_test_pdf(0, "Empty"));
        assert_eq!(count, 0);
        assert!(doc.get_pages().is_empty());
    }
}
