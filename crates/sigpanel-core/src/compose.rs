//! Background compositing
//!
//! Builds a new document where every page is layered as:
//! 1. the background page, fit proportionally and centered
//! 2. the original page, drawn 1:1 as a viewer displays it
//! 3. the signature panel
//!
//! Both lower layers are embedded as Form XObjects. The background form is
//! created once and shared by every output page. Output pages carry no
//! `/Rotate`: a rotated source page is turned upright by its form matrix
//! and the output page takes its displayed size.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::StampError;
use crate::font::EmbeddedFont;
use crate::layout::PanelLayout;
use crate::page::{page_content, page_resources, PageBox, PageView};
use crate::stamp::{stamp_operations, FONT_RESOURCE};

const BACKGROUND_XOBJECT: &str = "SigBg";
const PAGE_XOBJECT: &str = "SigPage";

/// Layer `input` over the first page of `background` and stamp the panel
/// onto every page. Returns the new document and its page count.
pub fn compose_with_background(
    input: Document,
    background: Document,
    font: &EmbeddedFont,
    layout: &PanelLayout,
) -> Result<(Document, u32), StampError> {
    let mut out = Document::with_version("1.7");
    let pages_id = out.new_object_id();

    let input_pages = import_document(&mut out, input);
    let background_pages = import_document(&mut out, background);

    let mut kids = Vec::with_capacity(input_pages.len());
    if !input_pages.is_empty() {
        let background_page = *background_pages.first().ok_or_else(|| {
            StampError::BackgroundError("background PDF has no pages".into())
        })?;
        let background_view = PageView::of(&out, background_page);
        let background_form = page_to_form(&mut out, background_page, &background_view)?;
        let font_id = font.embed(&mut out);

        for (index, source_page) in input_pages.into_iter().enumerate() {
            let source_view = PageView::of(&out, source_page);
            let page_form = page_to_form(&mut out, source_page, &source_view)?;
            let frame = source_view.frame();

            let fit: Vec<Object> = fit_matrix(background_view.frame(), frame)
                .into_iter()
                .map(Object::Real)
                .collect();
            let mut operations = vec![
                Operation::new("q", vec![]),
                Operation::new("cm", fit),
                Operation::new("Do", vec![Object::Name(BACKGROUND_XOBJECT.into())]),
                Operation::new("Q", vec![]),
                Operation::new("q", vec![]),
                Operation::new("Do", vec![Object::Name(PAGE_XOBJECT.into())]),
                Operation::new("Q", vec![]),
            ];
            operations.extend(stamp_operations(
                &layout.placements(frame.height()),
                &frame,
            ));

            let content = Content { operations }
                .encode()
                .map_err(|e| StampError::OperationError(e.to_string()))?;
            let content_id = out.add_object(Stream::new(Dictionary::new(), content));

            let mut xobjects = Dictionary::new();
            xobjects.set(BACKGROUND_XOBJECT, Object::Reference(background_form));
            xobjects.set(PAGE_XOBJECT, Object::Reference(page_form));
            let mut fonts = Dictionary::new();
            fonts.set(FONT_RESOURCE, Object::Reference(font_id));
            let mut resources = Dictionary::new();
            resources.set("XObject", Object::Dictionary(xobjects));
            resources.set("Font", Object::Dictionary(fonts));

            let mut page = Dictionary::new();
            page.set("Type", Object::Name(b"Page".to_vec()));
            page.set("Parent", Object::Reference(pages_id));
            page.set("MediaBox", frame.to_object());
            page.set("Resources", Object::Dictionary(resources));
            page.set("Contents", Object::Reference(content_id));
            kids.push(Object::Reference(out.add_object(Object::Dictionary(page))));

            debug!(
                "Composed page {} ({} x {})",
                index + 1,
                frame.width(),
                frame.height()
            );
        }
    }

    let page_count = kids.len() as u32;
    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(i64::from(page_count)));
    pages.set("Kids", Object::Array(kids));
    out.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = out.add_object(Object::Dictionary(catalog));
    out.trailer.set("Root", Object::Reference(catalog_id));

    // Drop the source catalogs, page trees and anything only they referenced
    out.prune_objects();
    out.renumber_objects();

    Ok((out, page_count))
}

/// Matrix that fits `source` proportionally inside `target`, centered
fn fit_matrix(source: PageBox, target: PageBox) -> [f32; 6] {
    let scale = (target.width() / source.width()).min(target.height() / source.height());
    let tx = target.llx + (target.width() - source.width() * scale) / 2.0;
    let ty = target.lly + (target.height() - source.height() * scale) / 2.0;
    [scale, 0.0, 0.0, scale, tx, ty]
}

/// Wrap a page's content and resources in a Form XObject that draws the
/// page upright, with the lower-left corner of its displayed frame at the
/// origin
fn page_to_form(
    doc: &mut Document,
    page_id: ObjectId,
    view: &PageView,
) -> Result<ObjectId, StampError> {
    let content = page_content(doc, page_id)?;
    let resources = page_resources(doc, page_id);

    let mut form = Dictionary::new();
    form.set("Type", Object::Name(b"XObject".to_vec()));
    form.set("Subtype", Object::Name(b"Form".to_vec()));
    form.set("FormType", Object::Integer(1));
    form.set("BBox", view.bbox.to_object());
    form.set(
        "Matrix",
        Object::Array(view.to_frame_matrix().into_iter().map(Object::Real).collect()),
    );
    form.set("Resources", Object::Dictionary(resources));

    Ok(doc.add_object(Object::Stream(Stream::new(form, content))))
}

/// Move every object of `source` into `dest` under fresh ids.
///
/// Returns the source's page ids, remapped, in page order.
fn import_document(dest: &mut Document, source: Document) -> Vec<ObjectId> {
    let id_offset = dest.max_id;
    let pages: Vec<ObjectId> = source
        .get_pages()
        .values()
        .map(|&(num, gen)| (num + id_offset, gen))
        .collect();

    let remapped: BTreeMap<ObjectId, Object> = source
        .objects
        .into_iter()
        .map(|(old_id, object)| {
            (
                (old_id.0 + id_offset, old_id.1),
                remap_object_refs(object, id_offset),
            )
        })
        .collect();
    dest.objects.extend(remapped);
    dest.max_id = (source.max_id + id_offset).max(dest.max_id);

    pages
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{
        create_background_pdf, create_inherited_pdf, create_rotated_test_pdf, create_test_pdf,
        minimal_truetype_font,
    };
    use crate::page::{page_rotation, visible_box};

    fn compose(input: &[u8]) -> (Document, u32) {
        let font = EmbeddedFont::parse(minimal_truetype_font()).unwrap();
        let input = Document::load_mem(input).unwrap();
        let background = Document::load_mem(&create_background_pdf()).unwrap();
        compose_with_background(input, background, &font, &PanelLayout::default()).unwrap()
    }

    #[test]
    fn test_fit_matrix_centers_narrow_background() {
        // 595 x 842 portrait fit into 1008 x 842: height-bound
        let m = fit_matrix(PageBox::sized(595.0, 842.0), PageBox::sized(1008.0, 842.0));
        assert_eq!(m[0], 1.0);
        assert_eq!(m[3], 1.0);
        assert_eq!(m[4], (1008.0 - 595.0) / 2.0);
        assert_eq!(m[5], 0.0);
    }

    #[test]
    fn test_fit_matrix_scales_up_small_background() {
        let m = fit_matrix(PageBox::sized(100.0, 100.0), PageBox::sized(400.0, 200.0));
        assert_eq!(m[0], 2.0);
        assert_eq!(m[4], 100.0);
        assert_eq!(m[5], 0.0);
    }

    #[test]
    fn test_compose_keeps_page_count() {
        let (doc, count) = compose(&create_test_pdf(3, "Result"));
        assert_eq!(count, 3);
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn test_background_is_drawn_before_original() {
        let (doc, _) = compose(&create_test_pdf(1, "Result"));
        let page_id = doc.get_pages()[&1];
        let content = page_content(&doc, page_id).unwrap();
        let ops = Content::decode(&content).unwrap().operations;

        let drawn: Vec<Vec<u8>> = ops
            .iter()
            .filter(|op| op.operator == "Do")
            .map(|op| op.operands[0].as_name().unwrap().to_vec())
            .collect();
        assert_eq!(
            drawn,
            vec![b"SigBg".to_vec(), b"SigPage".to_vec()],
            "background must be painted first so the original stays on top"
        );

        // stamp text comes after both layers
        let first_text = ops.iter().position(|op| op.operator == "Tj").unwrap();
        let last_do = ops.iter().rposition(|op| op.operator == "Do").unwrap();
        assert!(first_text > last_do);
    }

    #[test]
    fn test_original_form_carries_page_content_and_resources() {
        let (doc, _) = compose(&create_test_pdf(2, "Result"));
        let page_id = doc.get_pages()[&2];
        let resources = page_resources(&doc, page_id);
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let form_id = xobjects.get(b"SigPage").unwrap().as_reference().unwrap();
        let form = doc.get_object(form_id).unwrap().as_stream().unwrap();

        let content = form.decompressed_content().unwrap_or(form.content.clone());
        assert!(String::from_utf8_lossy(&content).contains("(Result-Page-2) Tj"));
        let form_resources = form.dict.get(b"Resources").unwrap().as_dict().unwrap();
        assert!(form_resources.has(b"Font"));
    }

    #[test]
    fn test_background_form_is_shared() {
        let (doc, _) = compose(&create_test_pdf(3, "Result"));
        let forms: Vec<ObjectId> = doc
            .get_pages()
            .values()
            .map(|&page_id| {
                let resources = page_resources(&doc, page_id);
                resources
                    .get(b"XObject")
                    .unwrap()
                    .as_dict()
                    .unwrap()
                    .get(b"SigBg")
                    .unwrap()
                    .as_reference()
                    .unwrap()
            })
            .collect();
        assert!(forms.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_output_page_uses_source_dimensions() {
        let (doc, _) = compose(&create_inherited_pdf());
        let page_id = doc.get_pages()[&1];
        // CropBox 10 20 1010 870 becomes a 1000 x 850 page at the origin
        assert_eq!(visible_box(&doc, page_id), PageBox::sized(1000.0, 850.0));
    }

    #[test]
    fn test_rotated_page_is_composed_upright() {
        // 842 x 1008 portrait page with /Rotate 90, displayed as 1008 x 842
        let (doc, _) = compose(&create_rotated_test_pdf(1, "Rotated"));
        let page_id = doc.get_pages()[&1];
        assert_eq!(visible_box(&doc, page_id), PageBox::sized(1008.0, 842.0));
        assert_eq!(page_rotation(&doc, page_id), 0);

        let resources = page_resources(&doc, page_id);
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let form_id = xobjects.get(b"SigPage").unwrap().as_reference().unwrap();
        let form = doc.get_object(form_id).unwrap().as_stream().unwrap();
        let matrix: Vec<f32> = form
            .dict
            .get(b"Matrix")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect();
        assert_eq!(matrix, vec![0.0, -1.0, 1.0, 0.0, 0.0, 842.0]);
    }

    #[test]
    fn test_rotated_page_panel_fits_displayed_frame() {
        let (doc, _) = compose(&create_rotated_test_pdf(1, "Rotated"));
        let page_id = doc.get_pages()[&1];
        let ops = Content::decode(&page_content(&doc, page_id).unwrap())
            .unwrap()
            .operations;
        for td in ops.iter().filter(|op| op.operator == "Td") {
            let x = td.operands[0].as_float().unwrap();
            let y = td.operands[1].as_float().unwrap();
            assert!((0.0..1008.0).contains(&x), "x {x} outside the page");
            assert!((0.0..842.0).contains(&y), "y {y} outside the page");
        }
    }

    #[test]
    fn test_zero_page_input_produces_empty_document() {
        let (doc, count) = compose(&create_test_pdf(0, "Empty"));
        assert_eq!(count, 0);
        assert!(doc.get_pages().is_empty());
    }

    #[test]
    fn test_empty_background_is_rejected() {
        let font = EmbeddedFont::parse(minimal_truetype_font()).unwrap();
        let input = Document::load_mem(&create_test_pdf(1, "Result")).unwrap();
        let background = Document::load_mem(&create_test_pdf(0, "Empty")).unwrap();
        let result = compose_with_background(input, background, &font, &PanelLayout::default());
        assert!(matches!(result, Err(StampError::BackgroundError(_))));
    }

    #[test]
    fn test_remap_object_refs_offsets_nested_references() {
        let mut kid = Dictionary::new();
        kid.set("Kid", Object::Reference((2, 0)));
        let obj = Object::Array(vec![
            Object::Reference((1, 0)),
            Object::Dictionary(kid),
        ]);
        let remapped = remap_object_refs(obj, 10);
        let arr = remapped.as_array().unwrap();
        assert_eq!(arr[0].as_reference().unwrap(), (11, 0));
        let dict = arr[1].as_dict().unwrap();
        assert_eq!(dict.get(b"Kid").unwrap().as_reference().unwrap(), (12, 0));
    }
}
