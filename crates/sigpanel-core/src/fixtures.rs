//! Test fixtures: synthetic PDFs, a minimal TrueType font, and helpers
//! for inspecting stamped output.

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};

use crate::assets::{BACKGROUND_FILE, FONT_FILE};
use crate::page;

/// Create a PDF with `num_pages` pages of `width` x `height`, each showing
/// `"{prefix}-Page-{n}"` in Helvetica
pub fn create_sized_pdf(num_pages: u32, prefix: &str, width: i64, height: i64) -> Vec<u8> {
    create_rotated_pdf(num_pages, prefix, width, height, 0)
}

/// Like [`create_sized_pdf`], with `/Rotate` set on every page when non-zero
pub fn create_rotated_pdf(
    num_pages: u32,
    prefix: &str,
    width: i64,
    height: i64,
    rotate: i64,
) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));
    let resources_id = doc.add_object(Dictionary::from_iter([(
        "Font",
        Object::Dictionary(Dictionary::from_iter([("F1", Object::Reference(font_id))])),
    )]));

    let mut kids = Vec::new();
    for page_num in 0..num_pages {
        let content = format!(
            "BT /F1 12 Tf 50 700 Td ({}-Page-{}) Tj ET",
            prefix,
            page_num + 1
        );
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut page = Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Reference(resources_id)),
            (
                "MediaBox",
                Object::Array(vec![0.into(), 0.into(), width.into(), height.into()]),
            ),
        ]);
        if rotate != 0 {
            page.set("Rotate", Object::Integer(rotate));
        }
        let page_id = doc.add_object(page);
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(i64::from(num_pages))),
            ("Kids", Object::Array(kids)),
        ])),
    );

    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("save test pdf");
    buffer
}

/// Landscape legal-sized pages, large enough to hold the whole panel
pub fn create_test_pdf(num_pages: u32, prefix: &str) -> Vec<u8> {
    create_sized_pdf(num_pages, prefix, 1008, 842)
}

/// Landscape result sheets stored as portrait pages turned by `/Rotate 90`
pub fn create_rotated_test_pdf(num_pages: u32, prefix: &str) -> Vec<u8> {
    create_rotated_pdf(num_pages, prefix, 842, 1008, 90)
}

/// One-page letterhead used as the background layer
pub fn create_background_pdf() -> Vec<u8> {
    create_sized_pdf(1, "Letterhead", 595, 842)
}

/// A PDF whose page inherits MediaBox and Resources from the page tree
/// and whose CropBox is offset from the origin
pub fn create_inherited_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));
    let content_id = doc.add_object(Stream::new(
        Dictionary::new(),
        b"BT /F1 12 Tf 80 700 Td (Inherited) Tj ET".to_vec(),
    ));
    let page_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(pages_id)),
        ("Contents", Object::Reference(content_id)),
        (
            "CropBox",
            Object::Array(vec![10.into(), 20.into(), 1010.into(), 870.into()]),
        ),
    ]));

    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(1)),
            ("Kids", Object::Array(vec![Object::Reference(page_id)])),
            (
                "MediaBox",
                Object::Array(vec![0.into(), 0.into(), 1100.into(), 900.into()]),
            ),
            (
                "Resources",
                Object::Dictionary(Dictionary::from_iter([(
                    "Font",
                    Object::Dictionary(Dictionary::from_iter([(
                        "F1",
                        Object::Reference(font_id),
                    )])),
                )])),
            ),
        ])),
    );

    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("save test pdf");
    buffer
}

/// Smallest TrueType font `ttf-parser` accepts: `cmap` (format 0),
/// `head`, `hhea`, `hmtx`, `maxp`. Two glyphs: `.notdef` (500 units) and
/// one glyph (600 units) shared by printable ASCII. 1000 units per em.
pub fn minimal_truetype_font() -> Vec<u8> {
    fn be16(out: &mut Vec<u8>, v: u16) {
        out.extend_from_slice(&v.to_be_bytes());
    }
    fn be32(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_be_bytes());
    }

    let mut cmap = Vec::new();
    be16(&mut cmap, 0); // version
    be16(&mut cmap, 1); // numTables
    be16(&mut cmap, 0); // platform: Unicode
    be16(&mut cmap, 3); // encoding: BMP
    be32(&mut cmap, 12); // subtable offset
    be16(&mut cmap, 0); // format
    be16(&mut cmap, 262); // length
    be16(&mut cmap, 0); // language
    cmap.extend((0u16..256).map(|code| u8::from((32..=126).contains(&code))));

    let mut head = Vec::new();
    be16(&mut head, 1);
    be16(&mut head, 0);
    be32(&mut head, 0x0001_0000); // fontRevision
    be32(&mut head, 0); // checksumAdjustment
    be32(&mut head, 0x5F0F_3CF5); // magicNumber
    be16(&mut head, 0); // flags
    be16(&mut head, 1000); // unitsPerEm
    head.extend_from_slice(&[0; 16]); // created, modified
    for v in [0i16, -200, 600, 800] {
        head.extend_from_slice(&v.to_be_bytes());
    }
    be16(&mut head, 0); // macStyle
    be16(&mut head, 8); // lowestRecPPEM
    be16(&mut head, 2); // fontDirectionHint
    be16(&mut head, 0); // indexToLocFormat
    be16(&mut head, 0); // glyphDataFormat

    let mut hhea = Vec::new();
    be32(&mut hhea, 0x0001_0000);
    for v in [800i16, -200, 0] {
        hhea.extend_from_slice(&v.to_be_bytes());
    }
    be16(&mut hhea, 600); // advanceWidthMax
    for v in [0i16, 0, 600, 1, 0, 0, 0, 0, 0, 0, 0] {
        hhea.extend_from_slice(&v.to_be_bytes());
    }
    be16(&mut hhea, 2); // numberOfHMetrics

    let mut hmtx = Vec::new();
    for (advance, lsb) in [(500u16, 0u16), (600, 0)] {
        be16(&mut hmtx, advance);
        be16(&mut hmtx, lsb);
    }

    let mut maxp = Vec::new();
    be32(&mut maxp, 0x0000_5000);
    be16(&mut maxp, 2);

    // Table records must be sorted by tag
    let tables: [(&[u8; 4], Vec<u8>); 5] = [
        (b"cmap", cmap),
        (b"head", head),
        (b"hhea", hhea),
        (b"hmtx", hmtx),
        (b"maxp", maxp),
    ];

    let mut font = Vec::new();
    be32(&mut font, 0x0001_0000);
    be16(&mut font, tables.len() as u16);
    be16(&mut font, 64); // searchRange
    be16(&mut font, 2); // entrySelector
    be16(&mut font, 16); // rangeShift

    let mut offset = 12 + 16 * tables.len();
    let mut body = Vec::new();
    for (tag, data) in &tables {
        font.extend_from_slice(*tag);
        be32(&mut font, 0); // checksum, unchecked
        be32(&mut font, offset as u32);
        be32(&mut font, data.len() as u32);

        body.extend_from_slice(data);
        while body.len() % 4 != 0 {
            body.push(0);
        }
        offset = 12 + 16 * tables.len() + body.len();
    }
    font.extend_from_slice(&body);
    font
}

/// Write the font (and optionally the background) under their fixed names in `dir`
pub fn write_assets(dir: &Path, with_background: bool) {
    std::fs::write(dir.join(FONT_FILE), minimal_truetype_font()).expect("write font");
    if with_background {
        std::fs::write(dir.join(BACKGROUND_FILE), create_background_pdf())
            .expect("write background");
    }
}

/// Decoded content operations of page `page_num` (1-based)
pub fn page_operations(pdf: &[u8], page_num: u32) -> Vec<Operation> {
    let doc = Document::load_mem(pdf).expect("load pdf");
    let page_id = doc.get_pages()[&page_num];
    let content = page::page_content(&doc, page_id).expect("page content");
    Content::decode(&content).expect("decode content").operations
}

/// Text shown with `Tj` on a page, with the `Td` position it was drawn at
pub fn shown_text(pdf: &[u8], page_num: u32) -> Vec<(f32, f32, String)> {
    let mut pos = (0.0, 0.0);
    let mut out = Vec::new();
    for op in page_operations(pdf, page_num) {
        match op.operator.as_str() {
            "Td" => {
                let coord = |o: &Object| match o {
                    Object::Integer(i) => *i as f32,
                    Object::Real(r) => *r,
                    _ => 0.0,
                };
                pos = (coord(&op.operands[0]), coord(&op.operands[1]));
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    out.push((pos.0, pos.1, String::from_utf8_lossy(bytes).into_owned()));
                }
            }
            _ => {}
        }
    }
    out
}
