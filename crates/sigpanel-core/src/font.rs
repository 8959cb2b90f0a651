//! TrueType font embedding
//!
//! The panel font is embedded as a simple TrueType font with
//! `WinAnsiEncoding` and the full font program in `FontFile2`. Text is
//! written as single-byte WinAnsi codes, so only glyphs reachable through
//! that encoding are usable; anything else is drawn as `?`.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::error::StampError;

const FIRST_CHAR: u8 = 32;
const LAST_CHAR: u8 = 255;
const FALLBACK_NAME: &str = "SignatureFont";

/// Unicode values of WinAnsi codes 0x80..=0x9F (0 = undefined)
const WIN_ANSI_HIGH: [u16; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
    0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

/// Unicode character for a WinAnsi code, if the code is defined
fn win_ansi_char(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(char::from(code)),
        0x80..=0x9F => match WIN_ANSI_HIGH[usize::from(code - 0x80)] {
            0 => None,
            uni => char::from_u32(u32::from(uni)),
        },
        _ => None,
    }
}

/// Encode text as WinAnsi bytes, replacing unmappable characters with `?`
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let code = u32::from(c);
            match code {
                0x20..=0x7E | 0xA0..=0xFF => code as u8,
                _ => WIN_ANSI_HIGH
                    .iter()
                    .position(|&uni| uni != 0 && u32::from(uni) == code)
                    .map(|i| 0x80 + i as u8)
                    .unwrap_or(b'?'),
            }
        })
        .collect()
}

/// Metrics needed for the font dictionary and descriptor, in 1000-unit text space
#[derive(Debug, Clone, PartialEq)]
pub struct FontMetrics {
    pub postscript_name: String,
    pub bbox: [i64; 4],
    pub ascent: i64,
    pub descent: i64,
    pub cap_height: i64,
    pub italic_angle: f32,
    pub fixed_pitch: bool,
    pub missing_width: i64,
    /// Advance widths for codes `FIRST_CHAR..=LAST_CHAR`
    pub widths: Vec<i64>,
}

impl FontMetrics {
    fn flags(&self) -> i64 {
        // Nonsymbolic
        let mut flags = 32;
        if self.fixed_pitch {
            flags |= 1;
        }
        if self.italic_angle != 0.0 {
            flags |= 64;
        }
        flags
    }
}

/// A parsed TrueType font ready to be embedded into documents
#[derive(Debug, Clone)]
pub struct EmbeddedFont {
    data: Vec<u8>,
    metrics: FontMetrics,
}

impl EmbeddedFont {
    /// Parse a TrueType font program
    pub fn parse(data: Vec<u8>) -> Result<Self, StampError> {
        let metrics = {
            let face = ttf_parser::Face::parse(&data, 0)
                .map_err(|e| StampError::FontError(e.to_string()))?;
            metrics_from_face(&face)
        };
        debug!(
            "Parsed font {} ({} bytes)",
            metrics.postscript_name,
            data.len()
        );
        Ok(Self { data, metrics })
    }

    pub fn metrics(&self) -> &FontMetrics {
        &self.metrics
    }

    /// Add the font program, descriptor and font dictionary to `doc`.
    ///
    /// Returns the font dictionary id for use in `/Font` resources.
    pub fn embed(&self, doc: &mut Document) -> ObjectId {
        let m = &self.metrics;

        let mut file_dict = Dictionary::new();
        file_dict.set("Length1", Object::Integer(self.data.len() as i64));
        let file_id = doc.add_object(Object::Stream(Stream::new(file_dict, self.data.clone())));

        let mut descriptor = Dictionary::new();
        descriptor.set("Type", Object::Name(b"FontDescriptor".to_vec()));
        descriptor.set("FontName", Object::Name(m.postscript_name.as_bytes().to_vec()));
        descriptor.set("Flags", Object::Integer(m.flags()));
        descriptor.set(
            "FontBBox",
            Object::Array(m.bbox.iter().map(|&v| Object::Integer(v)).collect()),
        );
        descriptor.set("ItalicAngle", Object::Real(m.italic_angle));
        descriptor.set("Ascent", Object::Integer(m.ascent));
        descriptor.set("Descent", Object::Integer(m.descent));
        descriptor.set("CapHeight", Object::Integer(m.cap_height));
        descriptor.set("StemV", Object::Integer(80));
        descriptor.set("MissingWidth", Object::Integer(m.missing_width));
        descriptor.set("FontFile2", Object::Reference(file_id));
        let descriptor_id = doc.add_object(Object::Dictionary(descriptor));

        let mut font = Dictionary::new();
        font.set("Type", Object::Name(b"Font".to_vec()));
        font.set("Subtype", Object::Name(b"TrueType".to_vec()));
        font.set("BaseFont", Object::Name(m.postscript_name.as_bytes().to_vec()));
        font.set("FirstChar", Object::Integer(i64::from(FIRST_CHAR)));
        font.set("LastChar", Object::Integer(i64::from(LAST_CHAR)));
        font.set(
            "Widths",
            Object::Array(m.widths.iter().map(|&w| Object::Integer(w)).collect()),
        );
        font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
        font.set("FontDescriptor", Object::Reference(descriptor_id));
        doc.add_object(Object::Dictionary(font))
    }
}

fn metrics_from_face(face: &ttf_parser::Face<'_>) -> FontMetrics {
    let upem = f64::from(face.units_per_em());
    let scale = |v: f64| (v * 1000.0 / upem).round() as i64;

    let missing_width = face
        .glyph_hor_advance(ttf_parser::GlyphId(0))
        .map(|adv| scale(f64::from(adv)))
        .unwrap_or(0);

    let widths = (FIRST_CHAR..=LAST_CHAR)
        .map(|code| {
            win_ansi_char(code)
                .and_then(|ch| face.glyph_index(ch))
                .and_then(|gid| face.glyph_hor_advance(gid))
                .map(|adv| scale(f64::from(adv)))
                .unwrap_or(missing_width)
        })
        .collect();

    let bbox = face.global_bounding_box();
    let ascent = scale(f64::from(face.ascender()));

    FontMetrics {
        postscript_name: postscript_name(face),
        bbox: [
            scale(f64::from(bbox.x_min)),
            scale(f64::from(bbox.y_min)),
            scale(f64::from(bbox.x_max)),
            scale(f64::from(bbox.y_max)),
        ],
        ascent,
        descent: scale(f64::from(face.descender())),
        cap_height: face
            .capital_height()
            .map(|h| scale(f64::from(h)))
            .unwrap_or(ascent),
        italic_angle: face.italic_angle(),
        fixed_pitch: face.is_monospaced(),
        missing_width,
        widths,
    }
}

/// PostScript name from the `name` table, reduced to characters valid in a PDF name
fn postscript_name(face: &ttf_parser::Face<'_>) -> String {
    let name = face
        .names()
        .into_iter()
        .filter(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
        .find_map(|n| n.to_string())
        .map(|n| {
            n.chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .collect::<String>()
        })
        .unwrap_or_default();

    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name
    }
}
