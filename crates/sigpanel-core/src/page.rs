//! Page tree helpers: inherited attributes, visible box, content bytes

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::StampError;

/// Depth limit when walking `/Parent` links, guards against cyclic trees
const MAX_TREE_DEPTH: usize = 32;

/// A page rectangle in PDF user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl PageBox {
    /// US Letter, used when a page carries no usable box
    pub const LETTER: PageBox = PageBox {
        llx: 0.0,
        lly: 0.0,
        urx: 612.0,
        ury: 792.0,
    };

    /// A box of the given size anchored at the origin
    pub fn sized(width: f32, height: f32) -> Self {
        Self {
            llx: 0.0,
            lly: 0.0,
            urx: width,
            ury: height,
        }
    }

    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }

    /// Convert a top-left-origin layout point to PDF user space
    pub fn to_pdf(&self, x: f32, y: f32) -> (f32, f32) {
        (self.llx + x, self.ury - y)
    }

    pub fn to_object(self) -> Object {
        Object::Array(vec![
            Object::Real(self.llx),
            Object::Real(self.lly),
            Object::Real(self.urx),
            Object::Real(self.ury),
        ])
    }

    fn from_object(doc: &Document, obj: &Object) -> Option<Self> {
        let arr = resolve(doc, obj).as_array().ok()?;
        if arr.len() != 4 {
            return None;
        }
        let values: Vec<f32> = arr
            .iter()
            .filter_map(|o| match resolve(doc, o) {
                #[allow(clippy::cast_precision_loss)]
                Object::Integer(i) => Some(*i as f32),
                Object::Real(r) => Some(*r),
                _ => None,
            })
            .collect();
        if values.len() != 4 {
            return None;
        }
        // Boxes may be given with any two opposite corners
        let b = PageBox {
            llx: values[0].min(values[2]),
            lly: values[1].min(values[3]),
            urx: values[0].max(values[2]),
            ury: values[1].max(values[3]),
        };
        (b.width() > 0.0 && b.height() > 0.0).then_some(b)
    }
}

/// Follow a single indirect reference; other objects are returned as-is
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Look up a page attribute, walking up the page tree for inheritable keys
pub fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent_id = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent_id).ok()?;
    }
    None
}

/// The page's visible area: CropBox if present, else MediaBox
pub fn visible_box(doc: &Document, page_id: ObjectId) -> PageBox {
    [b"CropBox".as_slice(), b"MediaBox".as_slice()]
        .iter()
        .find_map(|key| {
            inherited_attribute(doc, page_id, key).and_then(|obj| PageBox::from_object(doc, obj))
        })
        .unwrap_or(PageBox::LETTER)
}

/// The page's `/Rotate`, normalized to 0, 90, 180 or 270.
///
/// Values that are not a multiple of 90 are invalid and read as 0.
pub fn page_rotation(doc: &Document, page_id: ObjectId) -> u16 {
    let rotate = inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|obj| resolve(doc, obj).as_i64().ok())
        .unwrap_or(0)
        .rem_euclid(360);
    match rotate {
        90 => 90,
        180 => 180,
        270 => 270,
        _ => 0,
    }
}

/// A page as a viewer displays it: the visible box turned by `/Rotate`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageView {
    pub bbox: PageBox,
    pub rotation: u16,
}

impl PageView {
    pub fn of(doc: &Document, page_id: ObjectId) -> Self {
        Self {
            bbox: visible_box(doc, page_id),
            rotation: page_rotation(doc, page_id),
        }
    }

    /// Displayed size, anchored at the origin. Width and height swap for
    /// quarter turns.
    pub fn frame(&self) -> PageBox {
        match self.rotation {
            90 | 270 => PageBox::sized(self.bbox.height(), self.bbox.width()),
            _ => PageBox::sized(self.bbox.width(), self.bbox.height()),
        }
    }

    /// Matrix taking page user space onto [`PageView::frame`], clockwise by
    /// the page rotation
    pub fn to_frame_matrix(&self) -> [f32; 6] {
        let PageBox { llx, lly, .. } = self.bbox;
        let (w, h) = (self.bbox.width(), self.bbox.height());
        let [a, b, c, d, e, f] = match self.rotation {
            90 => [0.0, -1.0, 1.0, 0.0, 0.0, w],
            180 => [-1.0, 0.0, 0.0, -1.0, w, h],
            270 => [0.0, 1.0, -1.0, 0.0, h, 0.0],
            _ => [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        };
        [a, b, c, d, e - a * llx - c * lly, f - b * llx - d * lly]
    }

    /// Matrix taking [`PageView::frame`] coordinates back to page user space
    pub fn to_user_matrix(&self) -> [f32; 6] {
        let [a, b, c, d, e, f] = self.to_frame_matrix();
        // Rotations and translations only, so the determinant is 1
        let det = a * d - b * c;
        [
            d / det,
            -b / det,
            -c / det,
            a / det,
            (c * f - d * e) / det,
            (b * e - a * f) / det,
        ]
    }
}

/// Effective resource dictionary of a page, resolved and cloned
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    inherited_attribute(doc, page_id, b"Resources")
        .and_then(|obj| resolve(doc, obj).as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

/// Concatenated, decoded content streams of a page
pub fn page_content(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>, StampError> {
    let mut content = Vec::new();
    for stream_id in doc.get_page_contents(page_id) {
        let stream = doc.get_object(stream_id)?.as_stream()?;
        let bytes = if stream.dict.has(b"Filter") {
            stream
                .decompressed_content()
                .map_err(|e| StampError::ParseError(format!("content stream: {}", e)))?
        } else {
            stream.content.clone()
        };
        content.extend_from_slice(&bytes);
        // Streams may split tokens only at whitespace
        content.push(b'\n');
    }
    Ok(content)
}
