//! Signature panel layout
//!
//! All coordinates here use a **top-left origin** with Y growing downward,
//! and every Y value is a text baseline. The stamper converts them to PDF
//! user space (bottom-left origin) against each page's visible box:
//! ```text
//! pdf_x = llx + x
//! pdf_y = ury - y
//! ```
//!
//! Nothing is measured: positions are hand-tuned constants and only the
//! date stamp depends on the page (it is anchored to the bottom edge).

use serde::{Deserialize, Serialize};

/// A role/name row in one of the signatory columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signatory {
    pub role: String,
    pub name: String,
}

impl Signatory {
    pub fn new(role: &str, name: &str) -> Self {
        Self {
            role: role.to_string(),
            name: name.to_string(),
        }
    }
}

/// An additional authority block: signature line, name, title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authority {
    pub name: String,
    pub title: String,
    /// Extra X offset of the title relative to the line and name
    pub title_indent: f32,
}

/// One resolved text draw in layout coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct TextPlacement {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub text: String,
}

impl TextPlacement {
    fn new(x: f32, y: f32, size: f32, text: &str) -> Self {
        Self {
            x,
            y,
            size,
            text: text.to_string(),
        }
    }
}

/// Fixed geometry and content of the signature panel.
///
/// `Default` yields the institutional panel; every page of every document
/// gets the same panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelLayout {
    /// Body text size; headers and authority blocks use `font_size + 1`
    pub font_size: f32,
    pub line_spacing: f32,
    /// Baseline of the header row
    pub start_y: f32,
    pub left_x: f32,
    pub right_x: f32,
    pub name_offset: f32,
    pub signature_offset: f32,
    pub authority_offset: f32,
    /// Gap between the taller signatory column and the authority line
    pub authority_margin: f32,
    pub authority_name_gap: f32,
    pub authority_title_gap: f32,
    pub signature_line: String,
    pub authority_line: String,
    pub date_text: String,
    pub date_x: f32,
    /// Distance of the date baseline above the bottom edge
    pub date_bottom_offset: f32,
    pub prepared_by: Vec<Signatory>,
    pub approvers: Vec<Signatory>,
    pub left_authority: Authority,
    pub right_authority: Authority,
}

impl Default for PanelLayout {
    fn default() -> Self {
        Self {
            font_size: 10.0,
            line_spacing: 24.0,
            start_y: 675.0,
            left_x: 50.0,
            right_x: 620.0,
            name_offset: 120.0,
            signature_offset: 300.0,
            authority_offset: 180.0,
            authority_margin: 20.0,
            authority_name_gap: 20.0,
            authority_title_gap: 10.0,
            signature_line: "_".repeat(18),
            authority_line: "_".repeat(26),
            date_text: "Date: _____________".to_string(),
            date_x: 30.0,
            date_bottom_offset: 30.0,
            prepared_by: vec![
                Signatory::new("Tabulation Incharge", "Mr. Daipayan Mandal"),
                Signatory::new("Tabulation Member", "Mr. Prakash Jangle"),
            ],
            approvers: vec![
                Signatory::new("GMC Chairman", "Dr. E. Siva Prasad"),
                Signatory::new("GMC Member", "Dr. Sanjaykumar Borikar"),
                Signatory::new("GMC Member", "Mr. Pradyanshil Ramteke"),
            ],
            left_authority: Authority {
                name: "Dr. Anantkumar N. Dabhade".to_string(),
                title: "Controller of Examination".to_string(),
                title_indent: 5.0,
            },
            right_authority: Authority {
                name: "Dr. Avinash N. Shrikhande".to_string(),
                title: "Principal".to_string(),
                title_indent: 25.0,
            },
        }
    }
}

impl PanelLayout {
    pub fn header_size(&self) -> f32 {
        self.font_size + 1.0
    }

    /// Baseline of the authority signature lines: below the taller column
    pub fn authority_y(&self) -> f32 {
        let rows = self.prepared_by.len().max(self.approvers.len());
        #[allow(clippy::cast_precision_loss)]
        let column_end = self.start_y + self.line_spacing * (rows as f32 + 1.0);
        column_end + self.authority_margin
    }

    /// Every text draw for one page, in drawing order
    pub fn placements(&self, page_height: f32) -> Vec<TextPlacement> {
        let header = self.header_size();
        let mut out = Vec::new();

        for (x, title) in [(self.left_x, "Prepared by"), (self.right_x, "Approved by")] {
            out.push(TextPlacement::new(x, self.start_y, header, title));
            out.push(TextPlacement::new(x + self.name_offset, self.start_y, header, "Name"));
            out.push(TextPlacement::new(
                x + self.signature_offset,
                self.start_y,
                header,
                "Signature",
            ));
        }

        for (x, column) in [(self.left_x, &self.prepared_by), (self.right_x, &self.approvers)] {
            let mut y = self.start_y + self.line_spacing;
            for signatory in column {
                out.push(TextPlacement::new(x, y, self.font_size, &signatory.role));
                out.push(TextPlacement::new(
                    x + self.name_offset,
                    y,
                    self.font_size,
                    &signatory.name,
                ));
                out.push(TextPlacement::new(
                    x + self.signature_offset,
                    y,
                    self.font_size,
                    &self.signature_line,
                ));
                y += self.line_spacing;
            }
        }

        let auth_y = self.authority_y();
        for (x, authority) in [
            (self.left_x, &self.left_authority),
            (self.right_x, &self.right_authority),
        ] {
            let x = x + self.authority_offset;
            let name_y = auth_y + self.authority_name_gap;
            out.push(TextPlacement::new(x, auth_y, header, &self.authority_line));
            out.push(TextPlacement::new(x, name_y, header, &authority.name));
            out.push(TextPlacement::new(
                x + authority.title_indent,
                name_y + self.authority_title_gap,
                header,
                &authority.title,
            ));
        }

        out.push(TextPlacement::new(
            self.date_x,
            page_height - self.date_bottom_offset,
            self.font_size,
            &self.date_text,
        ));

        out
    }
}
