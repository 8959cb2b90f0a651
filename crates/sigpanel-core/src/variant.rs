use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which stamping pipeline to run on an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Build a new document: institutional background, original page, signature panel.
    Background,
    /// Stamp the signature panel onto the uploaded pages in place.
    Panel,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::Background, Variant::Panel];

    /// URL slug used by the HTTP routes
    pub fn slug(self) -> &'static str {
        match self {
            Variant::Background => "background",
            Variant::Panel => "panel",
        }
    }

    /// Filename offered to the browser for the processed PDF
    pub fn download_name(self) -> &'static str {
        match self {
            Variant::Background => "final_document_with_background.pdf",
            Variant::Panel => "signature_panel_output.pdf",
        }
    }

    pub fn uses_background(self) -> bool {
        matches!(self, Variant::Background)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::ALL
            .into_iter()
            .find(|v| v.slug() == s)
            .ok_or_else(|| format!("Unknown variant '{}'", s))
    }
}

/// Result of one stamping run
#[derive(Debug, Clone)]
pub struct StampOutput {
    pub data: Vec<u8>,
    pub metrics: StampMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct StampMetrics {
    pub variant: Variant,
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub processing_time_ms: u64,
}
