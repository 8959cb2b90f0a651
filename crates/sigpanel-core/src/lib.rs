//! Signature panel stamping for result PDFs
//!
//! Takes an uploaded PDF and stamps a fixed signature panel onto every
//! page, using lopdf.
//!
//! Two variants share the pipeline:
//! - [`Variant::Background`]: a new document where each page is the
//!   institutional background, the original page on top, then the panel
//! - [`Variant::Panel`]: the panel is stamped onto the original pages in place

pub mod assets;
pub mod compose;
pub mod error;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod font;
pub mod layout;
pub mod page;
pub mod stamp;
pub mod variant;

use std::time::Instant;

use lopdf::Document;
use tracing::info;

pub use assets::{AssetPaths, Assets, BACKGROUND_FILE, FONT_FILE};
pub use error::StampError;
pub use font::EmbeddedFont;
pub use layout::{Authority, PanelLayout, Signatory, TextPlacement};
pub use variant::{StampMetrics, StampOutput, Variant};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, StampError> {
    let doc = Document::load_mem(bytes).map_err(|e| StampError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

/// Run one upload through `variant` and serialize the result.
///
/// The output contains no timestamps or random IDs, so the same input
/// and assets always produce the same bytes.
pub fn stamp_document(
    input: &[u8],
    variant: Variant,
    assets: &Assets,
    layout: &PanelLayout,
) -> Result<StampOutput, StampError> {
    let started = Instant::now();

    let doc = Document::load_mem(input).map_err(|e| StampError::ParseError(e.to_string()))?;

    let (mut doc, page_count) = match variant {
        Variant::Background => {
            let background = assets.background.clone().ok_or_else(|| {
                StampError::BackgroundError("background was not loaded".into())
            })?;
            compose::compose_with_background(doc, background, &assets.font, layout)?
        }
        Variant::Panel => {
            let mut doc = doc;
            let count = stamp::stamp_in_place(&mut doc, &assets.font, layout)?;
            (doc, count)
        }
    };

    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| StampError::SerializationError(e.to_string()))?;

    let metrics = StampMetrics {
        variant,
        input_size_bytes: input.len(),
        output_size_bytes: buffer.len(),
        page_count,
        processing_time_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        "Stamped {} page(s) with {} variant: {} -> {} bytes in {}ms",
        metrics.page_count,
        variant,
        metrics.input_size_bytes,
        metrics.output_size_bytes,
        metrics.processing_time_ms
    );

    Ok(StampOutput {
        data: buffer,
        metrics,
    })
}
