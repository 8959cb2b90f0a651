//! Static assets: the panel font and the institutional background
//!
//! Both live at fixed file names under an asset root. Their presence is
//! checked before anything is read so a misconfigured deployment reports
//! every missing file at once.

use std::path::{Path, PathBuf};

use lopdf::Document;
use tracing::{debug, warn};

use crate::error::StampError;
use crate::font::EmbeddedFont;
use crate::variant::Variant;

pub const FONT_FILE: &str = "times.ttf";
pub const BACKGROUND_FILE: &str = "TR background.pdf";

/// Locations of the static assets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    pub font: PathBuf,
    pub background: PathBuf,
}

impl Default for AssetPaths {
    /// The fixed file names, relative to the working directory
    fn default() -> Self {
        Self {
            font: PathBuf::from(FONT_FILE),
            background: PathBuf::from(BACKGROUND_FILE),
        }
    }
}

impl AssetPaths {
    /// The fixed file names under `root`
    pub fn in_dir(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            font: root.join(FONT_FILE),
            background: root.join(BACKGROUND_FILE),
        }
    }

    /// Files `variant` cannot run without
    pub fn required(&self, variant: Variant) -> Vec<&Path> {
        let mut required = vec![self.font.as_path()];
        if variant.uses_background() {
            required.push(self.background.as_path());
        }
        required
    }

    /// Required files that do not exist, in check order
    pub fn missing(&self, variant: Variant) -> Vec<PathBuf> {
        self.required(variant)
            .into_iter()
            .filter(|p| !p.exists())
            .map(Path::to_path_buf)
            .collect()
    }

    /// Fail with `MissingAssets` naming every absent file
    pub fn verify(&self, variant: Variant) -> Result<(), StampError> {
        let missing = self.missing(variant);
        if missing.is_empty() {
            Ok(())
        } else {
            warn!("Missing assets for {}: {:?}", variant, missing);
            Err(StampError::MissingAssets(missing))
        }
    }
}

/// Assets loaded for one request
#[derive(Debug, Clone)]
pub struct Assets {
    pub font: EmbeddedFont,
    /// Present only for variants that use the background
    pub background: Option<Document>,
}

impl Assets {
    /// Verify, read and parse everything `variant` needs
    pub fn load(paths: &AssetPaths, variant: Variant) -> Result<Self, StampError> {
        paths.verify(variant)?;

        let font = EmbeddedFont::parse(read(&paths.font)?)?;

        let background = if variant.uses_background() {
            let bytes = read(&paths.background)?;
            let doc = Document::load_mem(&bytes)
                .map_err(|e| StampError::BackgroundError(e.to_string()))?;
            if doc.get_pages().is_empty() {
                return Err(StampError::BackgroundError(
                    "background PDF has no pages".into(),
                ));
            }
            Some(doc)
        } else {
            None
        };

        debug!("Loaded assets for {}", variant);
        Ok(Self { font, background })
    }
}

fn read(path: &Path) -> Result<Vec<u8>, StampError> {
    std::fs::read(path).map_err(|source| StampError::Io {
        path: path.to_path_buf(),
        source,
    })
}
