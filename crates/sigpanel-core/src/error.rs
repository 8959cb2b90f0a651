use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StampError {
    #[error("The following required files were not found: {}", join_paths(.0))]
    MissingAssets(Vec<PathBuf>),

    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Invalid font: {0}")]
    FontError(String),

    #[error("Invalid background PDF: {0}")]
    BackgroundError(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Failed to read asset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<lopdf::Error> for StampError {
    fn from(err: lopdf::Error) -> Self {
        StampError::OperationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_assets_names_every_file() {
        let err = StampError::MissingAssets(vec![
            PathBuf::from("times.ttf"),
            PathBuf::from("TR background.pdf"),
        ]);
        assert_eq!(
            err.to_string(),
            "The following required files were not found: times.ttf, TR background.pdf"
        );
    }
}
