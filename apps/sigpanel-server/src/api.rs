//! API handlers for the signature panel server
//!
//! Provides:
//! - The single-page upload UI
//! - Health and asset readiness
//! - One stamping endpoint per variant, returning the PDF as a download

use std::time::Duration;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, HeaderName, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sigpanel_core::{stamp_document, Assets, StampOutput, Variant};
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::AppState;

/// Multipart field carrying the uploaded PDF
pub const UPLOAD_FIELD: &str = "file";

/// The PDF header may be preceded by junk, but only within the first KiB
const PDF_HEADER_WINDOW: usize = 1024;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Handler: GET /
pub async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub variants: Vec<VariantStatus>,
}

/// Whether a variant's assets are in place
#[derive(Serialize)]
pub struct VariantStatus {
    pub variant: Variant,
    pub download_name: &'static str,
    pub ready: bool,
    pub missing: Vec<String>,
}

/// Handler: GET /health
pub async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let variants = Variant::ALL
        .into_iter()
        .map(|variant| {
            let missing: Vec<String> = state
                .assets
                .missing(variant)
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            VariantStatus {
                variant,
                download_name: variant.download_name(),
                ready: missing.is_empty(),
                missing,
            }
        })
        .collect();

    Json(HealthResponse {
        status: "healthy",
        service: "sigpanel-server",
        version: env!("CARGO_PKG_VERSION"),
        variants,
    })
}

/// Handler: POST /api/stamp/:variant
pub async fn handle_stamp(
    State(state): State<AppState>,
    Path(variant): Path<String>,
    multipart: Multipart,
) -> Result<Response, ServerError> {
    let variant: Variant = variant
        .parse()
        .map_err(|_| ServerError::UnknownVariant(variant.clone()))?;

    let upload = read_upload(multipart).await?;
    info!(
        "Received {} ({} bytes) for {} variant",
        upload.file_name.as_deref().unwrap_or("<unnamed>"),
        upload.bytes.len(),
        variant
    );
    debug!("Upload content type: {:?}", upload.content_type);

    // Report missing assets before spending time on the upload
    state.assets.verify(variant)?;

    let output = run_stamp(&state, variant, upload.bytes).await?;
    Ok(pdf_download(variant, output))
}

/// The uploaded file as received
#[derive(Debug)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ServerError> {
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!("Ignoring multipart field {:?}", field.name());
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(upload_error)?.to_vec();

        validate_pdf_upload(content_type.as_deref(), file_name.as_deref(), &bytes)
            .map_err(ServerError::InvalidRequest)?;

        return Ok(Upload {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(ServerError::InvalidRequest(format!(
        "Missing '{}' field in upload",
        UPLOAD_FIELD
    )))
}

fn upload_error(err: MultipartError) -> ServerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge(err.body_text())
    } else {
        ServerError::InvalidRequest(format!("Malformed upload: {}", err.body_text()))
    }
}

/// Accept only uploads that are declared as PDF and start like one
pub fn validate_pdf_upload(
    content_type: Option<&str>,
    file_name: Option<&str>,
    bytes: &[u8],
) -> Result<(), String> {
    let declared_pdf = content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/pdf"))
        || file_name.is_some_and(|name| name.to_ascii_lowercase().ends_with(".pdf"));
    if !declared_pdf {
        return Err("Only PDF files are accepted".to_string());
    }

    if bytes.is_empty() {
        return Err("Uploaded file is empty".to_string());
    }

    let window = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
    if !window.windows(5).any(|w| w == b"%PDF-") {
        return Err("Uploaded file does not look like a PDF".to_string());
    }

    Ok(())
}

/// Load assets and stamp on the blocking pool, bounded by the state's timeout
async fn run_stamp(
    state: &AppState,
    variant: Variant,
    input: Vec<u8>,
) -> Result<StampOutput, ServerError> {
    let paths = state.assets.clone();
    let layout = state.layout.clone();
    let timeout_ms = state.timeout_ms;

    let result = tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        tokio::task::spawn_blocking(move || {
            let assets = Assets::load(&paths, variant)?;
            stamp_document(&input, variant, &assets, &layout)
        }),
    )
    .await;

    match result {
        Ok(Ok(output)) => output.map_err(ServerError::from),
        Ok(Err(join_error)) => Err(ServerError::Internal(format!(
            "Processing task panicked: {}",
            join_error
        ))),
        Err(_timeout) => {
            // The blocking task cannot be cancelled; it runs to completion
            // and its result is dropped
            warn!(
                "{} stamp exceeded {}ms, abandoning the running task",
                variant, timeout_ms
            );
            Err(ServerError::Timeout(timeout_ms))
        }
    }
}

fn pdf_download(variant: Variant, output: StampOutput) -> Response {
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", variant.download_name()),
        ),
        (
            HeaderName::from_static("x-page-count"),
            output.metrics.page_count.to_string(),
        ),
    ];
    (StatusCode::OK, headers, output.data).into_response()
}

#[cfg(test)]
mod validation_tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_pdf_content_type() {
        assert!(validate_pdf_upload(Some("application/pdf"), None, b"%PDF-1.7\n").is_ok());
    }

    #[test]
    fn accepts_pdf_extension_without_content_type() {
        assert!(validate_pdf_upload(None, Some("Result.PDF"), b"%PDF-1.4\n").is_ok());
    }

    #[test]
    fn accepts_header_after_leading_junk() {
        let mut bytes = vec![b' '; 100];
        bytes.extend_from_slice(b"%PDF-1.5");
        assert!(validate_pdf_upload(Some("application/pdf"), None, &bytes).is_ok());
    }

    #[test]
    fn rejects_other_declared_types() {
        let err = validate_pdf_upload(Some("image/png"), Some("scan.png"), b"%PDF-1.7").unwrap_err();
        assert_eq!(err, "Only PDF files are accepted");
    }

    #[test]
    fn rejects_empty_upload() {
        let err = validate_pdf_upload(Some("application/pdf"), None, b"").unwrap_err();
        assert_eq!(err, "Uploaded file is empty");
    }

    proptest! {
        #[test]
        fn rejects_bytes_without_pdf_header(bytes in proptest::collection::vec(any::<u8>(), 1..2048)) {
            prop_assume!(!bytes.windows(5).any(|w| w == b"%PDF-"));
            prop_assert!(validate_pdf_upload(Some("application/pdf"), None, &bytes).is_err());
        }

        #[test]
        fn content_type_parameters_are_ignored(charset in "[a-z0-9-]{1,12}") {
            let ct = format!("application/pdf; charset={}", charset);
            prop_assert!(validate_pdf_upload(Some(&ct), None, b"%PDF-1.7").is_ok());
        }
    }
}
