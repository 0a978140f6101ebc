//! Reading source files into plain text for ingestion.
//!
//! `.pdf` files go through `pdf-extract` when the `pdf` feature is enabled;
//! every other file is read as UTF-8 text.

use std::path::Path;

use tracing::error;

use crate::error::{RagError, Result};

/// Whether `path` names a PDF, judged by its extension.
pub fn is_pdf(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Read the text content of a source file.
///
/// # Errors
///
/// - [`RagError::Io`] if the file cannot be read or is not valid UTF-8
/// - [`RagError::Extraction`] if a PDF cannot be parsed
/// - [`RagError::Configuration`] for a PDF when the `pdf` feature is off
pub async fn read_source_text(path: &Path) -> Result<String> {
    if is_pdf(path) {
        return read_pdf(path).await;
    }
    tokio::fs::read_to_string(path).await.map_err(|e| {
        error!(path = %path.display(), error = %e, "failed to read source file");
        RagError::from(e)
    })
}

#[cfg(feature = "pdf")]
async fn read_pdf(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        error!(path = %path.display(), error = %e, "failed to read source file");
        RagError::from(e)
    })?;
    let path_str = path.display().to_string();

    // Parsing is CPU-bound and may panic on malformed input.
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| RagError::extraction(&path_str, format!("extraction task failed: {e}")))?
        .map_err(|e| {
            error!(path = %path_str, error = %e, "failed to extract PDF text");
            RagError::extraction(&path_str, e.to_string())
        })?;

    tracing::debug!(path = %path_str, chars = text.chars().count(), "extracted PDF text");
    Ok(text)
}

#[cfg(not(feature = "pdf"))]
async fn read_pdf(path: &Path) -> Result<String> {
    error!(path = %path.display(), "PDF ingestion requested without the `pdf` feature");
    Err(RagError::Configuration(format!(
        "cannot read '{}': PDF support requires the `pdf` feature",
        path.display()
    )))
}
