//! Evidence Aggregator: turns uploaded PDFs into one tagged text blob.
//!
//! Extraction is CPU-bound and runs on the blocking pool, one task per
//! document. Results are collected in input order so the combined text never
//! depends on which document finished first.

use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::errors::AppError;

/// An uploaded source document.
#[derive(Debug, Clone)]
pub struct EvidenceDocument {
    pub filename: String,
    pub bytes: Bytes,
}

impl EvidenceDocument {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("extraction task aborted: {0}")]
    Aborted(String),
}

/// Pulls plain text out of a document. Implementations must be pure reads.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// Production extractor backed by `pdf-extract`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
    }
}

/// Outcome of extracting one document. `text` is `None` when the document
/// failed or produced only whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// 1-based position in the full upload list.
    pub position: usize,
    pub filename: String,
    pub text: Option<String>,
}

/// Combined evidence text and the documents that contributed to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregatedEvidence {
    pub text: String,
    pub processed_files: Vec<String>,
}

impl AggregatedEvidence {
    /// Appends another aggregate that covers later positions.
    #[cfg(test)]
    pub fn extend(&mut self, other: AggregatedEvidence) {
        self.text.push_str(&other.text);
        self.processed_files.extend(other.processed_files);
    }
}

/// Separator line placed before each document's text.
pub fn document_marker(position: usize, filename: &str) -> String {
    format!("\n=== DOCUMENT {position}: {filename} ===\n")
}

/// Concatenates successful extractions in the order given.
pub fn combine(extracted: &[ExtractedDocument]) -> AggregatedEvidence {
    let mut combined = AggregatedEvidence::default();
    for doc in extracted {
        if let Some(text) = doc.text.as_deref() {
            combined
                .text
                .push_str(&document_marker(doc.position, &doc.filename));
            combined.text.push_str(text);
            combined.text.push('\n');
            combined.processed_files.push(doc.filename.clone());
        }
    }
    combined
}

/// Extracts every document and combines the readable ones.
///
/// Individual failures are logged and skipped. Fails with `NoContent` only
/// when no document yields text.
pub async fn aggregate<E>(
    documents: &[EvidenceDocument],
    extractor: E,
    timeout: Duration,
) -> Result<AggregatedEvidence, AppError>
where
    E: TextExtractor + Clone + 'static,
{
    let handles: Vec<_> = documents
        .iter()
        .map(|doc| {
            let extractor = extractor.clone();
            let bytes = doc.bytes.clone();
            tokio::task::spawn_blocking(move || extractor.extract(&bytes))
        })
        .collect();

    let mut extracted = Vec::with_capacity(documents.len());
    for (index, (doc, handle)) in documents.iter().zip(handles).enumerate() {
        let outcome = match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(result)) => result,
            // A panic inside the PDF parser surfaces as a JoinError.
            Ok(Err(join_err)) => Err(ExtractError::Aborted(join_err.to_string())),
            Err(_) => Err(ExtractError::Timeout(timeout)),
        };

        let text = match outcome {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                warn!("Document {} yielded no readable text", doc.filename);
                None
            }
            Err(e) => {
                warn!("Error processing document {}: {e}", doc.filename);
                None
            }
        };

        extracted.push(ExtractedDocument {
            position: index + 1,
            filename: doc.filename.clone(),
            text,
        });
    }

    let combined = combine(&extracted);
    if combined.text.trim().is_empty() {
        return Err(AppError::NoContent(
            "No readable content found in any PDF files".to_string(),
        ));
    }

    info!(
        "Aggregated evidence from {}/{} documents ({} chars)",
        combined.processed_files.len(),
        documents.len(),
        combined.text.len()
    );
    Ok(combined)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
