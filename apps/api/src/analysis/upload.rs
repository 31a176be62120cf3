//! Multipart upload parsing and validation for the analysis endpoints.
//!
//! Everything here runs before any extraction or generation call, so a bad
//! upload never costs an external request.

use axum::extract::Multipart;
use bytes::Bytes;
use tracing::debug;

use crate::errors::AppError;
use crate::evidence::EvidenceDocument;
use crate::llm_client::ApiCredential;

/// A file part of the upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

/// Raw form fields, as received.
#[derive(Debug, Default)]
pub struct AnalysisUpload {
    pub csv_file: Option<UploadedFile>,
    pub pdf_files: Vec<UploadedFile>,
    pub business_name: Option<String>,
    pub api_key: Option<String>,
    pub swot_analysis: Option<String>,
}

/// The fields every task needs: dataset, company query and credential.
#[derive(Debug)]
pub struct ProfileForm {
    pub csv: Bytes,
    pub business_name: String,
    pub credential: ApiCredential,
}

impl AnalysisUpload {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut upload = AnalysisUpload::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "csv_file" | "pdf_files" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.map_err(|e| {
                        AppError::Validation(format!("Could not read file '{filename}': {e}"))
                    })?;
                    let file = UploadedFile { filename, bytes };
                    if name == "csv_file" {
                        upload.csv_file = Some(file);
                    } else {
                        upload.pdf_files.push(file);
                    }
                }
                "business_name" | "api_key" | "swot_analysis" => {
                    let value = field.text().await.map_err(|e| {
                        AppError::Validation(format!("Could not read field '{name}': {e}"))
                    })?;
                    let slot = match name.as_str() {
                        "business_name" => &mut upload.business_name,
                        "api_key" => &mut upload.api_key,
                        _ => &mut upload.swot_analysis,
                    };
                    *slot = Some(value);
                }
                other => debug!("Ignoring unexpected form field '{other}'"),
            }
        }

        Ok(upload)
    }

    /// Validates the dataset, the company name and the credential.
    ///
    /// The `api_key` field wins over `fallback_key` (the server default).
    pub fn profile(&self, fallback_key: Option<&str>) -> Result<ProfileForm, AppError> {
        let csv = self
            .csv_file
            .as_ref()
            .ok_or_else(|| AppError::Validation("A CSV file is required".to_string()))?;
        if !has_extension(&csv.filename, "csv") {
            return Err(AppError::Validation("Please upload a CSV file".to_string()));
        }

        let business_name = self
            .business_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::Validation("business_name cannot be empty".to_string()))?
            .to_string();

        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .or(fallback_key)
            .unwrap_or_default();
        let credential = ApiCredential::new(key)
            .map_err(|_| AppError::Validation("An API key is required".to_string()))?;

        Ok(ProfileForm {
            csv: csv.bytes.clone(),
            business_name,
            credential,
        })
    }

    /// Validates the evidence uploads: at least one file, all PDFs.
    pub fn evidence(&self) -> Result<Vec<EvidenceDocument>, AppError> {
        for file in &self.pdf_files {
            if !has_extension(&file.filename, "pdf") {
                return Err(AppError::Validation(format!(
                    "File {} is not a PDF file",
                    file.filename
                )));
            }
        }
        if self.pdf_files.is_empty() {
            return Err(AppError::Validation(
                "At least one PDF file is required".to_string(),
            ));
        }

        Ok(self
            .pdf_files
            .iter()
            .map(|f| EvidenceDocument::new(f.filename.clone(), f.bytes.clone()))
            .collect())
    }
}

fn has_extension(filename: &str, extension: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case(extension))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
