//! Axum route handlers for the analysis API.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::upload::{AnalysisUpload, ProfileForm};
use crate::errors::AppError;
use crate::records::{lookup, Dataset, Record};
use crate::state::AppState;

/// Questions echoed back in the questionnaire response.
const PREVIEW_QUESTIONS: usize = 5;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub success: bool,
    pub business_name: String,
    pub questions_count: usize,
    pub questions_preview: Vec<String>,
    pub pdf_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SwotResponse {
    pub success: bool,
    pub business_name: String,
    pub swot_analysis: String,
    pub processed_files: Vec<String>,
    pub files_count: usize,
    pub pdf_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ActionPlanResponse {
    pub success: bool,
    pub business_name: String,
    pub action_plan: String,
    pub processed_files: Vec<String>,
    pub files_count: usize,
    pub action_pdf_id: Uuid,
    pub comprehensive_pdf_id: Uuid,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/generate-questions
///
/// Generates a personalised diagnostic questionnaire from the company's
/// profiling answers.
pub async fn handle_generate_questions(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<QuestionsResponse>, AppError> {
    let upload = AnalysisUpload::from_multipart(multipart).await?;
    let form = upload.profile(state.config.openai_api_key.as_deref())?;
    let record = resolve_record(&state, &form)?;

    let outcome = state.pipeline.questionnaire(&record, &form.credential).await?;

    Ok(Json(QuestionsResponse {
        success: true,
        business_name: outcome.business_name,
        questions_count: outcome.questions.len(),
        questions_preview: outcome
            .questions
            .into_iter()
            .take(PREVIEW_QUESTIONS)
            .collect(),
        pdf_id: outcome.pdf_id,
    }))
}

/// POST /api/generate-swot
///
/// SWOT analysis from the profile plus one or more answered questionnaires (PDF).
pub async fn handle_generate_swot(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<SwotResponse>, AppError> {
    let upload = AnalysisUpload::from_multipart(multipart).await?;
    let form = upload.profile(state.config.openai_api_key.as_deref())?;
    let documents = upload.evidence()?;
    let record = resolve_record(&state, &form)?;

    let outcome = state
        .pipeline
        .swot(&record, &documents, &form.credential)
        .await?;

    Ok(Json(SwotResponse {
        success: true,
        business_name: outcome.business_name,
        swot_analysis: outcome.swot_analysis,
        files_count: outcome.processed_files.len(),
        processed_files: outcome.processed_files,
        pdf_id: outcome.pdf_id,
    }))
}

/// POST /api/generate-action-plan
///
/// Strategic action plan built on a SWOT analysis supplied by the caller.
/// Returns both the plan document and the combined SWOT + plan document.
pub async fn handle_generate_action_plan(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ActionPlanResponse>, AppError> {
    let upload = AnalysisUpload::from_multipart(multipart).await?;
    let form = upload.profile(state.config.openai_api_key.as_deref())?;
    let documents = upload.evidence()?;
    let record = resolve_record(&state, &form)?;
    let swot_analysis = upload.swot_analysis.as_deref().unwrap_or_default();

    let outcome = state
        .pipeline
        .action_plan(&record, &documents, swot_analysis, &form.credential)
        .await?;

    Ok(Json(ActionPlanResponse {
        success: true,
        business_name: outcome.business_name,
        action_plan: outcome.action_plan,
        files_count: outcome.processed_files.len(),
        processed_files: outcome.processed_files,
        action_pdf_id: outcome.action_pdf_id,
        comprehensive_pdf_id: outcome.comprehensive_pdf_id,
    }))
}

/// GET /api/download-pdf/:pdf_id
pub async fn handle_download_pdf(
    State(state): State<AppState>,
    Path(pdf_id): Path<String>,
) -> Result<Response, AppError> {
    let bytes = state.artifacts.get(&pdf_id).await?;
    info!("Serving artifact {pdf_id} ({} bytes)", bytes.len());

    // `get` only succeeds for a well-formed UUID, so the header value is plain ASCII.
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"analysis_{}.pdf\"",
        pdf_id.trim()
    ))
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid Content-Disposition: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Parses the uploaded dataset and finds the requested company.
fn resolve_record(state: &AppState, form: &ProfileForm) -> Result<Record, AppError> {
    let dataset = Dataset::from_csv(&form.csv)?;
    if dataset.is_empty() {
        warn!("Uploaded CSV has a header but no rows");
    }
    debug!(
        "Loaded dataset: {} rows, {} columns",
        dataset.len(),
        dataset.headers().len()
    );
    lookup(&dataset, &state.config.identifying_field, &form.business_name)
}
