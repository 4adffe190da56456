use axum::{extract::State, Json};
use serde::Deserialize;

use crate::analysis::analyze;
use crate::analysis::types::{AnalysisIntent, AnalysisRequest, AnalysisResult};
use crate::errors::AppError;
use crate::state::AppState;

/// Body shared by all single-resume analysis routes. Fields are optional so
/// a missing one is reported as a 400 with a readable message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisBody {
    pub resume_text: Option<String>,
    pub job_description: Option<String>,
}

async fn run(state: &AppState, intent: AnalysisIntent, body: AnalysisBody) -> Result<Json<AnalysisResult>, AppError> {
    let resume_text = body
        .resume_text
        .ok_or_else(|| AppError::Validation("resumeText is required".to_string()))?;
    let request = AnalysisRequest::new(intent, resume_text, body.job_description.as_deref())?;
    let result = analyze(state.completer.as_ref(), &request).await?;
    Ok(Json(result))
}

/// POST /analysis/match
pub async fn handle_match(
    State(state): State<AppState>,
    Json(body): Json<AnalysisBody>,
) -> Result<Json<AnalysisResult>, AppError> {
    run(&state, AnalysisIntent::MatchAnalysis, body).await
}

/// POST /analysis/summary
pub async fn handle_summary(
    State(state): State<AppState>,
    Json(body): Json<AnalysisBody>,
) -> Result<Json<AnalysisResult>, AppError> {
    run(&state, AnalysisIntent::Summarize, body).await
}

/// POST /analysis/skills
pub async fn handle_skills(
    State(state): State<AppState>,
    Json(body): Json<AnalysisBody>,
) -> Result<Json<AnalysisResult>, AppError> {
    run(&state, AnalysisIntent::ImproveSkills, body).await
}

/// POST /analysis/keywords
pub async fn handle_keywords(
    State(state): State<AppState>,
    Json(body): Json<AnalysisBody>,
) -> Result<Json<AnalysisResult>, AppError> {
    run(&state, AnalysisIntent::MissingKeywords, body).await
}
