// Single-resume analyses: prompt → completion → parsed result.

pub mod handlers;
pub mod parser;
pub mod prompts;
pub mod types;

use tracing::{debug, info};

use crate::errors::AppError;
use crate::llm_client::Completer;

use self::prompts::build_prompt;
use self::types::{AnalysisRequest, AnalysisResult};

/// Runs one analysis end to end. Parsing never fails; only the completion
/// call can.
pub async fn analyze(
    completer: &dyn Completer,
    request: &AnalysisRequest,
) -> Result<AnalysisResult, AppError> {
    let prompt = build_prompt(
        request.intent,
        &request.resume_text,
        request.job_description.as_ref().map(|jd| jd.text()),
    );

    let raw = completer.complete(&prompt).await?;
    debug!("{:?} completion returned {} bytes", request.intent, raw.len());

    let result = parser::parse(request.intent, &raw);
    if let AnalysisResult::Match(m) = &result {
        info!(
            "Match analysis: {}% (shortlisted: {})",
            m.match_percentage(),
            m.is_shortlisted()
        );
    }
    Ok(result)
}
