//! Batch Orchestrator.
//!
//! Resumes are processed in fixed-size groups. Within a group every resume
//! runs extraction, validation, prompt, completion and parse concurrently on
//! its own task; between groups the orchestrator sleeps so the completion
//! service's rate limiter is not tripped. Each task reports back with its
//! input index, so the report keeps input order no matter which completion
//! resolves first. One resume failing never aborts its siblings.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::analysis::analyze;
use crate::analysis::types::{
    AnalysisIntent, AnalysisRequest, AnalysisResult, JobDescription, MatchAnalysis,
    MIN_JOB_DESCRIPTION_WORDS,
};
use crate::errors::AppError;
use crate::intake::extractor::ExtractionError;
use crate::intake::{IntakeError, ResumeDocument, ValidationState};
use crate::llm_client::{Completer, CompletionError};

pub const NOT_A_RESUME_WARNING: &str = "Some uploaded files do not appear to be resumes";

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub group_size: usize,
    pub inter_group_delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            group_size: 5,
            inter_group_delay: Duration::from_secs(5),
        }
    }
}

/// Outcome for one resume, in the shape returned to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchItem {
    Analyzed {
        filename: String,
        #[serde(flatten)]
        analysis: MatchAnalysis,
        /// Kept for persistence, not echoed back.
        #[serde(skip)]
        text: String,
    },
    Failed {
        filename: String,
        error: String,
    },
}

impl BatchItem {
    pub fn filename(&self) -> &str {
        match self {
            BatchItem::Analyzed { filename, .. } | BatchItem::Failed { filename, .. } => filename,
        }
    }

    fn failed(filename: impl Into<String>, error: impl Into<String>) -> Self {
        BatchItem::Failed {
            filename: filename.into(),
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// One entry per input resume, in input order.
    pub items: Vec<BatchItem>,
    pub warnings: Vec<String>,
}

impl BatchReport {
    /// Filenames of this batch's shortlisted resumes, in input order.
    pub fn shortlisted(&self) -> Vec<String> {
        self.items
            .iter()
            .filter_map(|item| match item {
                BatchItem::Analyzed {
                    filename, analysis, ..
                } if analysis.is_shortlisted() => Some(filename.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Runs match analysis over `documents` against `job_description`.
///
/// Rejects an empty batch or a job description under the minimum word count
/// before any extraction or network work starts.
pub async fn run_batch(
    completer: Arc<dyn Completer>,
    documents: Vec<ResumeDocument>,
    job_description: &str,
    options: &BatchOptions,
) -> Result<BatchReport, AppError> {
    if documents.is_empty() {
        return Err(AppError::NoFilesProvided);
    }
    let job_description = JobDescription::new(job_description);
    job_description.ensure_min_words(MIN_JOB_DESCRIPTION_WORDS)?;

    let total = documents.len();
    let group_size = options.group_size.max(1);
    info!("Starting batch of {total} resumes (group size {group_size})");

    let mut slots: Vec<Option<BatchItem>> = vec![None; total];
    let mut rejected_non_resumes = 0usize;
    let filenames: Vec<String> = documents.iter().map(|d| d.filename.clone()).collect();
    let mut pending = documents.into_iter().enumerate().peekable();
    let mut group_index = 0;

    while pending.peek().is_some() {
        if group_index > 0 && !options.inter_group_delay.is_zero() {
            info!(
                "Waiting {:?} before group {}",
                options.inter_group_delay,
                group_index + 1
            );
            tokio::time::sleep(options.inter_group_delay).await;
        }

        let mut tasks = JoinSet::new();
        for (index, document) in pending.by_ref().take(group_size) {
            let completer = Arc::clone(&completer);
            let job_description = job_description.clone();
            tasks.spawn(async move {
                (index, process_one(completer.as_ref(), document, job_description).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, (item, state))) => {
                    if state == ValidationState::RejectedNotAResume {
                        rejected_non_resumes += 1;
                    }
                    slots[index] = Some(item);
                }
                Err(e) => warn!("Batch task failed to complete: {e}"),
            }
        }
        group_index += 1;
    }

    let items: Vec<BatchItem> = slots
        .into_iter()
        .zip(filenames)
        .map(|(slot, filename)| {
            slot.unwrap_or_else(|| BatchItem::failed(filename, "Failed to analyze resume"))
        })
        .collect();

    let mut warnings = Vec::new();
    if rejected_non_resumes > 0 {
        warnings.push(NOT_A_RESUME_WARNING.to_string());
    }

    let failed: Vec<&str> = items
        .iter()
        .filter(|i| matches!(i, BatchItem::Failed { .. }))
        .map(BatchItem::filename)
        .collect();
    info!("Batch finished: {}/{total} analyzed", total - failed.len());
    if !failed.is_empty() {
        warn!("Not analyzed: {}", failed.join(", "));
    }

    Ok(BatchReport { items, warnings })
}

/// Analyzes one document; the validation state tells the caller why an
/// intake failure happened.
async fn process_one(
    completer: &dyn Completer,
    mut document: ResumeDocument,
    job_description: JobDescription,
) -> (BatchItem, ValidationState) {
    let filename = document.filename.clone();

    let prepared = document.prepare().await.map(str::to_string);
    let text = match prepared {
        Ok(text) => text,
        Err(e) => {
            warn!("Skipping {filename}: {e}");
            return (BatchItem::failed(filename, intake_message(&e)), document.validation_state);
        }
    };
    let state = document.validation_state;

    let request = AnalysisRequest {
        intent: AnalysisIntent::MatchAnalysis,
        resume_text: text,
        job_description: Some(job_description),
    };

    let item = match analyze(completer, &request).await {
        Ok(AnalysisResult::Match(analysis)) => BatchItem::Analyzed {
            filename,
            analysis,
            text: request.resume_text,
        },
        Ok(_) => BatchItem::failed(filename, "Failed to analyze resume"),
        Err(e) => {
            warn!("Analysis of {filename} failed: {e}");
            BatchItem::failed(filename, analysis_message(&e))
        }
    };
    (item, state)
}

fn intake_message(e: &IntakeError) -> String {
    match e {
        IntakeError::NotAResume => e.to_string(),
        IntakeError::Extraction(ExtractionError::UnsupportedFormat(_)) => e.to_string(),
        IntakeError::Extraction(ExtractionError::Failed(_)) => "Failed to process resume".to_string(),
    }
}

fn analysis_message(e: &AppError) -> String {
    match e {
        AppError::Completion(CompletionError::RateLimited { .. }) => {
            "The analysis service is busy, please try again shortly".to_string()
        }
        _ => "Failed to analyze resume".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::ScriptedCompleter;
    use crate::intake::extractor::tests::docx_fixture;
    use bytes::Bytes;
    use tokio::time::Instant;

    const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

    fn jd(words: usize) -> String {
        vec!["rust"; words].join(" ")
    }

    fn reply(pct: u8) -> String {
        format!("**Match Percentage**: {pct}%\n**Summary**: ok\n**Strengths**: * a\n**Weaknesses**: * b\n**Recommendation**: r")
    }

    fn resume(name: &str) -> ResumeDocument {
        ResumeDocument::from_text(format!("{name}.pdf"), format!("Experience: candidate {name}"))
    }

    fn options(group_size: usize, delay_secs: u64) -> BatchOptions {
        BatchOptions {
            group_size,
            inter_group_delay: Duration::from_secs(delay_secs),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_keeps_input_order_when_completions_resolve_out_of_order() {
        let completer = ScriptedCompleter::default()
            .route("candidate A", Duration::from_secs(3), Ok(&reply(90)))
            .route("candidate B", Duration::from_secs(2), Ok(&reply(50)))
            .route("candidate C", Duration::from_secs(1), Ok(&reply(80)));

        let report = run_batch(
            Arc::new(completer),
            vec![resume("A"), resume("B"), resume("C")],
            &jd(50),
            &options(5, 5),
        )
        .await
        .unwrap();

        let names: Vec<_> = report.items.iter().map(|i| i.filename()).collect();
        assert_eq!(names, vec!["A.pdf", "B.pdf", "C.pdf"]);
        assert_eq!(report.shortlisted(), vec!["A.pdf", "C.pdf"]);
        assert!(report.warnings.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_groups_are_separated_by_delay() {
        let completer = Arc::new(ScriptedCompleter::always(&reply(10)));
        let start = Instant::now();

        let report = run_batch(
            completer.clone(),
            vec![resume("A"), resume("B"), resume("C")],
            &jd(60),
            &options(2, 5),
        )
        .await
        .unwrap();

        assert_eq!(report.items.len(), 3);
        assert_eq!(completer.prompt_count(), 3);
        // Two groups, one delay between them and none after the last.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_siblings() {
        let completer = ScriptedCompleter::default()
            .route("candidate B", Duration::ZERO, Err("upstream 500"))
            .route("candidate", Duration::ZERO, Ok(&reply(75)));

        let report = run_batch(
            Arc::new(completer),
            vec![resume("A"), resume("B"), resume("C")],
            &jd(50),
            &options(5, 0),
        )
        .await
        .unwrap();

        assert!(matches!(report.items[0], BatchItem::Analyzed { .. }));
        match &report.items[1] {
            BatchItem::Failed { filename, error } => {
                assert_eq!(filename, "B.pdf");
                assert_eq!(error, "Failed to analyze resume");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(matches!(report.items[2], BatchItem::Analyzed { .. }));
        assert_eq!(report.shortlisted(), vec!["A.pdf", "C.pdf"]);
    }

    #[tokio::test]
    async fn test_non_resume_is_reported_with_warning() {
        let completer = Arc::new(ScriptedCompleter::always(&reply(99)));
        let report = run_batch(
            completer.clone(),
            vec![resume("A"), ResumeDocument::from_text("menu.pdf", "Soup of the day")],
            &jd(50),
            &options(5, 0),
        )
        .await
        .unwrap();

        match &report.items[1] {
            BatchItem::Failed { error, .. } => {
                assert_eq!(error, "File does not appear to be a resume")
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(report.warnings, vec![NOT_A_RESUME_WARNING]);
        assert_eq!(report.shortlisted(), vec!["A.pdf"]);
        assert_eq!(completer.prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_binary_uploads_are_extracted_in_the_batch() {
        let completer = Arc::new(ScriptedCompleter::always(&reply(72)));
        let docx = ResumeDocument::from_upload(
            "cv.docx",
            Some(DOCX_MIME),
            Bytes::from(docx_fixture(&["Jane Doe", "Education: MSc"])),
        );
        let corrupt = ResumeDocument::from_upload(
            "broken.pdf",
            Some("application/pdf"),
            Bytes::from_static(b"%PDF-1.4 nope"),
        );

        let report = run_batch(completer.clone(), vec![docx, corrupt], &jd(50), &options(5, 0))
            .await
            .unwrap();

        match &report.items[0] {
            BatchItem::Analyzed { text, .. } => assert_eq!(text, "Jane Doe\nEducation: MSc"),
            other => panic!("expected analysis, got {other:?}"),
        }
        assert!(matches!(
            &report.items[1],
            BatchItem::Failed { error, .. } if error == "Failed to process resume"
        ));
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_short_job_description_rejected_before_any_work() {
        let completer = Arc::new(ScriptedCompleter::always(&reply(90)));
        let err = run_batch(completer.clone(), vec![resume("A")], &jd(49), &options(5, 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientJobDescription {
                actual: 49,
                required: 50
            }
        ));
        assert_eq!(completer.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let completer = Arc::new(ScriptedCompleter::always(&reply(90)));
        assert!(matches!(
            run_batch(completer, vec![], &jd(50), &options(5, 0)).await,
            Err(AppError::NoFilesProvided)
        ));
    }

    #[test]
    fn test_item_serialization_shapes() {
        let ok = BatchItem::Analyzed {
            filename: "a.pdf".into(),
            analysis: MatchAnalysis::default(),
            text: "secret text".into(),
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["filename"], "a.pdf");
        assert_eq!(json["matchPercentage"], 0);
        assert!(json.get("text").is_none());

        let failed = serde_json::to_value(BatchItem::failed("b.pdf", "boom")).unwrap();
        assert_eq!(failed, serde_json::json!({"filename": "b.pdf", "error": "boom"}));
    }
}
