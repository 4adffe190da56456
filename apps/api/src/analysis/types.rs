use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::intake::validator::is_likely_resume;

/// Minimum job-description length for match-style analyses.
pub const MIN_JOB_DESCRIPTION_WORDS: usize = 50;

/// A resume is shortlisted when its match percentage is strictly above this.
// Hardcoded for every posting; a per-job threshold would live on the request.
pub const SHORTLIST_THRESHOLD: u8 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisIntent {
    MatchAnalysis,
    Summarize,
    ImproveSkills,
    MissingKeywords,
}

impl AnalysisIntent {
    pub fn requires_job_description(self) -> bool {
        !matches!(self, AnalysisIntent::Summarize)
    }

    pub fn min_job_description_words(self) -> usize {
        match self {
            AnalysisIntent::MatchAnalysis => MIN_JOB_DESCRIPTION_WORDS,
            AnalysisIntent::Summarize => 0,
            AnalysisIntent::ImproveSkills | AnalysisIntent::MissingKeywords => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescription {
    text: String,
    word_count: usize,
}

impl JobDescription {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = count_words(&text);
        Self { text, word_count }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Rejects with `InsufficientJobDescription` below `min_words`.
    pub fn ensure_min_words(&self, min_words: usize) -> Result<(), AppError> {
        if self.word_count < min_words {
            return Err(AppError::InsufficientJobDescription {
                actual: self.word_count,
                required: min_words,
            });
        }
        Ok(())
    }
}

/// Whitespace-separated token count; the browser preview uses the same rule
/// (`text.trim().split(/\s+/)` without empties).
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// A validated request for one analysis.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub intent: AnalysisIntent,
    pub resume_text: String,
    pub job_description: Option<JobDescription>,
}

impl AnalysisRequest {
    /// Checks the resume heuristic and the intent's job-description gate.
    pub fn new(
        intent: AnalysisIntent,
        resume_text: impl Into<String>,
        job_description: Option<&str>,
    ) -> Result<Self, AppError> {
        let resume_text = resume_text.into();
        if resume_text.trim().is_empty() {
            return Err(AppError::Validation("resumeText is required".to_string()));
        }
        if !is_likely_resume(&resume_text) {
            return Err(AppError::Validation(
                "resumeText does not appear to be a resume".to_string(),
            ));
        }

        let job_description = match job_description {
            Some(text) if intent.requires_job_description() => {
                let jd = JobDescription::new(text);
                if jd.word_count() == 0 {
                    return Err(AppError::Validation("jobDescription is required".to_string()));
                }
                jd.ensure_min_words(intent.min_job_description_words())?;
                Some(jd)
            }
            None if intent.requires_job_description() => {
                return Err(AppError::Validation("jobDescription is required".to_string()))
            }
            _ => None,
        };

        Ok(Self {
            intent,
            resume_text,
            job_description,
        })
    }
}

/// Parsed match analysis. `is_shortlisted` is derived from the clamped
/// percentage at construction and cannot drift from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchAnalysis {
    match_percentage: u8,
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendation: String,
    is_shortlisted: bool,
}

pub const DEFAULT_SUMMARY: &str = "No summary available";
pub const DEFAULT_STRENGTHS: &str = "No strengths listed";
pub const DEFAULT_WEAKNESSES: &str = "No weaknesses listed";
pub const DEFAULT_RECOMMENDATION: &str = "No recommendation available";
pub const DEFAULT_SUMMARY_LINES: &str = "No summary available";
pub const DEFAULT_SUGGESTIONS: &str = "No suggestions available";
pub const DEFAULT_KEYWORDS: &str = "No missing keywords found";

impl MatchAnalysis {
    pub fn new(
        match_percentage: i64,
        summary: String,
        strengths: Vec<String>,
        weaknesses: Vec<String>,
        recommendation: String,
    ) -> Self {
        let match_percentage = match_percentage.clamp(0, 100) as u8;
        Self {
            match_percentage,
            summary,
            strengths,
            weaknesses,
            recommendation,
            is_shortlisted: match_percentage > SHORTLIST_THRESHOLD,
        }
    }

    pub fn match_percentage(&self) -> u8 {
        self.match_percentage
    }

    pub fn is_shortlisted(&self) -> bool {
        self.is_shortlisted
    }
}

impl Default for MatchAnalysis {
    fn default() -> Self {
        Self::new(
            0,
            DEFAULT_SUMMARY.to_string(),
            vec![DEFAULT_STRENGTHS.to_string()],
            vec![DEFAULT_WEAKNESSES.to_string()],
            DEFAULT_RECOMMENDATION.to_string(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSummary {
    pub summary_lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillSuggestions {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingKeywords {
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    Match(MatchAnalysis),
    Summary(ResumeSummary),
    Skills(SkillSuggestions),
    Keywords(MissingKeywords),
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESUME: &str = "Experience: five years building Rust services.";

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn test_word_count_ignores_extra_whitespace() {
        assert_eq!(count_words("  one\ttwo\n\nthree  "), 3);
        assert_eq!(count_words("   "), 0);
    }

    #[test]
    fn test_49_words_rejected_for_match() {
        let err = AnalysisRequest::new(AnalysisIntent::MatchAnalysis, RESUME, Some(&words(49)))
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientJobDescription {
                actual: 49,
                required: 50
            }
        ));
    }

    #[test]
    fn test_50_words_accepted_for_match() {
        let req =
            AnalysisRequest::new(AnalysisIntent::MatchAnalysis, RESUME, Some(&words(50))).unwrap();
        assert_eq!(req.job_description.unwrap().word_count(), 50);
    }

    #[test]
    fn test_summarize_ignores_job_description() {
        let req = AnalysisRequest::new(AnalysisIntent::Summarize, RESUME, Some("short")).unwrap();
        assert!(req.job_description.is_none());
    }

    #[test]
    fn test_keywords_require_job_description() {
        assert!(matches!(
            AnalysisRequest::new(AnalysisIntent::MissingKeywords, RESUME, None),
            Err(AppError::Validation(_))
        ));
        assert!(AnalysisRequest::new(AnalysisIntent::MissingKeywords, RESUME, Some("Rust")).is_ok());
    }

    #[test]
    fn test_non_resume_text_rejected() {
        assert!(matches!(
            AnalysisRequest::new(AnalysisIntent::Summarize, "lorem ipsum dolor", None),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_shortlist_boundary() {
        let at = |p| MatchAnalysis::new(p, String::new(), vec![], vec![], String::new());
        assert!(!at(70).is_shortlisted());
        assert!(at(71).is_shortlisted());
        assert!(!at(0).is_shortlisted());
    }

    #[test]
    fn test_percentage_is_clamped() {
        let at = |p| MatchAnalysis::new(p, String::new(), vec![], vec![], String::new());
        assert_eq!(at(250).match_percentage(), 100);
        assert!(at(250).is_shortlisted());
        assert_eq!(at(-5).match_percentage(), 0);
    }

    #[test]
    fn test_match_analysis_serializes_camel_case() {
        let json = serde_json::to_value(MatchAnalysis::default()).unwrap();
        assert_eq!(json["matchPercentage"], 0);
        assert_eq!(json["isShortlisted"], false);
        assert_eq!(json["strengths"][0], "No strengths listed");
    }
}
