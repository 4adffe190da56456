//! Resume Validator: a deliberately permissive keyword heuristic, not a classifier.
//!
//! A document passes if ANY of the section keywords below appears anywhere,
//! case-insensitively. False positives are cheap (the model still scores the
//! file); false negatives block a legitimate upload.

use std::sync::OnceLock;

use regex::RegexSet;

const RESUME_PATTERNS: &[&str] = &[
    r"(?i)experience",
    r"(?i)education",
    r"(?i)skills",
    r"(?i)projects",
    r"(?i)certifications",
    r"(?i)summary",
    r"(?i)objective",
    r"(?i)work\s*history",
    r"(?i)professional\s*experience",
];

fn patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| RegexSet::new(RESUME_PATTERNS).expect("resume patterns are valid regexes"))
}

pub fn is_likely_resume(text: &str) -> bool {
    patterns().is_match(text)
}
