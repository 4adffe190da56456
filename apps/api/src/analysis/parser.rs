//! Response Parser: turns free-text completions into structured results.
//!
//! The completion text is tokenized line by line into either a *heading*
//! (a known section label, optionally bold, bulleted or `#`-prefixed, with a
//! colon inside or outside the bold markers) or a plain *line*. A small state
//! machine whose state is "current section" routes each line into that
//! section's body. Headings come from a table, so adding or reordering
//! sections does not touch the scanning logic.
//!
//! `parse` never fails: anything missing or malformed falls back to the
//! documented default, and every list is non-empty.

use std::sync::OnceLock;

use regex::Regex;

use crate::analysis::types::{
    AnalysisIntent, AnalysisResult, MatchAnalysis, MissingKeywords, ResumeSummary,
    SkillSuggestions, DEFAULT_KEYWORDS, DEFAULT_RECOMMENDATION, DEFAULT_STRENGTHS,
    DEFAULT_SUGGESTIONS, DEFAULT_SUMMARY, DEFAULT_SUMMARY_LINES, DEFAULT_WEAKNESSES,
};

pub const MATCH_HEADINGS: [&str; 5] = [
    "Match Percentage",
    "Summary",
    "Strengths",
    "Weaknesses",
    "Recommendation",
];
pub const SUMMARY_LABEL: &str = "Summary";
pub const SUGGESTIONS_LABEL: &str = "Suggestions";
pub const MISSING_KEYWORDS_LABEL: &str = "Missing Skills";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchField {
    Percentage,
    Summary,
    Strengths,
    Weaknesses,
    Recommendation,
}

const MATCH_GRAMMAR: &[(&str, MatchField)] = &[
    (MATCH_HEADINGS[0], MatchField::Percentage),
    (MATCH_HEADINGS[1], MatchField::Summary),
    (MATCH_HEADINGS[2], MatchField::Strengths),
    (MATCH_HEADINGS[3], MatchField::Weaknesses),
    (MATCH_HEADINGS[4], MatchField::Recommendation),
];

#[derive(Debug, PartialEq)]
enum Token<'a, F> {
    /// A recognised heading and whatever followed it on the same line.
    Heading(F, &'a str),
    Line(&'a str),
}

/// Parses `raw` according to the intent's output grammar.
pub fn parse(intent: AnalysisIntent, raw: &str) -> AnalysisResult {
    match intent {
        AnalysisIntent::MatchAnalysis => AnalysisResult::Match(parse_match(raw)),
        AnalysisIntent::Summarize => AnalysisResult::Summary(ResumeSummary {
            summary_lines: or_sentinel(
                list_items(&labelled_body(raw, SUMMARY_LABEL)),
                DEFAULT_SUMMARY_LINES,
            ),
        }),
        AnalysisIntent::ImproveSkills => AnalysisResult::Skills(SkillSuggestions {
            suggestions: or_sentinel(
                list_items(&labelled_body(raw, SUGGESTIONS_LABEL)),
                DEFAULT_SUGGESTIONS,
            ),
        }),
        AnalysisIntent::MissingKeywords => AnalysisResult::Keywords(MissingKeywords {
            keywords: or_sentinel(
                comma_items(&labelled_body(raw, MISSING_KEYWORDS_LABEL)),
                DEFAULT_KEYWORDS,
            ),
        }),
    }
}

pub fn parse_match(raw: &str) -> MatchAnalysis {
    let sections = split_sections(raw, MATCH_GRAMMAR);
    let body = |field: MatchField| {
        sections
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, body)| body.as_str())
    };

    let match_percentage = body(MatchField::Percentage)
        .and_then(first_percentage)
        .unwrap_or(0);
    let summary = body(MatchField::Summary)
        .map(paragraph)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SUMMARY.to_string());
    let strengths = or_sentinel(
        body(MatchField::Strengths).map(list_items).unwrap_or_default(),
        DEFAULT_STRENGTHS,
    );
    let weaknesses = or_sentinel(
        body(MatchField::Weaknesses).map(list_items).unwrap_or_default(),
        DEFAULT_WEAKNESSES,
    );
    let recommendation = body(MatchField::Recommendation)
        .map(paragraph)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_RECOMMENDATION.to_string());

    MatchAnalysis::new(match_percentage, summary, strengths, weaknesses, recommendation)
}

// ────────────────────────────────────────────────────────────────────────────
// Tokenizer and section state machine
// ────────────────────────────────────────────────────────────────────────────

fn tokenize<'a, F: Copy>(line: &'a str, grammar: &[(&str, F)]) -> Token<'a, F> {
    grammar
        .iter()
        .find_map(|(label, field)| match_heading(line, label).map(|rest| Token::Heading(*field, rest)))
        .unwrap_or(Token::Line(line))
}

/// Recognises `label` as a heading at the start of `line` and returns the
/// remainder of the line. Accepted shapes, case-insensitively:
/// `**Label**: x`, `**Label:** x`, `- **Label**: x`, `## Label: x`, `Label: x`.
fn match_heading<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let mut s = line.trim_start();
    s = s.trim_start_matches('#').trim_start();
    if let Some(rest) = s.strip_prefix(['-', '•']) {
        s = rest.trim_start();
    } else if !s.starts_with("**") {
        if let Some(rest) = s.strip_prefix('*') {
            s = rest.trim_start();
        }
    }

    let bold = s.starts_with("**");
    if bold {
        s = &s[2..];
    }

    let head = s.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    s = &s[label.len()..];
    if s.chars().next().is_some_and(|c| c.is_alphanumeric()) {
        return None;
    }

    s = s.trim_start();
    let mut colon = false;
    if let Some(rest) = s.strip_prefix(':') {
        colon = true;
        s = rest.trim_start();
    }
    if bold {
        // An opened bold marker must close right after the label.
        s = s.strip_prefix("**")?.trim_start();
        if let Some(rest) = s.strip_prefix(':') {
            colon = true;
            s = rest.trim_start();
        }
    }

    if bold || colon {
        Some(s.trim_end())
    } else {
        None
    }
}

/// Routes each line into the body of the most recent heading. Text before
/// the first heading is dropped. When a heading repeats, the first
/// occurrence wins and the repeat's body is discarded.
fn split_sections<F: Copy + Eq>(text: &str, grammar: &[(&str, F)]) -> Vec<(F, String)> {
    let mut sections: Vec<(F, String)> = Vec::new();
    // None: before any heading or inside a repeated heading.
    let mut current: Option<usize> = None;

    for line in text.lines() {
        match tokenize(line, grammar) {
            Token::Heading(field, rest) => {
                if sections.iter().any(|(f, _)| *f == field) {
                    current = None;
                } else {
                    sections.push((field, rest.to_string()));
                    current = Some(sections.len() - 1);
                }
            }
            Token::Line(line) => {
                if let Some(idx) = current {
                    let body = &mut sections[idx].1;
                    body.push('\n');
                    body.push_str(line);
                }
            }
        }
    }

    sections
}

/// Body of the `label` section if present, otherwise the whole text.
fn labelled_body(raw: &str, label: &str) -> String {
    split_sections(raw, &[(label, ())])
        .into_iter()
        .next()
        .map(|(_, body)| body)
        .unwrap_or_else(|| raw.to_string())
}

// ────────────────────────────────────────────────────────────────────────────
// Field normalisers
// ────────────────────────────────────────────────────────────────────────────

fn percent_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A minus counts only when it does not join two numbers ("70-80%").
    RE.get_or_init(|| {
        Regex::new(r"(?:^|[^\d.])(-?\d+(?:\.\d+)?)\s*%").expect("valid percent regex")
    })
}

fn inline_bullet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+[*•]\s+").expect("valid bullet regex"))
}

fn numbered_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,2}[.)]\s+").expect("valid numbering regex"))
}

/// First (possibly negative) number directly followed by `%`, rounded.
fn first_percentage(text: &str) -> Option<i64> {
    let caps = percent_regex().captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(value.round() as i64)
}

/// Removes one leading bullet marker (`*`, `-`, `•`, `1.`) and emphasis markers.
fn clean_item(item: &str) -> String {
    let mut s = item.trim();
    if let Some(rest) = s.strip_prefix(['-', '•']) {
        s = rest;
    } else if !s.starts_with("**") {
        if let Some(rest) = s.strip_prefix('*') {
            s = rest;
        }
    }
    let s = numbered_prefix_regex().replace(s.trim_start(), "");
    s.replace("**", "").replace("__", "").trim().to_string()
}

/// Splits a list section by lines and by inline ` * ` separators.
fn list_items(body: &str) -> Vec<String> {
    body.lines()
        .flat_map(|line| {
            let first = clean_item(line);
            inline_bullet_regex()
                .split(&first)
                .map(clean_item)
                .collect::<Vec<_>>()
        })
        .filter(|item| !item.is_empty())
        .collect()
}

/// Splits by commas and lines, for comma-separated keyword answers.
fn comma_items(body: &str) -> Vec<String> {
    body.lines()
        .flat_map(|line| line.split(','))
        .map(clean_item)
        .map(|item| item.trim_end_matches('.').trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Joins the non-empty lines of a free-text section with single spaces.
fn paragraph(body: &str) -> String {
    body.lines()
        .map(|line| line.replace("**", "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn or_sentinel(items: Vec<String>, sentinel: &str) -> Vec<String> {
    if items.is_empty() {
        vec![sentinel.to_string()]
    } else {
        items
    }
}
