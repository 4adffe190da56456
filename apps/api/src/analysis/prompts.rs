// Prompt templates for every analysis intent.
// The match template's headings are the grammar `parser.rs` reads back;
// change both together (see the coupling tests below).

use crate::analysis::types::AnalysisIntent;

/// Match analysis prompt. Replace `{resume_text}` and `{job_description}`.
pub const MATCH_PROMPT_TEMPLATE: &str = r#"Analyze this resume against the job description and provide a concise analysis in exactly this format:

**Match Percentage**: [number]%

**Summary**:
One or two sentences about overall fit.

**Strengths**:
* Key strength 1
* Key strength 2
* Key strength 3

**Weaknesses**:
* Missing skill 1
* Missing skill 2
* Missing skill 3

**Recommendation**:
One sentence recommendation.

Resume Text:
{resume_text}

Job Description:
{job_description}

Rules:
1. Keep all sections brief and to the point
2. Strengths and Weaknesses should be bullet points starting with *
3. Use exact section headers with ** marks
4. Match percentage should be a number between 0-100
5. Maximum 3-4 points each in Strengths and Weaknesses
6. No extra sections or text"#;

/// Resume summary prompt. Replace `{resume_text}`.
pub const SUMMARY_PROMPT_TEMPLATE: &str = r#"Provide a concise summary and key points about the following resume.

Respond in exactly this format:

Summary:
- Brief overall summary of the candidate
- Key skills mentioned in the resume
- Key experiences
- Educational background

Rules:
1. One point per line, each starting with -
2. No text before the "Summary:" line

Resume:
{resume_text}"#;

/// Skill improvement prompt. Replace `{resume_text}` and `{job_description}`.
pub const IMPROVE_SKILLS_PROMPT_TEMPLATE: &str = r#"Based on the following resume and job description, provide detailed suggestions on how the candidate can improve their skills.

Respond in exactly this format:

Suggestions:
- Technical Skills: suggestion
- Soft Skills: suggestion
- Certifications: recommended certification
- Projects: project worth undertaking

Rules:
1. One suggestion per line, each starting with -
2. No text before the "Suggestions:" line

Resume:
{resume_text}

Job Description:
{job_description}"#;

/// Missing keyword prompt. Replace `{resume_text}` and `{job_description}`.
pub const MISSING_KEYWORDS_PROMPT_TEMPLATE: &str = r#"Analyze the following resume and job description to identify missing keywords or skills that are required in the job description but not present in the resume.

Respond with exactly one line in this format:

Missing Skills: keyword one, keyword two, keyword three

Do not include any additional text or explanations.

Resume:
{resume_text}

Job Description:
{job_description}"#;

pub fn template_for(intent: AnalysisIntent) -> &'static str {
    match intent {
        AnalysisIntent::MatchAnalysis => MATCH_PROMPT_TEMPLATE,
        AnalysisIntent::Summarize => SUMMARY_PROMPT_TEMPLATE,
        AnalysisIntent::ImproveSkills => IMPROVE_SKILLS_PROMPT_TEMPLATE,
        AnalysisIntent::MissingKeywords => MISSING_KEYWORDS_PROMPT_TEMPLATE,
    }
}

/// Renders the intent's template. A missing job description renders as "".
pub fn build_prompt(intent: AnalysisIntent, resume_text: &str, job_description: Option<&str>) -> String {
    render_template(
        template_for(intent),
        &[
            ("resume_text", resume_text.trim()),
            ("job_description", job_description.unwrap_or_default().trim()),
        ],
    )
}

/// Single-pass `{name}` substitution. Substituted values are never rescanned,
/// so a resume containing `{job_description}` stays literal.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + vars.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after_brace = &rest[start + 1..];
        let hit = vars.iter().find_map(|(name, value)| {
            after_brace
                .strip_prefix(name)
                .and_then(|r| r.strip_prefix('}'))
                .map(|remaining| (*value, remaining))
        });
        match hit {
            Some((value, remaining)) => {
                out.push_str(value);
                rest = remaining;
            }
            None => {
                out.push('{');
                rest = after_brace;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::parser::{
        parse, MATCH_HEADINGS, MISSING_KEYWORDS_LABEL, SUGGESTIONS_LABEL, SUMMARY_LABEL,
    };
    use crate::analysis::types::AnalysisResult;

    #[test]
    fn test_match_prompt_embeds_both_inputs() {
        let prompt = build_prompt(
            AnalysisIntent::MatchAnalysis,
            "  Rust engineer resume  ",
            Some("Senior Rust role"),
        );
        assert!(prompt.contains("Resume Text:\nRust engineer resume\n"));
        assert!(prompt.contains("Job Description:\nSenior Rust role\n"));
        assert!(!prompt.contains("{resume_text}"));
        assert!(!prompt.contains("{job_description}"));
    }

    #[test]
    fn test_summary_prompt_has_no_job_description_slot() {
        let prompt = build_prompt(AnalysisIntent::Summarize, "resume", Some("ignored"));
        assert!(!prompt.contains("ignored"));
        assert!(prompt.ends_with("Resume:\nresume"));
    }

    #[test]
    fn test_placeholders_in_input_are_not_expanded() {
        let prompt = build_prompt(
            AnalysisIntent::MissingKeywords,
            "I like {job_description} tokens",
            Some("JD"),
        );
        assert!(prompt.contains("I like {job_description} tokens"));
    }

    #[test]
    fn test_render_keeps_unknown_braces() {
        assert_eq!(
            render_template("{a} {b} {", &[("a", "1")]),
            "1 {b} {"
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = build_prompt(AnalysisIntent::ImproveSkills, "r", Some("j"));
        let b = build_prompt(AnalysisIntent::ImproveSkills, "r", Some("j"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_match_template_declares_every_parser_heading() {
        for heading in MATCH_HEADINGS {
            assert!(
                MATCH_PROMPT_TEMPLATE.contains(&format!("**{heading}**:")),
                "template is missing heading {heading}"
            );
        }
    }

    #[test]
    fn test_other_templates_declare_parser_labels() {
        assert!(SUMMARY_PROMPT_TEMPLATE.contains(&format!("{SUMMARY_LABEL}:")));
        assert!(IMPROVE_SKILLS_PROMPT_TEMPLATE.contains(&format!("{SUGGESTIONS_LABEL}:")));
        assert!(MISSING_KEYWORDS_PROMPT_TEMPLATE.contains(&format!("{MISSING_KEYWORDS_LABEL}:")));
    }

    /// The example block inside the match template must itself parse.
    #[test]
    fn test_match_template_example_parses() {
        let example = MATCH_PROMPT_TEMPLATE.replace("[number]", "42");
        let AnalysisResult::Match(m) = parse(AnalysisIntent::MatchAnalysis, &example) else {
            panic!("expected match result");
        };
        assert_eq!(m.match_percentage(), 42);
        assert_eq!(m.strengths, vec!["Key strength 1", "Key strength 2", "Key strength 3"]);
        assert_eq!(m.weaknesses, vec!["Missing skill 1", "Missing skill 2", "Missing skill 3"]);
    }
}
