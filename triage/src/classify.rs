//! Triage suggestion shape and tolerant parsing of model output.
//!
//! Classification backends are language models that are asked for a bare
//! JSON object but routinely wrap it in code fences or prose. Anything that
//! does not parse becomes `None`; callers treat that as "no suggestion".

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::adapters::TicketText;
use crate::model::Priority;

/// Structured triage output from the classification service.
///
/// Every field is optional on the wire; defaults are applied when the
/// suggestion is written to the ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageSuggestion {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub helpful_notes: Option<String>,
    #[serde(default)]
    pub related_skills: Option<Vec<String>>,
}

impl TriageSuggestion {
    /// Priority clamped to the known set, `medium` otherwise.
    pub fn normalized_priority(&self) -> Priority {
        Priority::normalize(self.priority.as_deref())
    }

    pub fn helpful_notes_or_default(&self) -> String {
        self.helpful_notes.clone().unwrap_or_default()
    }

    pub fn related_skills_or_default(&self) -> Vec<String> {
        self.related_skills.clone().unwrap_or_default()
    }
}

/// System prompt for the triage model.
pub const TRIAGE_SYSTEM_PROMPT: &str = "You are an expert AI assistant that processes technical \
support tickets. Estimate priority, summarize the issue, list the technical skills needed to \
resolve it, and give helpful notes for the moderator who will handle it.";

/// User prompt asking for the four-key JSON object.
pub fn build_triage_prompt(text: &TicketText) -> String {
    format!(
        r#"You are a ticket triage agent.
Analyze the following support ticket and ONLY return a raw JSON object with exactly these keys:
{{
  "summary": "Short 1-2 sentence summary of the issue",
  "priority": "low" | "medium" | "high",
  "helpfulNotes": "Detailed technical explanation with tips and external links if possible",
  "relatedSkills": ["Skill1", "Skill2"]
}}

Do not add any other keys.
Do not include markdown, code fences, or comments.
Respond with only valid JSON.

Ticket information:
- Title: {}
- Description: {}
"#,
        text.title, text.description
    )
}

/// Remove a surrounding Markdown code fence, if any.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json) up to the first newline.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Parse raw model output into a suggestion.
///
/// Returns `None` for empty, fenced-but-invalid, or non-object output.
pub fn parse_triage_response(raw: &str) -> Option<TriageSuggestion> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        warn!("Classifier returned empty output");
        return None;
    }
    match serde_json::from_str::<TriageSuggestion>(body) {
        Ok(suggestion) => Some(suggestion),
        Err(e) => {
            warn!(error = %e, raw = %raw, "Failed to parse classifier output");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_json() {
        let s = parse_triage_response(
            r#"{"summary":"Build breaks","priority":"high","helpfulNotes":"Clear cache","relatedSkills":["Docker"]}"#,
        )
        .unwrap();
        assert_eq!(s.normalized_priority(), Priority::High);
        assert_eq!(s.related_skills_or_default(), vec!["Docker".to_string()]);
        assert_eq!(s.summary.as_deref(), Some("Build breaks"));
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"priority\": \"low\", \"relatedSkills\": []}\n```";
        let s = parse_triage_response(raw).unwrap();
        assert_eq!(s.normalized_priority(), Priority::Low);
        assert!(s.related_skills_or_default().is_empty());

        let raw = "  ```\n{\"priority\": \"medium\"}\n```  ";
        assert!(parse_triage_response(raw).is_some());
    }

    #[test]
    fn test_parse_missing_fields_defaults() {
        let s = parse_triage_response("{}").unwrap();
        assert_eq!(s.normalized_priority(), Priority::Medium);
        assert_eq!(s.helpful_notes_or_default(), "");
        assert!(s.related_skills_or_default().is_empty());
    }

    #[test]
    fn test_parse_unknown_priority_normalized() {
        let s = parse_triage_response(r#"{"priority":"critical"}"#).unwrap();
        assert_eq!(s.normalized_priority(), Priority::Medium);
    }

    #[test]
    fn test_parse_garbage_is_none() {
        assert!(parse_triage_response("").is_none());
        assert!(parse_triage_response("   ").is_none());
        assert!(parse_triage_response("Sure! Here is the triage:").is_none());
        assert!(parse_triage_response("```json\nnot json\n```").is_none());
        assert!(parse_triage_response("[1, 2, 3]").is_none());
        assert!(parse_triage_response(r#"{"relatedSkills": "Docker"}"#).is_none());
    }

    #[test]
    fn test_prompt_mentions_ticket() {
        let prompt = build_triage_prompt(&TicketText {
            title: "Docker build fails".into(),
            description: "layer cache".into(),
        });
        assert!(prompt.contains("- Title: Docker build fails"));
        assert!(prompt.contains("- Description: layer cache"));
        assert!(prompt.contains("\"relatedSkills\""));
    }
}
