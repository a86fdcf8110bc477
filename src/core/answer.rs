// src/core/answer.rs — Parsing the model's final structured answer
//
// The final response must be a JSON object with `keyword` and `results`.
// Models wrap JSON in prose or code fences often enough that extraction is
// lenient; a response that still fails to parse degrades to an empty result
// set so the session can finalize normally.

use serde::{Deserialize, Serialize};

use super::types::{RelevanceDecision, UsDecision};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinalAnswer {
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub results: Vec<ClassifiedItem>,
}

/// One classified item from the model's final answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifiedItem {
    pub url: String,
    pub caption: Option<String>,
    pub transcript: Option<String>,
    pub owner_handle: Option<String>,
    pub owner_name: Option<String>,
    pub taken_at_iso: Option<String>,
    pub views: Option<u64>,
    pub thumbnail: Option<String>,
    pub us_decision: Option<UsDecision>,
    pub relevance_decision: Option<RelevanceDecision>,
    pub confidence: Option<f64>,
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// Extract and parse the final answer from raw model output.
///
/// Tries, in order: the whole string, the contents of the first code fence,
/// and the outermost `{...}` span. Returns None if nothing parses.
pub fn parse_final_answer(content: &str) -> Option<FinalAnswer> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(answer) = serde_json::from_str::<FinalAnswer>(trimmed) {
        return Some(answer);
    }

    if let Some(fenced) = extract_fenced(trimmed) {
        if let Ok(answer) = serde_json::from_str::<FinalAnswer>(fenced) {
            return Some(answer);
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<FinalAnswer>(&trimmed[start..=end]).ok()
}

/// Return the body of the first ``` code fence, tolerating a language tag.
fn extract_fenced(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    let body_start = after_open.find('\n')? + 1;
    let body = &after_open[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = r#"{"keyword":"fitness","results":[{"url":"https://example.com/r/1","us_decision":"US","relevance_decision":"match","confidence":0.9,"reasons":["caption mentions training"]}]}"#;

    #[test]
    fn test_parse_raw_json() {
        let answer = parse_final_answer(RAW).unwrap();
        assert_eq!(answer.keyword, "fitness");
        assert_eq!(answer.results.len(), 1);
        assert_eq!(answer.results[0].us_decision, Some(UsDecision::Us));
        assert_eq!(
            answer.results[0].relevance_decision,
            Some(RelevanceDecision::Match)
        );
    }

    #[test]
    fn test_parse_fenced_json() {
        let content = format!("Here are the results:\n```json\n{RAW}\n```\nDone.");
        let answer = parse_final_answer(&content).unwrap();
        assert_eq!(answer.results.len(), 1);
    }

    #[test]
    fn test_parse_embedded_json() {
        let content = format!("The final answer is {RAW} — all classified.");
        let answer = parse_final_answer(&content).unwrap();
        assert_eq!(answer.keyword, "fitness");
    }

    #[test]
    fn test_parse_garbage_returns_none() {
        assert!(parse_final_answer("not json at all").is_none());
        assert!(parse_final_answer("").is_none());
        assert!(parse_final_answer("{\"broken\": ").is_none());
    }

    #[test]
    fn test_parse_tolerates_missing_fields() {
        let answer =
            parse_final_answer(r#"{"keyword":"x","results":[{"url":"u1"}]}"#).unwrap();
        let item = &answer.results[0];
        assert!(item.us_decision.is_none());
        assert!(item.confidence.is_none());
        assert!(item.reasons.is_empty());
    }

    #[test]
    fn test_parse_tolerates_missing_results() {
        let answer = parse_final_answer(r#"{"keyword":"x"}"#).unwrap();
        assert!(answer.results.is_empty());
    }
}
