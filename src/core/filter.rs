// src/core/filter.rs — Geography filter, per-creator cap, and truncation
//
// The candidate set is the rows the model classified in its final answer.
// Upstream search is already geo-biased, so candidates without a geography
// decision are treated as weak positives: only explicit NotUS is dropped.

use tracing::warn;

use super::types::{ReelRow, UsDecision};

#[derive(Debug, Clone, Copy)]
pub struct FilterConfig {
    pub per_creator_cap: usize,
    pub max_results: usize,
}

/// Apply the decision pipeline.
///
/// `candidates` are the model-classified rows (session order); `all_rows`
/// is the full session table. If geography/cap filtering empties a
/// non-empty candidate set, the pipeline falls back to the session rows the
/// model never filtered (still capped and truncated) rather than returning
/// nothing. The fallback means every classified item failed the filters,
/// so it is logged loudly.
pub fn apply(candidates: Vec<ReelRow>, all_rows: &[ReelRow], config: FilterConfig) -> Vec<ReelRow> {
    let candidate_count = candidates.len();

    let kept: Vec<ReelRow> = candidates
        .into_iter()
        .filter(|r| !matches!(r.us_decision, Some(UsDecision::NotUs)))
        .collect();
    let filtered = cap_and_truncate(kept, config);

    if filtered.is_empty() && candidate_count > 0 {
        warn!(
            candidates = candidate_count,
            session_rows = all_rows.len(),
            "Filtering emptied a non-empty candidate set; falling back to unfiltered session rows"
        );
        return cap_and_truncate(all_rows.to_vec(), config);
    }

    filtered
}

/// Bound creator concentration and total size, preserving row order.
fn cap_and_truncate(rows: Vec<ReelRow>, config: FilterConfig) -> Vec<ReelRow> {
    let mut per_owner: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut out = Vec::new();

    for row in rows {
        if out.len() >= config.max_results {
            break;
        }
        match row.owner_handle.as_deref() {
            Some(handle) => {
                let count = per_owner.entry(handle.to_lowercase()).or_insert(0);
                if *count < config.per_creator_cap {
                    *count += 1;
                    out.push(row);
                }
            }
            // Rows with no known owner can't concentrate a creator.
            None => out.push(row),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RelevanceDecision;
    use std::collections::HashMap;

    fn cfg() -> FilterConfig {
        FilterConfig {
            per_creator_cap: 2,
            max_results: 30,
        }
    }

    fn row(url: &str, owner: Option<&str>, us: Option<UsDecision>) -> ReelRow {
        let mut r = ReelRow::new(url, "fitness");
        r.owner_handle = owner.map(String::from);
        r.us_decision = us;
        r.relevance_decision = Some(RelevanceDecision::Match);
        r
    }

    #[test]
    fn test_drops_not_us() {
        let rows = vec![
            row("u1", Some("a"), Some(UsDecision::Us)),
            row("u2", Some("b"), Some(UsDecision::NotUs)),
            row("u3", Some("c"), Some(UsDecision::Unknown)),
            row("u4", Some("d"), None),
        ];
        let out = apply(rows.clone(), &rows, cfg());
        assert_eq!(out.len(), 3);
        assert!(out
            .iter()
            .all(|r| !matches!(r.us_decision, Some(UsDecision::NotUs))));
    }

    #[test]
    fn test_per_creator_cap_invariant() {
        let rows: Vec<ReelRow> = (0..6)
            .map(|i| {
                row(
                    &format!("u{i}"),
                    Some(if i < 4 { "alice" } else { "bob" }),
                    Some(UsDecision::Us),
                )
            })
            .collect();
        let out = apply(rows.clone(), &rows, cfg());

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for r in &out {
            *counts.entry(r.owner_handle.as_deref().unwrap()).or_insert(0) += 1;
        }
        assert!(counts.values().all(|&c| c <= 2));
        assert_eq!(counts["alice"], 2);
        assert_eq!(counts["bob"], 2);
    }

    #[test]
    fn test_truncates_to_max_results() {
        let rows: Vec<ReelRow> = (0..50)
            .map(|i| row(&format!("u{i}"), Some(&format!("o{i}")), Some(UsDecision::Us)))
            .collect();
        let out = apply(
            rows.clone(),
            &rows,
            FilterConfig {
                per_creator_cap: 2,
                max_results: 10,
            },
        );
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn test_preserves_order() {
        let rows = vec![
            row("u1", Some("a"), Some(UsDecision::Us)),
            row("u2", Some("b"), Some(UsDecision::Us)),
            row("u3", Some("c"), Some(UsDecision::Us)),
        ];
        let out = apply(rows.clone(), &rows, cfg());
        let urls: Vec<&str> = out.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["u1", "u2", "u3"]);
    }

    #[test]
    fn test_fallback_when_every_candidate_filtered() {
        // All classified rows are NotUS: the filtered set would be empty,
        // so the pipeline falls back to the capped session rows.
        let candidates = vec![
            row("u1", Some("a"), Some(UsDecision::NotUs)),
            row("u2", Some("a"), Some(UsDecision::NotUs)),
        ];
        let all_rows = vec![
            row("u1", Some("a"), Some(UsDecision::NotUs)),
            row("u2", Some("a"), Some(UsDecision::NotUs)),
            row("u3", Some("b"), None),
        ];
        let out = apply(candidates, &all_rows, cfg());
        assert_eq!(out.len(), 3); // creator cap still applies in the fallback
        assert_eq!(out[0].url, "u1");
        assert_eq!(out[2].url, "u3");
    }

    #[test]
    fn test_empty_candidates_stay_empty() {
        // Nothing classified (e.g. the final answer failed to parse):
        // no fallback, the result set is empty even though rows exist.
        let all_rows = vec![row("u1", Some("a"), None), row("u2", Some("b"), None)];
        let out = apply(vec![], &all_rows, cfg());
        assert!(out.is_empty());
    }

    #[test]
    fn test_rows_without_owner_bypass_cap() {
        let rows = vec![
            row("u1", None, Some(UsDecision::Us)),
            row("u2", None, Some(UsDecision::Us)),
            row("u3", None, Some(UsDecision::Us)),
        ];
        let out = apply(rows.clone(), &rows, cfg());
        assert_eq!(out.len(), 3);
    }
}
