// src/analysis/command.rs — Restricted in-process analysis
//
// The low-risk analysis path: a constrained operation string is parsed into
// a tagged command and evaluated directly against the session rows. No code
// runs, so there is nothing to sandbox. The grammar is deliberately small
// and enumerable:
//
//   count
//   count where <field> contains <text>
//   filter <field> contains <text>
//   summary
//   sample [n]
//
// Fields: caption, transcript, owner, location, url, any.

use std::collections::HashSet;
use std::fmt;

use crate::core::types::{ReelRow, RowStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisCommand {
    Count { filter: Option<RowFilter> },
    Filter { filter: RowFilter },
    Summary,
    Sample { n: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowFilter {
    pub field: RowField,
    pub needle: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowField {
    Caption,
    Transcript,
    Owner,
    Location,
    Url,
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported analysis operation: {}", self.0)
    }
}

const MAX_SAMPLE: usize = 10;
const MAX_FILTER_LINES: usize = 20;

/// Parse an operation string into a command. Unknown shapes are an error
/// (returned to the model in the tool output), never a guess.
pub fn parse(op: &str) -> Result<AnalysisCommand, ParseError> {
    let op = op.trim();
    let lower = op.to_lowercase();

    if lower == "summary" {
        return Ok(AnalysisCommand::Summary);
    }

    if lower == "count" {
        return Ok(AnalysisCommand::Count { filter: None });
    }

    if let Some(rest) = lower.strip_prefix("count where ") {
        let filter = parse_filter(rest, op)?;
        return Ok(AnalysisCommand::Count {
            filter: Some(filter),
        });
    }

    if let Some(rest) = lower.strip_prefix("filter ") {
        let filter = parse_filter(rest, op)?;
        return Ok(AnalysisCommand::Filter { filter });
    }

    if lower == "sample" {
        return Ok(AnalysisCommand::Sample { n: 3 });
    }
    if let Some(rest) = lower.strip_prefix("sample ") {
        let n: usize = rest
            .trim()
            .parse()
            .map_err(|_| ParseError(op.to_string()))?;
        return Ok(AnalysisCommand::Sample {
            n: n.clamp(1, MAX_SAMPLE),
        });
    }

    Err(ParseError(op.to_string()))
}

/// Parse `<field> contains <text>`. The needle is lowercased; matching is
/// case-insensitive on both sides.
fn parse_filter(lower_rest: &str, original: &str) -> Result<RowFilter, ParseError> {
    let (field_str, needle_lower) = lower_rest
        .split_once(" contains ")
        .ok_or_else(|| ParseError(original.to_string()))?;

    let field = match field_str.trim() {
        "caption" => RowField::Caption,
        "transcript" => RowField::Transcript,
        "owner" | "owner_handle" | "handle" => RowField::Owner,
        "location" | "location_name" => RowField::Location,
        "url" => RowField::Url,
        "any" => RowField::Any,
        _ => return Err(ParseError(original.to_string())),
    };

    let needle = needle_lower.trim().to_string();
    if needle.is_empty() {
        return Err(ParseError(original.to_string()));
    }

    Ok(RowFilter { field, needle })
}

impl RowFilter {
    pub fn matches(&self, row: &ReelRow) -> bool {
        let contains = |v: &Option<String>| {
            v.as_deref()
                .map(|s| s.to_lowercase().contains(&self.needle))
                .unwrap_or(false)
        };
        match self.field {
            RowField::Caption => contains(&row.caption),
            RowField::Transcript => contains(&row.transcript),
            RowField::Owner => contains(&row.owner_handle),
            RowField::Location => contains(&row.location_name),
            RowField::Url => row.url.to_lowercase().contains(&self.needle),
            RowField::Any => {
                row.url.to_lowercase().contains(&self.needle)
                    || contains(&row.caption)
                    || contains(&row.transcript)
                    || contains(&row.owner_handle)
                    || contains(&row.location_name)
            }
        }
    }
}

/// Evaluate a command against the session rows, producing a short text result.
pub fn run(command: &AnalysisCommand, rows: &[ReelRow]) -> String {
    match command {
        AnalysisCommand::Count { filter: None } => format!("{} rows", rows.len()),
        AnalysisCommand::Count {
            filter: Some(filter),
        } => {
            let n = rows.iter().filter(|r| filter.matches(r)).count();
            format!("{} of {} rows match", n, rows.len())
        }
        AnalysisCommand::Filter { filter } => {
            let matching: Vec<&str> = rows
                .iter()
                .filter(|r| filter.matches(r))
                .map(|r| r.url.as_str())
                .collect();
            if matching.is_empty() {
                return "no rows match".to_string();
            }
            let shown = matching.len().min(MAX_FILTER_LINES);
            let mut out = format!("{} rows match:\n", matching.len());
            for url in &matching[..shown] {
                out.push_str(url);
                out.push('\n');
            }
            if matching.len() > shown {
                out.push_str(&format!("... and {} more", matching.len() - shown));
            }
            out
        }
        AnalysisCommand::Summary => summarize(rows),
        AnalysisCommand::Sample { n } => {
            let mut seen: HashSet<String> = HashSet::new();
            let mut lines = Vec::new();
            // One row per owner first, in order, then fill.
            for row in rows {
                if lines.len() >= *n {
                    break;
                }
                let owner = row.owner_handle.clone().unwrap_or_default();
                if owner.is_empty() || seen.insert(owner.to_lowercase()) {
                    lines.push(sample_line(row));
                }
            }
            for row in rows {
                if lines.len() >= *n {
                    break;
                }
                let line = sample_line(row);
                if !lines.contains(&line) {
                    lines.push(line);
                }
            }
            if lines.is_empty() {
                "no rows".to_string()
            } else {
                lines.join("\n")
            }
        }
    }
}

fn sample_line(row: &ReelRow) -> String {
    format!(
        "{} | {} | {}",
        row.url,
        row.owner_handle.as_deref().unwrap_or("-"),
        row.caption.as_deref().unwrap_or("-"),
    )
}

fn summarize(rows: &[ReelRow]) -> String {
    let hydrated = rows
        .iter()
        .filter(|r| r.status != RowStatus::Pending)
        .count();
    let with_transcript = rows.iter().filter(|r| r.transcript.is_some()).count();
    let owners = rows
        .iter()
        .filter_map(|r| r.owner_handle.as_deref())
        .map(|h| h.to_lowercase())
        .collect::<HashSet<_>>()
        .len();
    format!(
        "{} rows, {} hydrated, {} with transcript, {} distinct owners",
        rows.len(),
        hydrated,
        with_transcript,
        owners,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(url: &str, owner: Option<&str>, caption: Option<&str>, transcript: Option<&str>) -> ReelRow {
        let mut r = ReelRow::new(url, "fitness");
        r.owner_handle = owner.map(String::from);
        r.caption = caption.map(String::from);
        r.transcript = transcript.map(String::from);
        if r.transcript.is_some() {
            r.status = RowStatus::TranscriptFetched;
        } else if r.caption.is_some() {
            r.status = RowStatus::Hydrated;
        }
        r
    }

    fn rows() -> Vec<ReelRow> {
        vec![
            row("u1", Some("alice"), Some("fitness tips"), Some("welcome to fitness")),
            row("u2", Some("bob"), Some("cooking"), None),
            row("u3", Some("alice"), None, None),
        ]
    }

    // ─── parse tests ────────────────────────────────────────────

    #[test]
    fn test_parse_count() {
        assert_eq!(parse("count").unwrap(), AnalysisCommand::Count { filter: None });
        assert_eq!(parse("  COUNT ").unwrap(), AnalysisCommand::Count { filter: None });
    }

    #[test]
    fn test_parse_count_with_filter() {
        let cmd = parse("count where transcript contains fitness").unwrap();
        assert_eq!(
            cmd,
            AnalysisCommand::Count {
                filter: Some(RowFilter {
                    field: RowField::Transcript,
                    needle: "fitness".into(),
                }),
            }
        );
    }

    #[test]
    fn test_parse_filter() {
        let cmd = parse("filter caption contains yoga").unwrap();
        assert_eq!(
            cmd,
            AnalysisCommand::Filter {
                filter: RowFilter {
                    field: RowField::Caption,
                    needle: "yoga".into(),
                },
            }
        );
    }

    #[test]
    fn test_parse_summary_and_sample() {
        assert_eq!(parse("summary").unwrap(), AnalysisCommand::Summary);
        assert_eq!(parse("sample").unwrap(), AnalysisCommand::Sample { n: 3 });
        assert_eq!(parse("sample 7").unwrap(), AnalysisCommand::Sample { n: 7 });
        // Clamped to the cap
        assert_eq!(parse("sample 99").unwrap(), AnalysisCommand::Sample { n: 10 });
    }

    #[test]
    fn test_parse_rejects_unknown_shapes() {
        assert!(parse("delete everything").is_err());
        assert!(parse("count how many have fitness").is_err());
        assert!(parse("filter nonsense-field contains x").is_err());
        assert!(parse("filter caption contains ").is_err());
        assert!(parse("sample many").is_err());
        assert!(parse("").is_err());
    }

    // ─── run tests ──────────────────────────────────────────────

    #[test]
    fn test_run_count() {
        let out = run(&parse("count").unwrap(), &rows());
        assert_eq!(out, "3 rows");
    }

    #[test]
    fn test_run_count_filtered() {
        let out = run(
            &parse("count where transcript contains fitness").unwrap(),
            &rows(),
        );
        assert_eq!(out, "1 of 3 rows match");
    }

    #[test]
    fn test_run_filter_lists_urls() {
        let out = run(&parse("filter owner contains alice").unwrap(), &rows());
        assert!(out.starts_with("2 rows match"));
        assert!(out.contains("u1"));
        assert!(out.contains("u3"));
    }

    #[test]
    fn test_run_filter_no_match() {
        let out = run(&parse("filter caption contains xyz").unwrap(), &rows());
        assert_eq!(out, "no rows match");
    }

    #[test]
    fn test_run_summary() {
        let out = run(&AnalysisCommand::Summary, &rows());
        assert!(out.contains("3 rows"));
        assert!(out.contains("2 hydrated"));
        assert!(out.contains("1 with transcript"));
        assert!(out.contains("2 distinct owners"));
    }

    #[test]
    fn test_run_sample_one_per_owner_first() {
        let out = run(&AnalysisCommand::Sample { n: 2 }, &rows());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("alice"));
        assert!(lines[1].contains("bob"));
    }

    #[test]
    fn test_any_field_matches_across_columns() {
        let filter = RowFilter {
            field: RowField::Any,
            needle: "cooking".into(),
        };
        let all = rows();
        let matched: Vec<&ReelRow> = all.iter().filter(|r| filter.matches(r)).collect();
        assert_eq!(matched.len(), 1);
    }
}
