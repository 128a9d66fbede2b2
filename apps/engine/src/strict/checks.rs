//! Shared validation rules. Each check appends tagged failures and never
//! stops early — the retry prompt needs the complete list.

use std::collections::HashSet;

use serde_json::Value;

use super::FailedCheck;

/// Hard cap on reported hallucinated tokens per run.
const MAX_REPORTED_TOKENS: usize = 25;
/// Tokens shorter than this are too noisy to flag.
const SWEEP_MIN_TOKEN_LEN: usize = 3;

const MONTH_ABBREVIATIONS: &[&str] = &[
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Every extracted value must literally occur in the source text,
/// case-insensitively. Empty values are skipped — absence is not invention.
pub fn check_verbatim(
    source: &str,
    field: &str,
    values: &[&str],
    failed: &mut Vec<FailedCheck>,
) {
    let source_lower = source.to_lowercase();
    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !source_lower.contains(&trimmed.to_lowercase()) {
            failed.push(FailedCheck {
                check: "VERBATIM",
                message: format!("{field}: '{trimmed}' does not appear in the source text"),
            });
        }
    }
}

/// Word-count window for bullet-like fields.
pub fn check_word_window(
    field: &str,
    values: &[String],
    min: usize,
    max: usize,
    failed: &mut Vec<FailedCheck>,
) {
    for value in values {
        let words = value.split_whitespace().count();
        if words < min || words > max {
            failed.push(FailedCheck {
                check: "WORD_COUNT",
                message: format!(
                    "{field}: '{value}' has {words} words, expected {min}-{max}"
                ),
            });
        }
    }
}

/// Duplicate detection within one list field (case-insensitive, trimmed).
pub fn check_duplicates(field: &str, values: &[String], failed: &mut Vec<FailedCheck>) {
    let mut seen = HashSet::new();
    for value in values {
        let key = value.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        if !seen.insert(key) {
            failed.push(FailedCheck {
                check: "DUPLICATE",
                message: format!("{field}: '{}' appears more than once", value.trim()),
            });
        }
    }
}

/// Dates must match `Mon YYYY` (three-letter month abbreviation + 4-digit
/// year) or be empty.
pub fn check_date_format(field: &str, value: &str, failed: &mut Vec<FailedCheck>) {
    if value.is_empty() || parse_month_year(value).is_some() {
        return;
    }
    failed.push(FailedCheck {
        check: "DATE_FORMAT",
        message: format!("{field}: '{value}' is not in 'Mon YYYY' format"),
    });
}

/// Parse `Mon YYYY` into (year, month-index) for ordering comparisons.
pub fn parse_month_year(value: &str) -> Option<(i32, u32)> {
    let (month, year) = value.split_once(' ')?;
    let month_index = MONTH_ABBREVIATIONS.iter().position(|m| *m == month)? as u32 + 1;
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((year.parse().ok()?, month_index))
}

/// Numeric-as-string fields must be digits only or empty.
pub fn check_digits_only(field: &str, value: &str, failed: &mut Vec<FailedCheck>) {
    if value.is_empty() || value.chars().all(|c| c.is_ascii_digit()) {
        return;
    }
    failed.push(FailedCheck {
        check: "NUMERIC_FORMAT",
        message: format!("{field}: '{value}' must contain digits only or be empty"),
    });
}

fn sweep_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| t.len() >= SWEEP_MIN_TOKEN_LEN)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .map(String::from)
        .collect()
}

/// The token set of the source text, used by the no-hallucination sweep.
pub fn token_set(text: &str) -> HashSet<String> {
    sweep_tokens(text).into_iter().collect()
}

fn collect_strings<'a>(
    value: &'a Value,
    allow: &[&str],
    strings: &mut Vec<&'a str>,
) {
    match value {
        Value::String(s) => strings.push(s),
        Value::Array(items) => {
            for item in items {
                collect_strings(item, allow, strings);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                if allow.contains(&key.as_str()) {
                    continue;
                }
                collect_strings(item, allow, strings);
            }
        }
        _ => {}
    }
}

/// No-hallucination sweep: every token of every string value (outside the
/// allow-list) must come from the source text. Reporting is capped so a
/// runaway model cannot produce unbounded output.
pub fn hallucination_sweep(
    source: &str,
    data: &Value,
    allow: &[&str],
    failed: &mut Vec<FailedCheck>,
) {
    let known = token_set(source);
    let mut strings = Vec::new();
    collect_strings(data, allow, &mut strings);

    let mut flagged: Vec<String> = Vec::new();
    let mut reported: HashSet<String> = HashSet::new();
    for s in strings {
        for token in sweep_tokens(s) {
            if !known.contains(&token) && reported.insert(token.clone()) {
                flagged.push(token);
                if flagged.len() >= MAX_REPORTED_TOKENS {
                    break;
                }
            }
        }
        if flagged.len() >= MAX_REPORTED_TOKENS {
            break;
        }
    }

    for token in flagged {
        failed.push(FailedCheck {
            check: "HALLUCINATION",
            message: format!("token '{token}' does not occur in the source text"),
        });
    }
}

/// The echoed raw text must be byte-identical to the normalized input. The
/// force-overwrite makes this hold; the check catches silent corruption
/// elsewhere in the pipeline.
pub fn check_echo(source: &str, raw_text: &str, failed: &mut Vec<FailedCheck>) {
    if raw_text != source {
        failed.push(FailedCheck {
            check: "ECHO",
            message: "raw_text is not byte-identical to the normalized source".to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SOURCE: &str = "Senior Rust engineer building distributed systems with Tokio and Kafka since Jan 2020.";

    #[test]
    fn test_verbatim_passes_for_substring() {
        let mut failed = Vec::new();
        check_verbatim(SOURCE, "skills", &["distributed systems", "TOKIO"], &mut failed);
        assert!(failed.is_empty());
    }

    #[test]
    fn test_verbatim_flags_missing_value() {
        let mut failed = Vec::new();
        check_verbatim(SOURCE, "skills", &["Kubernetes"], &mut failed);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].check, "VERBATIM");
        assert!(failed[0].message.contains("Kubernetes"));
    }

    #[test]
    fn test_verbatim_skips_empty_values() {
        let mut failed = Vec::new();
        check_verbatim(SOURCE, "skills", &["", "  "], &mut failed);
        assert!(failed.is_empty());
    }

    #[test]
    fn test_word_window_flags_short_and_long() {
        let mut failed = Vec::new();
        let values = vec![
            "Too short".to_string(),
            "Built a streaming ingestion service processing forty thousand events per second".to_string(),
        ];
        check_word_window("bullets", &values, 6, 50, &mut failed);
        assert_eq!(failed.len(), 1);
        assert!(failed[0].message.contains("2 words"));
    }

    #[test]
    fn test_duplicates_case_insensitive() {
        let mut failed = Vec::new();
        let values = vec!["Rust".to_string(), "rust ".to_string(), "Tokio".to_string()];
        check_duplicates("skills", &values, &mut failed);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].check, "DUPLICATE");
    }

    #[test]
    fn test_date_format_accepts_mon_yyyy_and_empty() {
        let mut failed = Vec::new();
        check_date_format("date_start", "Jan 2020", &mut failed);
        check_date_format("date_end", "", &mut failed);
        assert!(failed.is_empty());
    }

    #[test]
    fn test_date_format_rejects_other_shapes() {
        for bad in ["January 2020", "2020-01", "Jan 20", "jan 2020", "Jan  2020"] {
            let mut failed = Vec::new();
            check_date_format("date_start", bad, &mut failed);
            assert_eq!(failed.len(), 1, "expected '{bad}' to fail");
        }
    }

    #[test]
    fn test_parse_month_year_ordering_values() {
        assert_eq!(parse_month_year("Jan 2020"), Some((2020, 1)));
        assert_eq!(parse_month_year("Dec 1999"), Some((1999, 12)));
        assert_eq!(parse_month_year("Smarch 2020"), None);
    }

    #[test]
    fn test_digits_only() {
        let mut failed = Vec::new();
        check_digits_only("salary_min", "120000", &mut failed);
        check_digits_only("salary_max", "", &mut failed);
        assert!(failed.is_empty());
        check_digits_only("salary_min", "$120k", &mut failed);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].check, "NUMERIC_FORMAT");
    }

    #[test]
    fn test_sweep_passes_when_all_tokens_known() {
        let mut failed = Vec::new();
        let data = json!({"summary": "Rust engineer with Kafka", "raw_text": "anything"});
        hallucination_sweep(SOURCE, &data, &["raw_text"], &mut failed);
        assert!(failed.is_empty());
    }

    #[test]
    fn test_sweep_flags_unknown_token() {
        let mut failed = Vec::new();
        let data = json!({"summary": "Rust engineer with Golang"});
        hallucination_sweep(SOURCE, &data, &[], &mut failed);
        assert_eq!(failed.len(), 1);
        assert!(failed[0].message.contains("golang"));
    }

    #[test]
    fn test_sweep_respects_allow_list_subtree() {
        let mut failed = Vec::new();
        let data = json!({"meta": {"invented": "zzzunknown"}, "summary": "Rust"});
        hallucination_sweep(SOURCE, &data, &["meta"], &mut failed);
        assert!(failed.is_empty());
    }

    #[test]
    fn test_sweep_reporting_is_capped() {
        let invented: Vec<String> = (0..40).map(|i| format!("invented{i}xyz")).collect();
        let data = json!({ "skills": invented });
        let mut failed = Vec::new();
        hallucination_sweep(SOURCE, &data, &[], &mut failed);
        assert_eq!(failed.len(), MAX_REPORTED_TOKENS);
    }

    #[test]
    fn test_sweep_ignores_short_and_numeric_tokens() {
        let mut failed = Vec::new();
        let data = json!({"summary": "qq 42 7x"});
        hallucination_sweep(SOURCE, &data, &[], &mut failed);
        assert!(failed.is_empty());
    }

    #[test]
    fn test_echo_mismatch_flagged() {
        let mut failed = Vec::new();
        check_echo("abc", "abc", &mut failed);
        assert!(failed.is_empty());
        check_echo("abc", "abd", &mut failed);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].check, "ECHO");
    }
}
