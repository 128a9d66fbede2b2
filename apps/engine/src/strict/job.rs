//! Job posting schema and rule set.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::checks::{
    check_digits_only, check_duplicates, check_echo, check_verbatim, check_word_window,
    hallucination_sweep,
};
use super::keywords::{top_keywords, top_short, KEYWORD_COUNT, KEYWORD_SHORT_COUNT};
use super::FailedCheck;

pub const RESPONSIBILITY_MIN_WORDS: usize = 6;
pub const RESPONSIBILITY_MAX_WORDS: usize = 50;

/// Fixed enumerated seniority tiers.
pub const SENIORITY_LEVELS: &[&str] = &[
    "internship",
    "entry",
    "junior",
    "mid",
    "senior",
    "lead",
    "staff",
    "principal",
    "director",
    "executive",
    "unknown",
];

/// Enumerated categoricals, forced keyword lists, and digits-only fields are
/// governed by their own checks, not the token sweep.
const SWEEP_ALLOW: &[&str] = &[
    "raw_text",
    "keywords",
    "keywords_top10",
    "seniority_level",
    "min_years_experience",
    "salary_min",
    "salary_max",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobPostingRecord {
    pub title: String,
    pub company: String,
    pub seniority_level: String,
    /// Digits only, or empty when the posting does not state a minimum.
    pub min_years_experience: String,
    pub salary_min: String,
    pub salary_max: String,
    pub responsibilities: Vec<String>,
    pub required_skills: Vec<String>,
    /// Force-written deterministic top-25 list.
    pub keywords: Vec<String>,
    /// Always the first 10 entries of `keywords`.
    pub keywords_top10: Vec<String>,
    pub raw_text: String,
}

pub fn empty_value() -> Value {
    json!({
        "title": "",
        "company": "",
        "seniority_level": "unknown",
        "min_years_experience": "",
        "salary_min": "",
        "salary_max": "",
        "responsibilities": [],
        "required_skills": [],
        "keywords": [],
        "keywords_top10": [],
        "raw_text": "",
    })
}

/// Minimum-years compatibility window per seniority tier (inclusive).
/// `unknown` skips the cross-field check entirely.
fn years_window(seniority: &str) -> Option<(u32, u32)> {
    match seniority {
        "internship" => Some((0, 1)),
        "entry" => Some((0, 2)),
        "junior" => Some((0, 3)),
        "mid" => Some((2, 6)),
        "senior" => Some((4, 12)),
        "lead" => Some((5, 15)),
        "staff" => Some((6, 20)),
        "principal" => Some((8, 25)),
        "director" => Some((7, 30)),
        "executive" => Some((10, 40)),
        _ => None,
    }
}

pub fn validate(source: &str, data: &Value) -> Vec<FailedCheck> {
    let mut failed = Vec::new();

    let record: JobPostingRecord = match serde_json::from_value(data.clone()) {
        Ok(record) => record,
        Err(e) => {
            return vec![FailedCheck {
                check: "SCHEMA",
                message: format!("job posting object does not match the schema: {e}"),
            }]
        }
    };

    check_verbatim(
        source,
        "posting",
        &[record.title.as_str(), record.company.as_str()],
        &mut failed,
    );
    check_verbatim(
        source,
        "required_skills",
        &record
            .required_skills
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>(),
        &mut failed,
    );
    check_duplicates("required_skills", &record.required_skills, &mut failed);

    check_word_window(
        "responsibilities",
        &record.responsibilities,
        RESPONSIBILITY_MIN_WORDS,
        RESPONSIBILITY_MAX_WORDS,
        &mut failed,
    );
    check_duplicates("responsibilities", &record.responsibilities, &mut failed);

    if !SENIORITY_LEVELS.contains(&record.seniority_level.as_str()) {
        failed.push(FailedCheck {
            check: "ENUM",
            message: format!(
                "seniority_level '{}' is not one of the allowed tiers",
                record.seniority_level
            ),
        });
    }

    check_digits_only(
        "min_years_experience",
        &record.min_years_experience,
        &mut failed,
    );
    check_digits_only("salary_min", &record.salary_min, &mut failed);
    check_digits_only("salary_max", &record.salary_max, &mut failed);

    check_years_vs_seniority(&record, &mut failed);
    check_salary_range(&record, &mut failed);
    check_keyword_lists(source, &record, &mut failed);

    hallucination_sweep(source, data, SWEEP_ALLOW, &mut failed);
    check_echo(source, &record.raw_text, &mut failed);

    failed
}

fn check_years_vs_seniority(record: &JobPostingRecord, failed: &mut Vec<FailedCheck>) {
    let Ok(years) = record.min_years_experience.parse::<u32>() else {
        return; // empty or malformed — format check owns that
    };
    let Some((min, max)) = years_window(&record.seniority_level) else {
        return;
    };
    if years < min || years > max {
        failed.push(FailedCheck {
            check: "YEARS_SENIORITY",
            message: format!(
                "{years} years minimum experience is incompatible with the \
                 '{}' tier (expected {min}-{max})",
                record.seniority_level
            ),
        });
    }
}

fn check_salary_range(record: &JobPostingRecord, failed: &mut Vec<FailedCheck>) {
    let (Ok(min), Ok(max)) = (
        record.salary_min.parse::<u64>(),
        record.salary_max.parse::<u64>(),
    ) else {
        return;
    };
    if min > max {
        failed.push(FailedCheck {
            check: "SALARY_RANGE",
            message: format!("salary_min {min} exceeds salary_max {max}"),
        });
    }
}

/// Length exactness for both keyword lists, prefix consistency, and the
/// determinism re-check. A divergence between the stored list and a fresh
/// computation is a pipeline bug, not a model bug, and is tagged apart.
fn check_keyword_lists(source: &str, record: &JobPostingRecord, failed: &mut Vec<FailedCheck>) {
    let expected = top_keywords(source, KEYWORD_COUNT);

    if record.keywords.len() != expected.len() {
        failed.push(FailedCheck {
            check: "KEYWORD_COUNT",
            message: format!(
                "keywords has {} entries, expected exactly {}",
                record.keywords.len(),
                expected.len()
            ),
        });
    }
    if record.keywords_top10.len() != expected.len().min(KEYWORD_SHORT_COUNT) {
        failed.push(FailedCheck {
            check: "KEYWORD_TOP10",
            message: format!(
                "keywords_top10 has {} entries, expected exactly {}",
                record.keywords_top10.len(),
                expected.len().min(KEYWORD_SHORT_COUNT)
            ),
        });
    } else if record.keywords_top10[..]
        != record.keywords[..record.keywords_top10.len().min(record.keywords.len())]
    {
        failed.push(FailedCheck {
            check: "KEYWORD_TOP10",
            message: "keywords_top10 is not the prefix of keywords".to_string(),
        });
    }

    if record.keywords != expected {
        failed.push(FailedCheck {
            check: "KEYWORD_PIPELINE",
            message: "stored keyword list diverges from the deterministic computation; \
                      this indicates a pipeline defect, not a model error"
                .to_string(),
        });
    }
}
