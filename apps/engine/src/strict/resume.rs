//! Resume schema and rule set.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::checks::{
    check_date_format, check_duplicates, check_echo, check_verbatim, check_word_window,
    hallucination_sweep, parse_month_year,
};
use super::FailedCheck;

pub const BULLET_MIN_WORDS: usize = 6;
pub const BULLET_MAX_WORDS: usize = 50;

/// String values the no-hallucination sweep must not inspect.
const SWEEP_ALLOW: &[&str] = &["raw_text"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeBasics {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub linkedin: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceEntry {
    pub company: String,
    pub role: String,
    /// `Mon YYYY` or empty.
    pub date_start: String,
    /// `Mon YYYY`, or empty for a current position.
    pub date_end: String,
    pub is_current: bool,
    pub bullets: Vec<String>,
}

impl ExperienceEntry {
    fn is_current_position(&self) -> bool {
        self.is_current || (!self.date_start.is_empty() && self.date_end.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EducationEntry {
    pub institution: String,
    pub degree: String,
    pub field: String,
    pub date_start: String,
    pub date_end: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillGroups {
    pub technical: Vec<String>,
    pub tools: Vec<String>,
    pub soft: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeRecord {
    pub basics: ResumeBasics,
    pub summary: String,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub skills: SkillGroups,
    pub raw_text: String,
}

/// The fixed empty-schema shape returned for degenerate (empty) input.
pub fn empty_value() -> Value {
    json!({
        "basics": {"full_name": "", "email": "", "phone": "", "linkedin": ""},
        "summary": "",
        "experience": [],
        "education": [],
        "skills": {"technical": [], "tools": [], "soft": []},
        "raw_text": "",
    })
}

pub fn validate(source: &str, data: &Value) -> Vec<FailedCheck> {
    let mut failed = Vec::new();

    let record: ResumeRecord = match serde_json::from_value(data.clone()) {
        Ok(record) => record,
        Err(e) => {
            return vec![FailedCheck {
                check: "SCHEMA",
                message: format!("resume object does not match the schema: {e}"),
            }]
        }
    };

    let basics = &record.basics;
    check_verbatim(
        source,
        "basics",
        &[
            basics.full_name.as_str(),
            basics.email.as_str(),
            basics.phone.as_str(),
            basics.linkedin.as_str(),
        ],
        &mut failed,
    );

    for (i, entry) in record.experience.iter().enumerate() {
        let field = format!("experience[{i}]");
        check_verbatim(
            source,
            &field,
            &[entry.company.as_str(), entry.role.as_str()],
            &mut failed,
        );
        check_verbatim(
            source,
            &format!("{field}.bullets"),
            &entry.bullets.iter().map(String::as_str).collect::<Vec<_>>(),
            &mut failed,
        );
        check_word_window(
            &format!("{field}.bullets"),
            &entry.bullets,
            BULLET_MIN_WORDS,
            BULLET_MAX_WORDS,
            &mut failed,
        );
        check_duplicates(&format!("{field}.bullets"), &entry.bullets, &mut failed);
        check_date_format(&format!("{field}.date_start"), &entry.date_start, &mut failed);
        check_date_format(&format!("{field}.date_end"), &entry.date_end, &mut failed);
    }

    for (i, entry) in record.education.iter().enumerate() {
        let field = format!("education[{i}]");
        check_verbatim(source, &field, &[entry.institution.as_str()], &mut failed);
        check_date_format(&format!("{field}.date_start"), &entry.date_start, &mut failed);
        check_date_format(&format!("{field}.date_end"), &entry.date_end, &mut failed);
    }

    for (name, group) in [
        ("skills.technical", &record.skills.technical),
        ("skills.tools", &record.skills.tools),
        ("skills.soft", &record.skills.soft),
    ] {
        check_verbatim(
            source,
            name,
            &group.iter().map(String::as_str).collect::<Vec<_>>(),
            &mut failed,
        );
        check_duplicates(name, group, &mut failed);
    }

    check_chronology(&record.experience, &mut failed);
    check_employer_overlap(&record.experience, &mut failed);

    hallucination_sweep(source, data, SWEEP_ALLOW, &mut failed);
    check_echo(source, &record.raw_text, &mut failed);

    failed
}

/// Work history must be reverse-chronological, with at most one current
/// entry, and the current entry must come first.
fn check_chronology(entries: &[ExperienceEntry], failed: &mut Vec<FailedCheck>) {
    let current_indices: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_current_position())
        .map(|(i, _)| i)
        .collect();

    if current_indices.len() > 1 {
        failed.push(FailedCheck {
            check: "CURRENT_ENTRY",
            message: format!(
                "{} experience entries are marked current; at most one is allowed",
                current_indices.len()
            ),
        });
    }
    if let Some(&first_current) = current_indices.first() {
        if first_current != 0 {
            failed.push(FailedCheck {
                check: "CURRENT_ENTRY",
                message: "the current position must be the first experience entry".to_string(),
            });
        }
    }

    let starts: Vec<(usize, (i32, u32))> = entries
        .iter()
        .enumerate()
        .filter_map(|(i, e)| parse_month_year(&e.date_start).map(|d| (i, d)))
        .collect();
    for pair in starts.windows(2) {
        let (earlier_index, earlier) = pair[0];
        let (later_index, later) = pair[1];
        if later > earlier {
            failed.push(FailedCheck {
                check: "CHRONOLOGY",
                message: format!(
                    "experience[{later_index}] starts after experience[{earlier_index}]; \
                     entries must be in reverse-chronological order"
                ),
            });
        }
    }
}

/// Repeated employer entries trigger a date-overlap check. The trigger is
/// exact company-name string equality; near-duplicates ("Acme" vs
/// "Acme Inc.") are deliberately not normalized before comparison.
fn check_employer_overlap(entries: &[ExperienceEntry], failed: &mut Vec<FailedCheck>) {
    for (i, a) in entries.iter().enumerate() {
        for (j, b) in entries.iter().enumerate().skip(i + 1) {
            if a.company.is_empty() || a.company != b.company {
                continue;
            }
            if ranges_overlap(a, b) {
                failed.push(FailedCheck {
                    check: "EMPLOYER_OVERLAP",
                    message: format!(
                        "experience[{i}] and experience[{j}] at '{}' have overlapping date ranges",
                        a.company
                    ),
                });
            }
        }
    }
}

fn month_ordinal(date: &str) -> Option<i32> {
    parse_month_year(date).map(|(year, month)| year * 12 + month as i32)
}

fn ranges_overlap(a: &ExperienceEntry, b: &ExperienceEntry) -> bool {
    let (Some(start_a), Some(start_b)) =
        (month_ordinal(&a.date_start), month_ordinal(&b.date_start))
    else {
        return false;
    };
    let end_a = month_ordinal(&a.date_end).unwrap_or(i32::MAX);
    let end_b = month_ordinal(&b.date_end).unwrap_or(i32::MAX);
    start_a <= end_b && start_b <= end_a
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "Jane Smith\njane@example.com\n\
        Acme Corp — Senior Engineer, Jan 2021 to present.\n\
        Built a streaming ingestion pipeline handling forty thousand events per second.\n\
        Reduced deployment time from hours to minutes across twelve services.\n\
        Globex — Engineer, Mar 2018 to Dec 2020.\n\
        Skills: Rust, Tokio, Kafka, PostgreSQL.";

    fn entry(company: &str, start: &str, end: &str, current: bool) -> ExperienceEntry {
        ExperienceEntry {
            company: company.to_string(),
            role: "Engineer".to_string(),
            date_start: start.to_string(),
            date_end: end.to_string(),
            is_current: current,
            bullets: vec![],
        }
    }

    fn valid_record() -> Value {
        serde_json::json!({
            "basics": {
                "full_name": "Jane Smith",
                "email": "jane@example.com",
                "phone": "",
                "linkedin": ""
            },
            "summary": "Senior Engineer",
            "experience": [
                {
                    "company": "Acme Corp",
                    "role": "Senior Engineer",
                    "date_start": "Jan 2021",
                    "date_end": "",
                    "is_current": true,
                    "bullets": [
                        "Built a streaming ingestion pipeline handling forty thousand events per second."
                    ]
                },
                {
                    "company": "Globex",
                    "role": "Engineer",
                    "date_start": "Mar 2018",
                    "date_end": "Dec 2020",
                    "is_current": false,
                    "bullets": []
                }
            ],
            "education": [],
            "skills": {"technical": ["Rust", "Tokio"], "tools": ["Kafka"], "soft": []},
            "raw_text": SOURCE,
        })
    }

    #[test]
    fn test_valid_record_passes() {
        let failed = validate(SOURCE, &valid_record());
        assert!(failed.is_empty(), "unexpected failures: {failed:?}");
    }

    #[test]
    fn test_invented_skill_flagged_twice() {
        let mut data = valid_record();
        data["skills"]["technical"] = serde_json::json!(["Rust", "Elixir"]);
        let failed = validate(SOURCE, &data);
        // Verbatim check and hallucination sweep both fire.
        assert!(failed.iter().any(|f| f.check == "VERBATIM"));
        assert!(failed.iter().any(|f| f.check == "HALLUCINATION"));
    }

    #[test]
    fn test_duplicate_bullet_flagged_even_when_verbatim() {
        // The bullet text exists in the source, so each copy passes the
        // verbatim check individually — the duplicate check must still fire.
        let mut data = valid_record();
        let bullet = "Reduced deployment time from hours to minutes across twelve services.";
        data["experience"][0]["bullets"] = serde_json::json!([bullet, bullet]);
        let failed = validate(SOURCE, &data);
        assert!(failed.iter().any(|f| f.check == "DUPLICATE"));
        assert!(!failed.iter().any(|f| f.check == "VERBATIM"));
    }

    #[test]
    fn test_short_bullet_fails_word_window() {
        let mut data = valid_record();
        data["experience"][0]["bullets"] = serde_json::json!(["Built Rust Tokio."]);
        let failed = validate(SOURCE, &data);
        assert!(failed.iter().any(|f| f.check == "WORD_COUNT"));
    }

    #[test]
    fn test_bad_date_format_flagged() {
        let mut data = valid_record();
        data["experience"][1]["date_start"] = serde_json::json!("March 2018");
        let failed = validate(SOURCE, &data);
        assert!(failed.iter().any(|f| f.check == "DATE_FORMAT"));
    }

    #[test]
    fn test_echo_mismatch_flagged() {
        let mut data = valid_record();
        data["raw_text"] = serde_json::json!("tampered");
        let failed = validate(SOURCE, &data);
        assert!(failed.iter().any(|f| f.check == "ECHO"));
    }

    #[test]
    fn test_schema_mismatch_short_circuits() {
        let data = serde_json::json!({"experience": "not an array"});
        let failed = validate(SOURCE, &data);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].check, "SCHEMA");
    }

    #[test]
    fn test_two_current_entries_flagged() {
        let entries = vec![
            entry("Acme Corp", "Jan 2021", "", true),
            entry("Globex", "Mar 2018", "", true),
        ];
        let mut failed = Vec::new();
        check_chronology(&entries, &mut failed);
        assert!(failed.iter().any(|f| f.check == "CURRENT_ENTRY"));
    }

    #[test]
    fn test_current_entry_not_first_flagged() {
        let entries = vec![
            entry("Globex", "Mar 2018", "Dec 2020", false),
            entry("Acme Corp", "Jan 2021", "", true),
        ];
        let mut failed = Vec::new();
        check_chronology(&entries, &mut failed);
        assert!(failed
            .iter()
            .any(|f| f.check == "CURRENT_ENTRY" && f.message.contains("first")));
    }

    #[test]
    fn test_forward_chronological_order_flagged() {
        let entries = vec![
            entry("Globex", "Mar 2018", "Dec 2020", false),
            entry("Acme Corp", "Jan 2021", "", false),
        ];
        let mut failed = Vec::new();
        check_chronology(&entries, &mut failed);
        assert!(failed.iter().any(|f| f.check == "CHRONOLOGY"));
    }

    #[test]
    fn test_same_employer_overlap_flagged() {
        let entries = vec![
            entry("Acme Corp", "Jan 2021", "", false),
            entry("Acme Corp", "Mar 2020", "Jun 2021", false),
        ];
        let mut failed = Vec::new();
        check_employer_overlap(&entries, &mut failed);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].check, "EMPLOYER_OVERLAP");
    }

    #[test]
    fn test_near_duplicate_employer_name_not_compared() {
        // Exact string equality is the trigger — "Acme Corp Inc." does not
        // match "Acme Corp", so no overlap check runs.
        let entries = vec![
            entry("Acme Corp", "Jan 2021", "", false),
            entry("Acme Corp Inc.", "Mar 2020", "Jun 2021", false),
        ];
        let mut failed = Vec::new();
        check_employer_overlap(&entries, &mut failed);
        assert!(failed.is_empty());
    }

    #[test]
    fn test_same_employer_sequential_stints_pass() {
        let entries = vec![
            entry("Acme Corp", "Jan 2022", "", false),
            entry("Acme Corp", "Mar 2018", "Dec 2020", false),
        ];
        let mut failed = Vec::new();
        check_employer_overlap(&entries, &mut failed);
        assert!(failed.is_empty());
    }

    #[test]
    fn test_empty_value_matches_default_record() {
        let record: ResumeRecord = serde_json::from_value(empty_value()).unwrap();
        assert!(record.experience.is_empty());
        assert!(record.basics.full_name.is_empty());
    }
}
