//! Professional-profile export schema and rule set.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::checks::{
    check_date_format, check_duplicates, check_echo, check_verbatim, hallucination_sweep,
    parse_month_year,
};
use super::FailedCheck;

const SWEEP_ALLOW: &[&str] = &["raw_text"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionEntry {
    pub company: String,
    pub title: String,
    pub date_start: String,
    pub date_end: String,
    pub is_current: bool,
}

impl PositionEntry {
    fn is_current_position(&self) -> bool {
        self.is_current || (!self.date_start.is_empty() && self.date_end.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileRecord {
    pub full_name: String,
    pub headline: String,
    pub summary: String,
    pub positions: Vec<PositionEntry>,
    pub skills: Vec<String>,
    pub certifications: Vec<String>,
    pub raw_text: String,
}

pub fn empty_value() -> Value {
    json!({
        "full_name": "",
        "headline": "",
        "summary": "",
        "positions": [],
        "skills": [],
        "certifications": [],
        "raw_text": "",
    })
}

pub fn validate(source: &str, data: &Value) -> Vec<FailedCheck> {
    let mut failed = Vec::new();

    let record: ProfileRecord = match serde_json::from_value(data.clone()) {
        Ok(record) => record,
        Err(e) => {
            return vec![FailedCheck {
                check: "SCHEMA",
                message: format!("profile object does not match the schema: {e}"),
            }]
        }
    };

    check_verbatim(
        source,
        "profile",
        &[record.full_name.as_str(), record.headline.as_str()],
        &mut failed,
    );

    for (i, position) in record.positions.iter().enumerate() {
        let field = format!("positions[{i}]");
        check_verbatim(
            source,
            &field,
            &[position.company.as_str(), position.title.as_str()],
            &mut failed,
        );
        check_date_format(&format!("{field}.date_start"), &position.date_start, &mut failed);
        check_date_format(&format!("{field}.date_end"), &position.date_end, &mut failed);
    }

    for (name, values) in [
        ("skills", &record.skills),
        ("certifications", &record.certifications),
    ] {
        check_verbatim(
            source,
            name,
            &values.iter().map(String::as_str).collect::<Vec<_>>(),
            &mut failed,
        );
        check_duplicates(name, values, &mut failed);
    }

    check_position_order(&record.positions, &mut failed);

    hallucination_sweep(source, data, SWEEP_ALLOW, &mut failed);
    check_echo(source, &record.raw_text, &mut failed);

    failed
}

fn check_position_order(positions: &[PositionEntry], failed: &mut Vec<FailedCheck>) {
    let current_indices: Vec<usize> = positions
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_current_position())
        .map(|(i, _)| i)
        .collect();

    if current_indices.len() > 1 {
        failed.push(FailedCheck {
            check: "CURRENT_ENTRY",
            message: format!(
                "{} positions are marked current; at most one is allowed",
                current_indices.len()
            ),
        });
    }
    if let Some(&first_current) = current_indices.first() {
        if first_current != 0 {
            failed.push(FailedCheck {
                check: "CURRENT_ENTRY",
                message: "the current position must be listed first".to_string(),
            });
        }
    }

    let starts: Vec<(usize, (i32, u32))> = positions
        .iter()
        .enumerate()
        .filter_map(|(i, p)| parse_month_year(&p.date_start).map(|d| (i, d)))
        .collect();
    for pair in starts.windows(2) {
        let (earlier_index, earlier) = pair[0];
        let (later_index, later) = pair[1];
        if later > earlier {
            failed.push(FailedCheck {
                check: "CHRONOLOGY",
                message: format!(
                    "positions[{later_index}] starts after positions[{earlier_index}]; \
                     entries must be in reverse-chronological order"
                ),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "Sam Rivera\nPrincipal Platform Engineer\n\
        Hooli — Principal Platform Engineer, Feb 2022 to present.\n\
        Pied Piper — Staff Engineer, Jun 2019 to Jan 2022.\n\
        Skills: Rust, Go, Terraform. Certifications: CKA.";

    fn valid_record() -> Value {
        json!({
            "full_name": "Sam Rivera",
            "headline": "Principal Platform Engineer",
            "summary": "Platform Engineer",
            "positions": [
                {
                    "company": "Hooli",
                    "title": "Principal Platform Engineer",
                    "date_start": "Feb 2022",
                    "date_end": "",
                    "is_current": true
                },
                {
                    "company": "Pied Piper",
                    "title": "Staff Engineer",
                    "date_start": "Jun 2019",
                    "date_end": "Jan 2022",
                    "is_current": false
                }
            ],
            "skills": ["Rust", "Go", "Terraform"],
            "certifications": ["CKA"],
            "raw_text": SOURCE,
        })
    }

    #[test]
    fn test_valid_record_passes() {
        let failed = validate(SOURCE, &valid_record());
        assert!(failed.is_empty(), "unexpected failures: {failed:?}");
    }

    #[test]
    fn test_invented_certification_flagged() {
        let mut data = valid_record();
        data["certifications"] = json!(["CKA", "AWS Solutions Architect"]);
        let failed = validate(SOURCE, &data);
        assert!(failed.iter().any(|f| f.check == "VERBATIM"));
    }

    #[test]
    fn test_duplicate_skill_flagged() {
        let mut data = valid_record();
        data["skills"] = json!(["Rust", "rust"]);
        let failed = validate(SOURCE, &data);
        assert!(failed.iter().any(|f| f.check == "DUPLICATE"));
    }

    #[test]
    fn test_current_position_must_be_first() {
        let mut data = valid_record();
        let positions = data["positions"].as_array().unwrap().clone();
        data["positions"] = json!([positions[1], positions[0]]);
        let failed = validate(SOURCE, &data);
        assert!(failed.iter().any(|f| f.check == "CURRENT_ENTRY"));
    }

    #[test]
    fn test_forward_order_flagged() {
        let positions = vec![
            PositionEntry {
                company: "Pied Piper".to_string(),
                title: "Staff Engineer".to_string(),
                date_start: "Jun 2019".to_string(),
                date_end: "Jan 2022".to_string(),
                is_current: false,
            },
            PositionEntry {
                company: "Hooli".to_string(),
                title: "Principal Platform Engineer".to_string(),
                date_start: "Feb 2022".to_string(),
                date_end: "".to_string(),
                is_current: false,
            },
        ];
        let mut failed = Vec::new();
        check_position_order(&positions, &mut failed);
        assert!(failed.iter().any(|f| f.check == "CHRONOLOGY"));
    }

    #[test]
    fn test_schema_mismatch_short_circuits() {
        let data = json!({"positions": 12});
        let failed = validate(SOURCE, &data);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].check, "SCHEMA");
    }

    #[test]
    fn test_empty_value_is_schema_conformant() {
        let record: ProfileRecord = serde_json::from_value(empty_value()).unwrap();
        assert!(record.positions.is_empty());
    }
}
