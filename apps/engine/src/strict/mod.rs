//! Strict parsing and validation.
//!
//! `validate` is pure and synchronous: given the normalized source text and
//! a candidate JSON string from the model, it parses, force-overwrites the
//! non-negotiable fields, and runs the full rule battery for the document
//! type. Every rule runs — the retry prompt needs the complete failure list,
//! so nothing stops at the first problem.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

pub mod checks;
pub mod job;
pub mod keywords;
pub mod profile;
pub mod prompts;
pub mod resume;

use self::keywords::{top_keywords, top_short, KEYWORD_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Resume,
    JobPosting,
    Profile,
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resume" => Ok(DocumentKind::Resume),
            "job" | "job_posting" => Ok(DocumentKind::JobPosting),
            "profile" => Ok(DocumentKind::Profile),
            other => Err(format!("unknown document kind '{other}'")),
        }
    }
}

/// One named validation failure.
#[derive(Debug, Clone, Serialize)]
pub struct FailedCheck {
    pub check: &'static str,
    pub message: String,
}

impl fmt::Display for FailedCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.check, self.message)
    }
}

/// Outcome of one validation pass (and, at the pipeline level, of a whole
/// parse). `success` implies `failed_checks` is empty; the reverse is not
/// guaranteed — a fatal parse failure short-circuits with a single entry.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub success: bool,
    pub failed_checks: Vec<FailedCheck>,
    pub data: Value,
    pub raw_text_extract: String,
}

impl Verdict {
    pub fn failure(
        failed_checks: Vec<FailedCheck>,
        data: Value,
        raw_text_extract: String,
    ) -> Self {
        Verdict {
            success: false,
            failed_checks,
            data,
            raw_text_extract,
        }
    }
}

/// The fixed empty-schema object for a document kind.
pub fn empty_record(kind: DocumentKind) -> Value {
    match kind {
        DocumentKind::Resume => resume::empty_value(),
        DocumentKind::JobPosting => job::empty_value(),
        DocumentKind::Profile => profile::empty_value(),
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Force-overwrite fields that are computed deterministically rather than
/// trusted from the model: the raw-text echo always, and for job postings
/// the top-keyword lists.
fn force_fields(kind: DocumentKind, source: &str, data: &mut Value) {
    data["raw_text"] = Value::String(source.to_string());
    if kind == DocumentKind::JobPosting {
        let keywords = top_keywords(source, KEYWORD_COUNT);
        data["keywords_top10"] = serde_json::to_value(top_short(&keywords)).unwrap_or_default();
        data["keywords"] = serde_json::to_value(keywords).unwrap_or_default();
    }
}

/// Validate one candidate JSON string against the source text.
pub fn validate(kind: DocumentKind, source: &str, candidate: &str) -> Verdict {
    let stripped = strip_json_fences(candidate);

    let mut data: Value = match serde_json::from_str(stripped) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(other) => {
            return Verdict::failure(
                vec![FailedCheck {
                    check: "JSON_PARSE",
                    message: format!(
                        "model output is valid JSON but not an object (got {})",
                        json_type_name(&other)
                    ),
                }],
                Value::Null,
                source.to_string(),
            )
        }
        Err(e) => {
            return Verdict::failure(
                vec![FailedCheck {
                    check: "JSON_PARSE",
                    message: format!("model output is not valid JSON: {e}"),
                }],
                Value::Null,
                source.to_string(),
            )
        }
    };

    force_fields(kind, source, &mut data);

    let failed_checks = match kind {
        DocumentKind::Resume => resume::validate(source, &data),
        DocumentKind::JobPosting => job::validate(source, &data),
        DocumentKind::Profile => profile::validate(source, &data),
    };

    Verdict {
        success: failed_checks.is_empty(),
        failed_checks,
        data,
        raw_text_extract: source.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
