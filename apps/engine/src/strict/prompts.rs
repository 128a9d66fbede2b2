//! Instruction prompts for strict extraction.
//!
//! Prompts are deterministic and fully specified: schema + rules + the
//! normalized text. Replace `{document_text}` before sending. The retry
//! suffix carries the literal failure list from the first attempt.

use super::{DocumentKind, FailedCheck};

const COMMON_RULES: &str = "\
You MUST respond with a single valid JSON object and nothing else. \
Do NOT use markdown code fences. \
Do NOT include explanations or apologies. \
Every extracted value must appear verbatim in the document text — never \
paraphrase, never invent, never infer facts that are not written down. \
Use the empty string for anything the document does not state. \
All dates use the exact format 'Mon YYYY' (e.g. 'Jan 2024') or the empty string.";

pub const RESUME_PROMPT_TEMPLATE: &str = r#"You are a strict resume parser. Extract structured data from the resume below.

{common_rules}

Return a JSON object with this EXACT schema (no extra fields):
{
  "basics": {"full_name": "", "email": "", "phone": "", "linkedin": ""},
  "summary": "",
  "experience": [
    {
      "company": "",
      "role": "",
      "date_start": "Mon YYYY",
      "date_end": "Mon YYYY or empty if current",
      "is_current": false,
      "bullets": ["verbatim bullet text, 6 to 50 words each"]
    }
  ],
  "education": [
    {"institution": "", "degree": "", "field": "", "date_start": "", "date_end": ""}
  ],
  "skills": {"technical": [], "tools": [], "soft": []},
  "raw_text": ""
}

Additional rules:
- experience entries in reverse-chronological order, current position first
- at most one current position
- no duplicate bullets or skills
- leave raw_text empty; it is filled mechanically

RESUME:
{document_text}"#;

pub const JOB_PROMPT_TEMPLATE: &str = r#"You are a strict job-posting parser. Extract structured data from the posting below.

{common_rules}

Return a JSON object with this EXACT schema (no extra fields):
{
  "title": "",
  "company": "",
  "seniority_level": "one of: internship, entry, junior, mid, senior, lead, staff, principal, director, executive, unknown",
  "min_years_experience": "digits only or empty",
  "salary_min": "digits only or empty",
  "salary_max": "digits only or empty",
  "responsibilities": ["responsibility statements, 6 to 50 words each"],
  "required_skills": ["skills named verbatim in the posting"],
  "keywords": [],
  "keywords_top10": [],
  "raw_text": ""
}

Additional rules:
- no duplicate responsibilities or skills
- salary_min must not exceed salary_max
- leave keywords, keywords_top10, and raw_text empty; they are filled mechanically

JOB POSTING:
{document_text}"#;

pub const PROFILE_PROMPT_TEMPLATE: &str = r#"You are a strict parser for professional-profile exports. Extract structured data from the profile below.

{common_rules}

Return a JSON object with this EXACT schema (no extra fields):
{
  "full_name": "",
  "headline": "",
  "summary": "",
  "positions": [
    {"company": "", "title": "", "date_start": "", "date_end": "", "is_current": false}
  ],
  "skills": [],
  "certifications": [],
  "raw_text": ""
}

Additional rules:
- positions in reverse-chronological order, current position first
- at most one current position
- no duplicate skills or certifications
- leave raw_text empty; it is filled mechanically

PROFILE:
{document_text}"#;

const RETRY_SUFFIX: &str = "\n\nYour previous attempt failed validation with these exact problems:\n{failures}\n\
Fix every listed problem. Do NOT repeat these mistakes. \
Respond again with the full corrected JSON object.";

pub fn build_prompt(kind: DocumentKind, document_text: &str) -> String {
    let template = match kind {
        DocumentKind::Resume => RESUME_PROMPT_TEMPLATE,
        DocumentKind::JobPosting => JOB_PROMPT_TEMPLATE,
        DocumentKind::Profile => PROFILE_PROMPT_TEMPLATE,
    };
    template
        .replace("{common_rules}", COMMON_RULES)
        .replace("{document_text}", document_text)
}

/// Rebuild the prompt for the single retry, appending the literal failure
/// list from the first attempt.
pub fn build_retry_prompt(
    kind: DocumentKind,
    document_text: &str,
    failures: &[FailedCheck],
) -> String {
    let listed = failures
        .iter()
        .map(|f| format!("- {f}"))
        .collect::<Vec<_>>()
        .join("\n");
    let suffix = RETRY_SUFFIX.replace("{failures}", &listed);
    format!("{}{suffix}", build_prompt(kind, document_text))
}
