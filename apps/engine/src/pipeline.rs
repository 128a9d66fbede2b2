//! Pipeline Orchestrator — wires Extractor → Router → Validator, with
//! exactly one feedback-augmented retry.
//!
//! Flow: normalize input → reject degenerate input before any network call →
//! prompt the router → validate → on failure, reissue the prompt with the
//! literal failure list appended → validate again → give up. Router
//! exhaustion degrades to a failure verdict; nothing here panics or
//! propagates an exception to the caller.

use std::sync::Arc;

use tracing::{info, warn};

use crate::extract::{extract_text, DocumentInput};
use crate::router::Generator;
use crate::strict::{self, DocumentKind, FailedCheck, Verdict};

/// Inputs shorter than this (after normalization) cannot be a real document;
/// they fail fast without spending a model call.
pub const MIN_INPUT_CHARS: usize = 40;

const EXTRACTION_TEMPERATURE: f32 = 0.0;

pub struct Pipeline {
    router: Arc<dyn Generator>,
}

impl Pipeline {
    pub fn new(router: Arc<dyn Generator>) -> Self {
        Pipeline { router }
    }

    /// Parse a document into a validated, fact-preserving record.
    pub async fn parse(&self, input: DocumentInput, kind: DocumentKind) -> Verdict {
        let text = match extract_text(&input, Some(self.router.as_ref())).await {
            Ok(text) => text,
            Err(e) => {
                return Verdict::failure(
                    vec![FailedCheck {
                        check: "EXTRACT",
                        message: e.to_string(),
                    }],
                    strict::empty_record(kind),
                    String::new(),
                )
            }
        };
        self.parse_text(text, kind).await
    }

    /// Parse already-extracted text. The text is normalized again here so
    /// callers handing over raw strings get the same echo guarantees.
    pub async fn parse_text(&self, text: String, kind: DocumentKind) -> Verdict {
        let source = crate::extract::normalize_text(&text);

        // Trivially empty submissions succeed with the fixed empty schema —
        // no model call is spent on them.
        if source.is_empty() {
            let mut data = strict::empty_record(kind);
            data["raw_text"] = serde_json::Value::String(String::new());
            return Verdict {
                success: true,
                failed_checks: vec![],
                data,
                raw_text_extract: String::new(),
            };
        }

        if source.chars().count() < MIN_INPUT_CHARS {
            return Verdict::failure(
                vec![FailedCheck {
                    check: "TOO_SHORT",
                    message: format!(
                        "input has fewer than {MIN_INPUT_CHARS} characters after normalization"
                    ),
                }],
                strict::empty_record(kind),
                source,
            );
        }

        // First attempt.
        let prompt = strict::prompts::build_prompt(kind, &source);
        let first = match self
            .router
            .generate(&prompt, Some(EXTRACTION_TEMPERATURE))
            .await
        {
            Ok(result) => result,
            Err(e) => return self.unavailable(kind, source, e.to_string()),
        };
        let first_verdict = strict::validate(kind, &source, &first.text);
        if first_verdict.success {
            info!(?kind, provider = %first.provider, "Parse succeeded on first attempt");
            return first_verdict;
        }

        warn!(
            ?kind,
            failures = first_verdict.failed_checks.len(),
            "First attempt failed validation, retrying with feedback"
        );

        // Second and final attempt, with the failure list fed back.
        let retry_prompt =
            strict::prompts::build_retry_prompt(kind, &source, &first_verdict.failed_checks);
        let second = match self
            .router
            .generate(&retry_prompt, Some(EXTRACTION_TEMPERATURE))
            .await
        {
            Ok(result) => result,
            Err(e) => {
                let mut failed = label_attempt(1, first_verdict.failed_checks);
                failed.push(FailedCheck {
                    check: "LLM_UNAVAILABLE",
                    message: format!("retry attempt could not be made: {e}"),
                });
                return Verdict::failure(failed, first_verdict.data, source);
            }
        };
        let second_verdict = strict::validate(kind, &source, &second.text);
        if second_verdict.success {
            info!(?kind, provider = %second.provider, "Parse succeeded on retry");
            return second_verdict;
        }

        // Both attempts failed: report everything, labeled by attempt.
        let mut failed = label_attempt(1, first_verdict.failed_checks);
        failed.extend(label_attempt(2, second_verdict.failed_checks));
        Verdict::failure(failed, second_verdict.data, source)
    }

    fn unavailable(&self, kind: DocumentKind, source: String, error: String) -> Verdict {
        Verdict::failure(
            vec![FailedCheck {
                check: "LLM_UNAVAILABLE",
                message: error,
            }],
            strict::empty_record(kind),
            source,
        )
    }
}

fn label_attempt(attempt: u32, failed: Vec<FailedCheck>) -> Vec<FailedCheck> {
    failed
        .into_iter()
        .map(|f| FailedCheck {
            check: f.check,
            message: format!("attempt {attempt}: {}", f.message),
        })
        .collect()
}
