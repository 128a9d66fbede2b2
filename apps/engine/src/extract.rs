//! Text Extractor — turns a source artifact into normalized plain text.
//!
//! Binary documents prefer a model-assisted recovery call through the
//! router; any failure there degrades silently to the local `pdf-extract`
//! library. Nothing raises past this stage unless both paths fail.

use base64::Engine as _;
use tracing::{debug, warn};

use crate::errors::ExtractError;
use crate::router::Generator;

const PDF_MAGIC: &[u8] = b"%PDF";

/// Prompt for the model-assisted recovery path. The document travels
/// base64-encoded inside the prompt; the model returns the text verbatim.
const RECOVER_TEXT_PROMPT: &str = "The following is a base64-encoded PDF document. \
Transcribe its full text content verbatim, preserving reading order. \
Return ONLY the plain text — no commentary, no markdown.\n\nDOCUMENT:\n{payload}";

/// A document handed to the pipeline: either ready-made text or raw bytes.
#[derive(Debug, Clone)]
pub enum DocumentInput {
    Text(String),
    Bytes(Vec<u8>),
}

/// Collapse whitespace deterministically. Idempotent — the echo invariant
/// (`raw_text` byte-identical to the normalized source) depends on that.
pub fn normalize_text(raw: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut blank_run = 0usize;

    for line in raw.replace("\r\n", "\n").replace('\r', "\n").lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            // At most one blank line survives between paragraphs.
            if blank_run == 1 && !out.is_empty() {
                out.push(String::new());
            }
        } else {
            blank_run = 0;
            out.push(collapsed);
        }
    }

    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Extract and normalize text from a document.
///
/// Plain text passes straight through normalization. PDF bytes try the
/// router first (when one is supplied), then `pdf-extract`. Other byte
/// buffers are accepted only when they decode as UTF-8.
pub async fn extract_text(
    input: &DocumentInput,
    router: Option<&dyn Generator>,
) -> Result<String, ExtractError> {
    match input {
        DocumentInput::Text(text) => Ok(normalize_text(text)),
        DocumentInput::Bytes(bytes) => {
            if bytes.starts_with(PDF_MAGIC) {
                extract_pdf(bytes, router).await
            } else {
                match std::str::from_utf8(bytes) {
                    Ok(text) => Ok(normalize_text(text)),
                    Err(_) => Err(ExtractError::UnrecognizedFormat),
                }
            }
        }
    }
}

async fn extract_pdf(
    bytes: &[u8],
    router: Option<&dyn Generator>,
) -> Result<String, ExtractError> {
    if let Some(router) = router {
        let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
        let prompt = RECOVER_TEXT_PROMPT.replace("{payload}", &payload);
        match router.generate(&prompt, Some(0.0)).await {
            Ok(result) => {
                let text = normalize_text(&result.text);
                if !text.is_empty() {
                    debug!(provider = %result.provider, "Model-assisted extraction succeeded");
                    return Ok(text);
                }
                warn!("Model-assisted extraction returned empty text, falling back");
            }
            Err(e) => {
                warn!("Model-assisted extraction failed ({e}), falling back to pdf-extract");
            }
        }
    }

    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => Ok(normalize_text(&text)),
        Err(e) => Err(ExtractError::Pdf(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RouterError;
    use crate::router::GenerateResult;
    use async_trait::async_trait;

    struct FixedGenerator {
        text: Option<String>,
    }

    #[async_trait]
    impl Generator for FixedGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            _temperature: Option<f32>,
        ) -> Result<GenerateResult, RouterError> {
            match &self.text {
                Some(text) => Ok(GenerateResult {
                    success: true,
                    provider: "openrouter:primary".to_string(),
                    model: "model-a".to_string(),
                    text: text.clone(),
                    elapsed_ms: 5,
                    error: None,
                    is_timeout: false,
                }),
                None => Err(RouterError::Exhausted {
                    last_error: "down".to_string(),
                }),
            }
        }
    }

    #[test]
    fn test_normalize_collapses_runs_of_spaces() {
        assert_eq!(normalize_text("a   b\t\tc"), "a b c");
    }

    #[test]
    fn test_normalize_collapses_blank_lines() {
        assert_eq!(normalize_text("a\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_normalize_strips_carriage_returns() {
        assert_eq!(normalize_text("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_normalize_trims_trailing_blank_lines() {
        assert_eq!(normalize_text("a\n\n  \n"), "a");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_text("  Senior   Engineer\r\n\r\n\r\nRust,  Tokio  ");
        assert_eq!(normalize_text(&once), once);
    }

    #[test]
    fn test_normalize_empty_input() {
        assert_eq!(normalize_text("   \n \n"), "");
    }

    #[tokio::test]
    async fn test_text_input_is_normalized() {
        let input = DocumentInput::Text("hello   world".to_string());
        assert_eq!(extract_text(&input, None).await.unwrap(), "hello world");
    }

    #[tokio::test]
    async fn test_utf8_bytes_pass_through() {
        let input = DocumentInput::Bytes("plain  text".as_bytes().to_vec());
        assert_eq!(extract_text(&input, None).await.unwrap(), "plain text");
    }

    #[tokio::test]
    async fn test_non_utf8_non_pdf_bytes_rejected() {
        let input = DocumentInput::Bytes(vec![0xff, 0xfe, 0x00, 0x01]);
        assert!(matches!(
            extract_text(&input, None).await,
            Err(ExtractError::UnrecognizedFormat)
        ));
    }

    #[tokio::test]
    async fn test_pdf_prefers_model_assisted_path() {
        let gen = FixedGenerator {
            text: Some("Recovered  resume text".to_string()),
        };
        let input = DocumentInput::Bytes(b"%PDF-1.4 garbage".to_vec());
        let text = extract_text(&input, Some(&gen)).await.unwrap();
        assert_eq!(text, "Recovered resume text");
    }

    #[tokio::test]
    async fn test_pdf_falls_back_when_router_exhausted() {
        let gen = FixedGenerator { text: None };
        // Not a real PDF, so the fallback library fails too — the error is
        // the fallback's, proving the router failure did not propagate.
        let input = DocumentInput::Bytes(b"%PDF-1.4 garbage".to_vec());
        assert!(matches!(
            extract_text(&input, Some(&gen)).await,
            Err(ExtractError::Pdf(_))
        ));
    }

    #[tokio::test]
    async fn test_bytes_read_from_disk_round_trip() {
        // Mirrors the CLI flow: callers read a file and hand over the bytes.
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Jane Smith\r\n\r\nSenior  Engineer").unwrap();

        let bytes = std::fs::read(file.path()).unwrap();
        let text = extract_text(&DocumentInput::Bytes(bytes), None)
            .await
            .unwrap();
        assert_eq!(text, "Jane Smith\n\nSenior Engineer");
    }

    #[tokio::test]
    async fn test_pdf_without_router_uses_local_library() {
        let input = DocumentInput::Bytes(b"%PDF-1.4 garbage".to_vec());
        assert!(matches!(
            extract_text(&input, None).await,
            Err(ExtractError::Pdf(_))
        ));
    }
}
