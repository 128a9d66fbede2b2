//! Failure classification — not all HTTP failures carry the same meaning.
//!
//! A 402 kills the credential for the rest of the process; a 429 only costs
//! us this attempt; a 404 means the model name is wrong, not the credential.

/// Raw failure data collected from one backend call, before classification.
#[derive(Debug, Clone)]
pub struct CallFailure {
    pub status: Option<u16>,
    pub message: String,
    pub timed_out: bool,
    pub connection_refused: bool,
}

impl CallFailure {
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        CallFailure {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
            timed_out: err.is_timeout(),
            connection_refused: err.is_connect(),
        }
    }
}

/// How a backend failure affects routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Credential is dead for the rest of the process. Skip on every
    /// subsequent call.
    Billing,
    /// Soft — the provider is throttling us. Re-attempted on the next call.
    RateLimit,
    /// The model name was rejected. Move to the next model on the same
    /// credential; the credential itself is fine.
    ModelNotFound,
    /// The request hit its wall-clock ceiling.
    Timeout,
    /// Connection refused, DNS failure, or other transport problem.
    Transport,
    /// Any other non-2xx response.
    Http,
}

const BILLING_PATTERNS: &[&str] = &[
    "billing",
    "payment required",
    "insufficient credits",
    "insufficient_quota",
    "account disabled",
    "payment method",
];

const RATE_LIMIT_PATTERNS: &[&str] = &[
    "rate limit",
    "rate-limited",
    "rate_limit",
    "too many requests",
    "quota exceeded",
    "resource exhausted",
];

/// Classify a raw failure into its routing consequence.
///
/// Status codes win over keyword matches; keyword matches win over the
/// generic buckets. Timeout and transport are only reached when nothing
/// more specific applies.
pub fn classify(failure: &CallFailure) -> FailureKind {
    match failure.status {
        Some(402) => return FailureKind::Billing,
        Some(429) => return FailureKind::RateLimit,
        Some(404) => return FailureKind::ModelNotFound,
        _ => {}
    }

    let lower = failure.message.to_lowercase();
    if BILLING_PATTERNS.iter().any(|p| lower.contains(p)) {
        return FailureKind::Billing;
    }
    if RATE_LIMIT_PATTERNS.iter().any(|p| lower.contains(p)) {
        return FailureKind::RateLimit;
    }
    if lower.contains("not found") || lower.contains("no such model") {
        return FailureKind::ModelNotFound;
    }

    if failure.timed_out {
        return FailureKind::Timeout;
    }
    if failure.connection_refused {
        return FailureKind::Transport;
    }
    FailureKind::Http
}
