//! Strict, fact-preserving document structuring.
//!
//! Turns a resume, job posting, or professional-profile export into a
//! schema-conformant JSON record by delegating generation to a failover
//! router over several LLM backends, then mechanically verifying that the
//! record contains no invented facts.

pub mod config;
pub mod errors;
pub mod extract;
pub mod ollama;
pub mod pipeline;
pub mod router;
pub mod strict;

pub use config::Config;
pub use errors::{ExtractError, RouterError};
pub use extract::DocumentInput;
pub use pipeline::Pipeline;
pub use router::{GenerateResult, Generator, ProviderRouter, RouterConfig};
pub use strict::{DocumentKind, FailedCheck, Verdict};
