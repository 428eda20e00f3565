//! The pipeline-level error kinds from the orchestrator's failure table.
//! Every variant here is handled by logging and either dropping the event
//! silently or synthesizing a response — callers should not need to match
//! on these beyond deciding which log level to use.

use std::fmt;

#[derive(Debug)]
pub enum PipelineError {
    MalformedEvent(String),
    DecryptFail(String),
    VerifyFail,
    IdentityMismatch,
    OutOfWindow { created_at: i64, oldest: i64, now: i64 },
    Replay(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::MalformedEvent(s) => write!(f, "malformed event: {}", s),
            PipelineError::DecryptFail(s) => write!(f, "decrypt failed: {}", s),
            PipelineError::VerifyFail => write!(f, "seal signature verification failed"),
            PipelineError::IdentityMismatch => write!(f, "inner.pubkey does not match seal.pubkey"),
            PipelineError::OutOfWindow { created_at, oldest, now } => {
                write!(f, "created_at {} outside admission window [{}, {}+600]", created_at, oldest, now)
            }
            PipelineError::Replay(id) => write!(f, "inner id {} already handled", id),
        }
    }
}

impl std::error::Error for PipelineError {}
