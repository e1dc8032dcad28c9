//! Assistant endpoint payloads.

use serde::Deserialize;

/// Outcome of an assistant request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantReply {
    /// The assistant answered.
    Answer(String),
    /// The client timeout expired first; the request was cancelled.
    TimedOut,
}

impl AssistantReply {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssistantResponse {
    #[serde(default)]
    pub ai_response: String,
}
