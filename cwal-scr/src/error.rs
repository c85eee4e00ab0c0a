// ABOUTME: Error type for talking to the SC:R local web API.
// ABOUTME: Cloneable so a single construction failure can be handed to every waiter.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("could not build HTTP client: {0}")]
    Build(String),

    #[error("SC:R web API unreachable at {url}: {message}")]
    Unreachable { url: String, message: String },

    #[error("SC:R web API returned {status} for {url}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("client construction was abandoned before it finished")]
    Abandoned,
}

impl ClientError {
    /// True when the service did not answer at all, as opposed to answering badly.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::Build(_))
    }
}
