//! Typed errors for upstream fetching and pagination.

use thiserror::Error;

type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

/// A single fetch failed at the transport or decode level. Soft misses
/// (records that simply do not exist) are not errors; they are the
/// `NotFound` arm of [`crate::client::FetchOutcome`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: BoxedCause,
    },

    #[error("unreadable response from {url}")]
    Decode {
        url: String,
        #[source]
        source: BoxedCause,
    },
}

impl FetchError {
    pub fn transport(url: impl Into<String>, source: impl Into<BoxedCause>) -> Self {
        FetchError::Transport {
            url: url.into(),
            source: source.into(),
        }
    }

    pub fn decode(url: impl Into<String>, source: impl Into<BoxedCause>) -> Self {
        FetchError::Decode {
            url: url.into(),
            source: source.into(),
        }
    }
}

/// A pagination run failed hard. Handlers map this to `504 Gateway
/// Timeout`; everything softer resolves to a `200` with whatever was
/// accumulated.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("upstream unavailable at index {cursor} after {attempts} attempts")]
    RetriesExhausted {
        cursor: u64,
        attempts: u32,
        #[source]
        source: FetchError,
    },
}
