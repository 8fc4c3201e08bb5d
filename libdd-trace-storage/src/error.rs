// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy surfaced to transports.
//!
//! Display strings are stable: query transports map each kind onto
//! their native wire errors and existing clients match on the text, so
//! changing a message is a breaking change.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SpanStoreError>;

/// Everything the span store can fail with.
#[derive(Debug, thiserror::Error)]
pub enum SpanStoreError {
    /// A query carried tags or an operation name without a service, or
    /// a write carried a span without a service name.
    #[error("service name must be set")]
    ServiceNameNotSet,

    /// One of the two mandatory time bounds was left unset.
    #[error("start and end time must be set")]
    StartAndEndTimeNotSet,

    /// Reversed time window.
    #[error("min start time is above max")]
    StartTimeMinGreaterThanMax,

    /// Reversed duration window.
    #[error("min duration is above max")]
    DurationMinGreaterThanMax,

    /// Blank query object.
    #[error("malformed request object")]
    MalformedRequest,

    /// No index applies to the query. `FindTraces` falls back to a
    /// bounded time-range scan when it sees this kind.
    #[error("this query parameter is not supported yet")]
    Unsupported,

    /// A stored value's user-meta byte names no known encoding.
    #[error("unknown encoding type: {0:#04x}")]
    UnknownEncoding(u8),

    /// Error from the underlying key/value engine.
    #[error("storage engine error: {0}")]
    Engine(#[from] fjall::Error),

    /// Error from the underlying LSM storage layer surfaced directly by
    /// snapshot reads (which deref into `lsm_tree` rather than `fjall`).
    #[error("storage engine error: {0}")]
    Storage(#[from] lsm_tree::Error),

    /// Span could not be serialized under the configured encoding.
    #[error("span encoding error: {0}")]
    Serialize(String),

    /// Stored bytes could not be decoded back into a span.
    #[error("span decoding error: {0}")]
    Deserialize(String),

    /// The caller's cancellation handle fired mid-operation. Not
    /// retried by the facade.
    #[error("operation cancelled")]
    Cancelled,

    /// Rejected configuration, reported before the store opens.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_strings() {
        assert_eq!(
            SpanStoreError::ServiceNameNotSet.to_string(),
            "service name must be set"
        );
        assert_eq!(
            SpanStoreError::UnknownEncoding(0x04).to_string(),
            "unknown encoding type: 0x04"
        );
        assert_eq!(
            SpanStoreError::Unsupported.to_string(),
            "this query parameter is not supported yet"
        );
        assert_eq!(
            SpanStoreError::MalformedRequest.to_string(),
            "malformed request object"
        );
    }
}
