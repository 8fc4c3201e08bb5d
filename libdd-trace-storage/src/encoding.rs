// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Span value encodings.
//!
//! Each stored value is tagged through the engine's user-meta byte:
//! the low nibble carries the encoding, the high nibble is reserved.
//! The encoding is a write-time policy; reads auto-detect from the
//! meta byte, so a store can be reconfigured without rewriting
//! existing data.

use crate::error::{Result, SpanStoreError};
use libdd_trace_model::Span;

/// Mask isolating the encoding nibble of a user-meta byte.
pub const ENCODING_TYPE_BITS: u8 = 0x0F;

/// Supported span value encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Structured text (JSON). Self-describing and grep-friendly.
    Json,
    /// Packed binary (msgpack with named fields). The default.
    Msgpack,
}

impl Encoding {
    /// The user-meta byte written alongside a value.
    pub const fn user_meta(self) -> u8 {
        match self {
            Encoding::Json => 0x01,
            Encoding::Msgpack => 0x02,
        }
    }

    /// Recovers the encoding from a stored user-meta byte.
    pub fn from_user_meta(meta: u8) -> Result<Self> {
        match meta & ENCODING_TYPE_BITS {
            0x01 => Ok(Encoding::Json),
            0x02 => Ok(Encoding::Msgpack),
            other => Err(SpanStoreError::UnknownEncoding(other)),
        }
    }
}

/// Serializes a span under the given encoding.
pub fn encode_span(span: &Span, encoding: Encoding) -> Result<Vec<u8>> {
    match encoding {
        Encoding::Json => {
            serde_json::to_vec(span).map_err(|e| SpanStoreError::Serialize(e.to_string()))
        }
        Encoding::Msgpack => {
            rmp_serde::to_vec_named(span).map_err(|e| SpanStoreError::Serialize(e.to_string()))
        }
    }
}

/// Deserializes a stored value, detecting the encoding from its
/// user-meta byte.
pub fn decode_span(payload: &[u8], user_meta: u8) -> Result<Span> {
    match Encoding::from_user_meta(user_meta)? {
        Encoding::Json => {
            serde_json::from_slice(payload).map_err(|e| SpanStoreError::Deserialize(e.to_string()))
        }
        Encoding::Msgpack => {
            rmp_serde::from_slice(payload).map_err(|e| SpanStoreError::Deserialize(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libdd_trace_model::{KeyValue, Process, SpanId, TraceId};

    fn sample_span() -> Span {
        Span {
            trace_id: TraceId::new(1, 2),
            span_id: SpanId(3),
            operation_name: "op".into(),
            start_time: 1_000,
            duration: 500,
            tags: vec![KeyValue::string("k", "v"), KeyValue::int64("n", 42)],
            process: Process::new("service", vec![]),
            ..Default::default()
        }
    }

    #[test]
    fn round_trips_both_encodings() {
        let span = sample_span();
        for encoding in [Encoding::Json, Encoding::Msgpack] {
            let bytes = encode_span(&span, encoding).unwrap();
            let decoded = decode_span(&bytes, encoding.user_meta()).unwrap();
            assert_eq!(decoded, span);
        }
    }

    #[test]
    fn unknown_encoding_is_reported_with_the_masked_byte() {
        let err = decode_span(b"{}", 0x04).unwrap_err();
        assert_eq!(err.to_string(), "unknown encoding type: 0x04");

        let err = Encoding::from_user_meta(0x00).unwrap_err();
        assert_eq!(err.to_string(), "unknown encoding type: 0x00");
    }

    #[test]
    fn high_nibble_is_ignored() {
        assert_eq!(Encoding::from_user_meta(0x12).unwrap(), Encoding::Msgpack);
        assert_eq!(Encoding::from_user_meta(0xF1).unwrap(), Encoding::Json);
    }

    #[test]
    fn garbage_payload_fails_decode() {
        let garbage = [0x08u8];
        assert!(decode_span(&garbage, Encoding::Json.user_meta()).is_err());
        assert!(decode_span(&garbage, Encoding::Msgpack.user_meta()).is_err());
    }
}
