// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Typed tag value.
///
/// Spans carry heterogeneous tags; the variant set mirrors the value
/// types accepted by tracing clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TagValue {
    String(String),
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Binary(Vec<u8>),
}

/// A single key/value tag on a span, a process, or a log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: TagValue,
}

impl KeyValue {
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: TagValue::String(value.into()),
        }
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Self {
            key: key.into(),
            value: TagValue::Bool(value),
        }
    }

    pub fn int64(key: impl Into<String>, value: i64) -> Self {
        Self {
            key: key.into(),
            value: TagValue::Int64(value),
        }
    }

    pub fn float64(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value: TagValue::Float64(value),
        }
    }

    pub fn binary(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            value: TagValue::Binary(value),
        }
    }

    /// Byte rendering used by the tag index. Non-string values index
    /// under their canonical string form so that a query for
    /// `{"error": "true"}` matches a boolean tag.
    pub fn value_bytes(&self) -> Vec<u8> {
        match &self.value {
            TagValue::String(s) => s.as_bytes().to_vec(),
            TagValue::Bool(b) => {
                if *b {
                    b"true".to_vec()
                } else {
                    b"false".to_vec()
                }
            }
            TagValue::Int64(i) => i.to_string().into_bytes(),
            TagValue::Float64(f) => f.to_string().into_bytes(),
            TagValue::Binary(b) => b.clone(),
        }
    }
}
