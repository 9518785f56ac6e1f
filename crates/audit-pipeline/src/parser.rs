// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Decoding of log objects written by the cluster log shipper.
//!
//! The shipper appends one JSON document per log line without separators, so an object body
//! looks like `{...}{...}` (usually with a newline in between) rather than a JSON array. The
//! body is turned into an array by inserting a comma at every `}{` boundary and wrapping the
//! result in brackets, then parsed in a single pass.
//!
//! A string value that itself contains `}` followed by `{` gets a comma inserted as well, which
//! either corrupts that value or makes the object fail to parse. Anything that is not valid
//! JSON after the rewrite fails the whole object; there is no partial result.

use serde::Deserialize;
use serde_json::Value;

use crate::error::RecordError;

/// One workload log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// `YYYY-MM-DDTHH:MM:SS.ffffffZ`, validated by the transformer.
    pub timestamp: String,
    pub stream: String,
    pub message: String,
    pub host_node: String,
    pub namespace: String,
    pub pod_name: String,
    /// The document exactly as decoded, extra fields included.
    pub raw: Value,
}

#[derive(Deserialize)]
struct ShippedLine {
    date: String,
    stream: String,
    log: String,
    kubernetes: KubernetesMetadata,
}

#[derive(Deserialize)]
struct KubernetesMetadata {
    host: String,
    namespace_name: String,
    pod_name: String,
}

impl LogRecord {
    pub fn from_document(document: Value) -> Result<Self, RecordError> {
        let line = ShippedLine::deserialize(&document).map_err(|e| {
            RecordError::MalformedLogFormat(format!("unexpected record shape: {e}"))
        })?;
        Ok(LogRecord {
            timestamp: line.date,
            stream: line.stream,
            message: line.log,
            host_node: line.kubernetes.host,
            namespace: line.kubernetes.namespace_name,
            pod_name: line.kubernetes.pod_name,
            raw: document,
        })
    }
}

/// Splits a body of back-to-back JSON objects into its documents, in order.
pub fn split_documents(body: &[u8]) -> Result<Vec<Value>, RecordError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| RecordError::MalformedLogFormat(format!("body is not valid UTF-8: {e}")))?;

    let documents: Vec<Value> = serde_json::from_str(&join_documents(text))
        .map_err(|e| RecordError::MalformedLogFormat(e.to_string()))?;

    if let Some(position) = documents.iter().position(|doc| !doc.is_object()) {
        return Err(RecordError::MalformedLogFormat(format!(
            "document {position} is not a JSON object"
        )));
    }
    Ok(documents)
}

/// Decodes an object body into log records, failing on the first malformed one.
pub fn parse_log_records(body: &[u8]) -> Result<Vec<LogRecord>, RecordError> {
    split_documents(body)?
        .into_iter()
        .map(LogRecord::from_document)
        .collect()
}

/// Rewrites `{..}{..}` into `[{..},{..}]`. Whitespace between `}` and `{` counts as part of
/// the boundary.
fn join_documents(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len() + 2 + text.len() / 64);
    out.push('[');

    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'}' {
            let mut next = i + 1;
            while next < bytes.len() && bytes[next].is_ascii_whitespace() {
                next += 1;
            }
            if next < bytes.len() && bytes[next] == b'{' {
                out.push_str(&text[copied..=i]);
                out.push(',');
                copied = i + 1;
                i = next;
                continue;
            }
        }
        i += 1;
    }

    out.push_str(&text[copied..]);
    out.push(']');
    out
}
