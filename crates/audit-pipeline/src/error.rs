// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::time::Duration;

/// Errors raised while resolving configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to fetch parameter {name}: {message}")]
    Fetch { name: String, message: String },
}

/// Errors raised while decoding a single object body or one of its records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("Malformed log format: {0}")]
    MalformedLogFormat(String),

    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),
}

/// Object store operations, used to label store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    List,
    Read,
    Copy,
    Delete,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOperation::List => "list",
            StoreOperation::Read => "read",
            StoreOperation::Copy => "copy",
            StoreOperation::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid object key '{0}'")]
    InvalidKey(String),

    #[error("Object '{0}' not found")]
    NotFound(String),

    #[error("Store {operation} failed for '{key}': {source}")]
    Io {
        operation: StoreOperation,
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Store {operation} failed for '{key}': {message}")]
    Backend {
        operation: StoreOperation,
        key: String,
        message: String,
    },

    #[error("Store {operation} timed out for '{key}' after {after:?}")]
    Timeout {
        operation: StoreOperation,
        key: String,
        after: Duration,
    },
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Timeout { .. } | StoreError::Backend { .. } => true,
            StoreError::Io { source, .. } => !matches!(
                source.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
            ),
            StoreError::InvalidKey(_) | StoreError::NotFound(_) => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to prepare payload: {0}")]
    Payload(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Sink responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Sink rejected {rejected} of {total} events: {detail}")]
    Rejected {
        rejected: usize,
        total: usize,
        detail: String,
    },

    #[error("Unreadable sink acknowledgment: {0}")]
    Response(String),

    #[error("Sink submission timed out after {0:?}")]
    Timeout(Duration),
}

impl SinkError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SinkError::Transport(_) | SinkError::Timeout(_) => true,
            SinkError::Status { status, .. } => *status == 429 || *status >= 500,
            SinkError::Payload(_) | SinkError::Rejected { .. } | SinkError::Response(_) => false,
        }
    }
}

/// Failures surfaced by the import pipeline.
///
/// `ConfigUnavailable` is fatal for a run. Every other variant is scoped to a single source
/// object: the object stays in place and the run moves on to the next key.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration unavailable: {0}")]
    ConfigUnavailable(#[from] ConfigError),

    #[error("Malformed log format in '{key}': {reason}")]
    MalformedLogFormat { key: String, reason: String },

    #[error("Invalid timestamp '{value}' in '{key}'")]
    InvalidTimestamp { key: String, value: String },

    #[error("Sink submission failed for '{key}' on batch {batch} of {batches}: {source}")]
    SinkSubmissionFailed {
        key: String,
        /// 1-based index of the batch that failed.
        batch: usize,
        batches: usize,
        #[source]
        source: SinkError,
    },

    #[error(transparent)]
    StoreOperationFailed(#[from] StoreError),
}

impl PipelineError {
    pub fn from_record(key: &str, err: RecordError) -> Self {
        match err {
            RecordError::MalformedLogFormat(reason) => PipelineError::MalformedLogFormat {
                key: key.to_string(),
                reason,
            },
            RecordError::InvalidTimestamp(value) => PipelineError::InvalidTimestamp {
                key: key.to_string(),
                value,
            },
        }
    }

    /// Short stable label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ConfigUnavailable(_) => "ConfigUnavailable",
            PipelineError::MalformedLogFormat { .. } => "MalformedLogFormat",
            PipelineError::InvalidTimestamp { .. } => "InvalidTimestamp",
            PipelineError::SinkSubmissionFailed { .. } => "SinkSubmissionFailed",
            PipelineError::StoreOperationFailed(_) => "StoreOperationFailed",
        }
    }

    /// Whether re-running the import could succeed without fixing the input.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::ConfigUnavailable(_)
            | PipelineError::MalformedLogFormat { .. }
            | PipelineError::InvalidTimestamp { .. } => false,
            PipelineError::SinkSubmissionFailed { source, .. } => source.is_retryable(),
            PipelineError::StoreOperationFailed(source) => source.is_retryable(),
        }
    }
}
