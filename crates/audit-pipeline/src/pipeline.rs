// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-object import lifecycle.
//!
//! ```text
//!   Listed ──> FilteredOut                                   (untouched)
//!     │
//!     v
//!   FilteredIn ──> ParseFailed                               (untouched)
//!     │
//!     v
//!   ParsedOk ──> PublishPartiallyFailed                      (untouched)
//!     │
//!     v
//!   PublishedAll ──> Archived                                (copied to backup_<key>, deleted)
//! ```
//!
//! Objects are processed one at a time in listing order. Batches of one object are submitted
//! in source order and the next batch is only sent once the previous one was acknowledged. The
//! source object is archived only after every batch was accepted, so a failed object stays in
//! place and is listed again by the next run.

use serde_json::json;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::batcher::Batcher;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, SinkError, StoreError, StoreOperation};
use crate::parser::parse_log_records;
use crate::sink::{AuditSink, SinkPublisher};
use crate::store::ObjectStore;
use crate::transform::EventTransformer;

pub const BACKUP_KEY_PREFIX: &str = "backup_";

pub fn backup_key(key: &str) -> String {
    format!("{BACKUP_KEY_PREFIX}{key}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    Listed,
    FilteredIn,
    FilteredOut,
    ParsedOk,
    ParseFailed,
    PublishedAll,
    PublishPartiallyFailed,
    Archived,
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectState::Listed => "listed",
            ObjectState::FilteredIn => "filtered-in",
            ObjectState::FilteredOut => "filtered-out",
            ObjectState::ParsedOk => "parsed-ok",
            ObjectState::ParseFailed => "parse-failed",
            ObjectState::PublishedAll => "published-all",
            ObjectState::PublishPartiallyFailed => "publish-partially-failed",
            ObjectState::Archived => "archived",
        };
        f.write_str(name)
    }
}

/// Terminal outcome of one listed object.
#[derive(Debug)]
pub enum ObjectOutcome {
    /// No workload fragment matched the key.
    Skipped,
    Archived {
        events: usize,
        batches: usize,
    },
    /// Processing stopped in `state`; the object was left in place.
    Failed {
        state: ObjectState,
        error: PipelineError,
    },
}

impl ObjectOutcome {
    pub fn state(&self) -> ObjectState {
        match self {
            ObjectOutcome::Skipped => ObjectState::FilteredOut,
            ObjectOutcome::Archived { .. } => ObjectState::Archived,
            ObjectOutcome::Failed { state, .. } => *state,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<(String, ObjectOutcome)>,
}

impl RunReport {
    pub fn listed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, ObjectOutcome::Skipped))
    }

    pub fn archived(&self) -> usize {
        self.count(|outcome| matches!(outcome, ObjectOutcome::Archived { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, ObjectOutcome::Failed { .. }))
    }

    /// Events of archived objects.
    pub fn events_published(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                ObjectOutcome::Archived { events, .. } => *events,
                _ => 0,
            })
            .sum()
    }

    pub fn outcome(&self, key: &str) -> Option<&ObjectOutcome> {
        self.outcomes
            .iter()
            .find(|(listed, _)| listed == key)
            .map(|(_, outcome)| outcome)
    }

    pub fn summary(&self) -> String {
        format!(
            "Imported {} events from {} objects ({} listed, {} skipped, {} failed)",
            self.events_published(),
            self.archived(),
            self.listed(),
            self.skipped(),
            self.failed()
        )
    }

    fn count(&self, predicate: impl Fn(&ObjectOutcome) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| predicate(outcome))
            .count()
    }
}

/// Result handed back to whatever triggered the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResponse {
    pub status_code: u16,
    pub message: String,
}

impl InvocationResponse {
    /// Per-object failures are reported in the message only; the status reflects whether the
    /// run itself could execute.
    pub fn from_run(result: &Result<RunReport, PipelineError>) -> Self {
        match result {
            Ok(report) => InvocationResponse {
                status_code: 200,
                message: report.summary(),
            },
            Err(err) => InvocationResponse {
                status_code: 500,
                message: format!("{}: {err}", err.kind()),
            },
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "statusCode": self.status_code,
            "body": json!({ "message": self.message }).to_string(),
        })
    }
}

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    store: Arc<dyn ObjectStore>,
    publisher: SinkPublisher,
    transformer: EventTransformer,
    batcher: Batcher,
}

impl Pipeline {
    pub fn new(
        config: Arc<PipelineConfig>,
        store: Arc<dyn ObjectStore>,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        let publisher = SinkPublisher::new(sink, config.channel_arn.clone());
        let transformer =
            EventTransformer::new(config.account_id.clone(), config.event_id_strategy);
        Pipeline {
            config,
            store,
            publisher,
            transformer,
            batcher: Batcher::default(),
        }
    }

    /// Imports every matching object under the configured prefix.
    ///
    /// Fails only when the listing itself fails; per-object failures are recorded in the
    /// report and do not stop the run.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let prefix = self.config.list_prefix.as_str();
        let keys = self
            .store_call(StoreOperation::List, prefix, self.store.list_objects(prefix))
            .await?;
        info!(
            "PIPELINE | Listed {} objects under '{prefix}' in bucket '{}'",
            keys.len(),
            self.config.bucket
        );

        let mut report = RunReport::default();
        for key in keys {
            let outcome = self.process_object(&key).await;
            report.outcomes.push((key, outcome));
        }

        info!("PIPELINE | {}", report.summary());
        Ok(report)
    }

    /// Drives one listed object to a terminal state.
    pub async fn process_object(&self, key: &str) -> ObjectOutcome {
        debug!("PIPELINE | {key}: {}", ObjectState::Listed);

        if key.starts_with(BACKUP_KEY_PREFIX) {
            debug!("PIPELINE | {key}: archived copy, {}", ObjectState::FilteredOut);
            return ObjectOutcome::Skipped;
        }
        match self.config.filter.matching_fragment(key) {
            Some(fragment) => {
                debug!("PIPELINE | {key}: {} on '{fragment}'", ObjectState::FilteredIn);
            }
            None => {
                debug!("PIPELINE | {key}: {}", ObjectState::FilteredOut);
                return ObjectOutcome::Skipped;
            }
        }

        match self.import_object(key).await {
            Ok((events, batches)) => {
                info!(
                    "PIPELINE | {key}: {} after {events} events in {batches} batches",
                    ObjectState::Archived
                );
                ObjectOutcome::Archived { events, batches }
            }
            Err((state, error)) => {
                if error.is_retryable() {
                    warn!("PIPELINE | {key}: {state} ({}): {error}", error.kind());
                } else {
                    error!("PIPELINE | {key}: {state} ({}): {error}", error.kind());
                }
                ObjectOutcome::Failed { state, error }
            }
        }
    }

    async fn import_object(
        &self,
        key: &str,
    ) -> Result<(usize, usize), (ObjectState, PipelineError)> {
        let body = self
            .store_call(StoreOperation::Read, key, self.store.read_object(key))
            .await
            .map_err(|e| (ObjectState::FilteredIn, PipelineError::from(e)))?;

        let records = parse_log_records(&body)
            .map_err(|e| (ObjectState::ParseFailed, PipelineError::from_record(key, e)))?;
        let envelopes = self
            .transformer
            .transform_all(key, records)
            .map_err(|e| (ObjectState::ParseFailed, PipelineError::from_record(key, e)))?;
        let events = envelopes.len();
        debug!("PIPELINE | {key}: {} with {events} records", ObjectState::ParsedOk);

        let batches = self.batcher.batch(envelopes);
        let total = batches.len();
        for (index, batch) in batches.iter().enumerate() {
            let submitted =
                tokio::time::timeout(self.config.call_timeout, self.publisher.publish(batch))
                    .await
                    .unwrap_or_else(|_| Err(SinkError::Timeout(self.config.call_timeout)));
            match submitted {
                Ok(ack) => debug!(
                    "PIPELINE | {key}: batch {}/{total} accepted ({} events)",
                    index + 1,
                    ack.accepted
                ),
                Err(source) => {
                    return Err((
                        ObjectState::PublishPartiallyFailed,
                        PipelineError::SinkSubmissionFailed {
                            key: key.to_string(),
                            batch: index + 1,
                            batches: total,
                            source,
                        },
                    ))
                }
            }
        }
        debug!("PIPELINE | {key}: {}", ObjectState::PublishedAll);

        let backup = backup_key(key);
        self.store_call(StoreOperation::Copy, key, self.store.copy_object(key, &backup))
            .await
            .map_err(|e| (ObjectState::PublishedAll, PipelineError::from(e)))?;
        self.store_call(StoreOperation::Delete, key, self.store.delete_object(key))
            .await
            .map_err(|e| (ObjectState::PublishedAll, PipelineError::from(e)))?;

        Ok((events, total))
    }

    async fn store_call<T>(
        &self,
        operation: StoreOperation,
        key: &str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                operation,
                key: key.to_string(),
                after: self.config.call_timeout,
            }),
        }
    }
}
