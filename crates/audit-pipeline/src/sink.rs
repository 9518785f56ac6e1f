// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Submission of audit event batches to the audit event sink.
//!
//! [`AuditSink`] is the raw `PutAuditEvents` capability. [`SinkPublisher`] sits on top of it:
//! it renders a [`Batch`] into sink entries, submits it once and turns per-entry rejections
//! into an error. Nothing here retries; a failed batch is reported to the caller as-is.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::batcher::Batch;
use crate::error::SinkError;
use crate::http::build_client;
use crate::transform::AuditEventEnvelope;

/// One entry of a `PutAuditEvents` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEventEntry {
    pub id: String,
    /// The event payload, serialized as a JSON string.
    #[serde(rename = "eventData")]
    pub event_data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AcceptedEntry {
    pub id: String,
    #[serde(rename = "eventID")]
    pub event_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RejectedEntry {
    pub id: String,
    #[serde(rename = "errorCode")]
    pub error_code: String,
    #[serde(rename = "errorMessage", default)]
    pub error_message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PutAuditEventsResponse {
    #[serde(default)]
    pub successful: Vec<AcceptedEntry>,
    #[serde(default)]
    pub failed: Vec<RejectedEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventData<'a> {
    version: &'a str,
    user_identity: UserIdentity<'a>,
    event_source: &'a str,
    event_name: &'a str,
    event_time: &'a str,
    #[serde(rename = "UID")]
    uid: String,
    recipient_account_id: &'a str,
    additional_event_data: AdditionalEventData<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserIdentity<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    principal_id: &'a str,
    details: ActorDetails<'a>,
}

#[derive(Serialize)]
struct ActorDetails<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct AdditionalEventData<'a> {
    message: &'a Value,
}

impl AuditEventEntry {
    pub fn from_envelope(envelope: &AuditEventEnvelope) -> Result<Self, SinkError> {
        let id = envelope.event_id.to_string();
        let event_data = EventData {
            version: envelope.schema_version,
            user_identity: UserIdentity {
                kind: &envelope.actor_type,
                principal_id: &envelope.actor_id,
                details: ActorDetails {
                    message: &envelope.actor_detail_message,
                },
            },
            event_source: &envelope.event_source,
            event_name: &envelope.event_name,
            event_time: &envelope.event_time_utc,
            uid: id.clone(),
            recipient_account_id: &envelope.recipient_account_id,
            additional_event_data: AdditionalEventData {
                message: &envelope.raw_record,
            },
        };
        let event_data =
            serde_json::to_string(&event_data).map_err(|e| SinkError::Payload(e.to_string()))?;
        Ok(AuditEventEntry { id, event_data })
    }
}

/// The audit event sink (`SubmitAuditBatch`).
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn put_audit_events(
        &self,
        channel_arn: &str,
        events: &[AuditEventEntry],
    ) -> Result<PutAuditEventsResponse, SinkError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PutAuditEventsRequest<'a> {
    audit_events: &'a [AuditEventEntry],
}

/// Sink reached over HTTP at `{endpoint}/PutAuditEvents`.
#[derive(Debug, Clone)]
pub struct HttpAuditSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAuditSink {
    pub fn new(
        endpoint: &str,
        https_proxy: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let client = build_client(https_proxy, timeout)
            .map_err(|e| SinkError::Transport(format!("unable to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: &str) -> Self {
        HttpAuditSink {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    async fn put_audit_events(
        &self,
        channel_arn: &str,
        events: &[AuditEventEntry],
    ) -> Result<PutAuditEventsResponse, SinkError> {
        let url = format!("{}/PutAuditEvents", self.endpoint);
        let time = std::time::Instant::now();
        let response = self
            .client
            .post(&url)
            .query(&[("channelArn", channel_arn)])
            .json(&PutAuditEventsRequest {
                audit_events: events,
            })
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SinkError::Response(e.to_string()))?;
        if !status.is_success() {
            error!("SINK | Request failed with status {status}: {body}");
            return Err(SinkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(
            "SINK | Submitted {} events in {} ms",
            events.len(),
            time.elapsed().as_millis()
        );
        serde_json::from_str(&body).map_err(|e| SinkError::Response(e.to_string()))
    }
}

/// Acknowledgment for one fully accepted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchAck {
    pub accepted: usize,
}

/// Publishes batches to one sink destination.
#[derive(Clone)]
pub struct SinkPublisher {
    sink: Arc<dyn AuditSink>,
    channel_arn: String,
}

impl SinkPublisher {
    pub fn new(sink: Arc<dyn AuditSink>, channel_arn: impl Into<String>) -> Self {
        Self {
            sink,
            channel_arn: channel_arn.into(),
        }
    }

    pub fn channel_arn(&self) -> &str {
        &self.channel_arn
    }

    /// Submits `batch` once. Succeeds only if the sink acknowledged every entry by id.
    pub async fn publish(&self, batch: &Batch) -> Result<BatchAck, SinkError> {
        let entries = batch
            .iter()
            .map(AuditEventEntry::from_envelope)
            .collect::<Result<Vec<_>, _>>()?;

        let response = self
            .sink
            .put_audit_events(&self.channel_arn, &entries)
            .await?;

        if let Some(first) = response.failed.first() {
            return Err(SinkError::Rejected {
                rejected: response.failed.len(),
                total: entries.len(),
                detail: format!(
                    "{}: {} ({})",
                    first.error_code, first.error_message, first.id
                ),
            });
        }

        let acknowledged: HashSet<&str> = response
            .successful
            .iter()
            .map(|accepted| accepted.id.as_str())
            .collect();
        let missing = entries
            .iter()
            .filter(|entry| !acknowledged.contains(entry.id.as_str()))
            .count();
        if missing > 0 {
            return Err(SinkError::Response(format!(
                "{missing} of {} entries were not acknowledged",
                entries.len()
            )));
        }
        Ok(BatchAck {
            accepted: entries.len(),
        })
    }
}

impl std::fmt::Debug for SinkPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkPublisher")
            .field("channel_arn", &self.channel_arn)
            .finish_non_exhaustive()
    }
}
