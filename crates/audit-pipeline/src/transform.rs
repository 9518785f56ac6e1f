// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mapping of workload log records to audit event envelopes.

use chrono::{NaiveDateTime, Timelike};
use serde_json::Value;
use uuid::Uuid;

use crate::error::RecordError;
use crate::parser::LogRecord;

/// Version of the envelope layout written to the sink.
pub const SCHEMA_VERSION: &str = "0.1";

const SOURCE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";
const EVENT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
/// Byte offset of the fractional-seconds separator in `YYYY-MM-DDTHH:MM:SS.f`.
const FRACTION_OFFSET: usize = 19;
const MAX_FRACTION_DIGITS: usize = 6;

/// Normalized audit event built from one log record.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEventEnvelope {
    pub schema_version: &'static str,
    /// `{namespace}-{pod_name}`
    pub actor_type: String,
    pub actor_id: String,
    pub actor_detail_message: String,
    pub event_source: String,
    pub event_name: String,
    pub event_time_utc: String,
    pub event_id: Uuid,
    pub recipient_account_id: String,
    pub raw_record: Value,
}

/// How event identifiers are generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventIdStrategy {
    /// A fresh v4 UUID per envelope. Re-importing an object yields new ids.
    #[default]
    Random,
    /// A v5 UUID over the object key, record position and record content, so re-importing
    /// the same object yields the same ids.
    Deterministic,
}

impl EventIdStrategy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "random" => Some(EventIdStrategy::Random),
            "deterministic" => Some(EventIdStrategy::Deterministic),
            _ => None,
        }
    }
}

/// Reformats `YYYY-MM-DDTHH:MM:SS.ffffffZ` to second precision, keeping the `Z` suffix.
///
/// The fractional part is required and holds 1 to 6 digits. Leap seconds are rejected.
pub fn normalize_timestamp(raw: &str) -> Result<String, RecordError> {
    let invalid = || RecordError::InvalidTimestamp(raw.to_string());

    let fraction = match raw.as_bytes().get(FRACTION_OFFSET..) {
        Some([b'.', rest @ .., b'Z']) => rest,
        _ => return Err(invalid()),
    };
    if !(1..=MAX_FRACTION_DIGITS).contains(&fraction.len())
        || !fraction.iter().all(u8::is_ascii_digit)
    {
        return Err(invalid());
    }

    let parsed =
        NaiveDateTime::parse_from_str(raw, SOURCE_TIME_FORMAT).map_err(|_| invalid())?;
    if parsed.nanosecond() >= 1_000_000_000 {
        return Err(invalid());
    }
    Ok(parsed.format(EVENT_TIME_FORMAT).to_string())
}

/// Builds the envelope for `record` with an already chosen `event_id`.
pub fn to_audit_event(
    record: LogRecord,
    account_id: &str,
    event_id: Uuid,
) -> Result<AuditEventEnvelope, RecordError> {
    let event_time_utc = normalize_timestamp(&record.timestamp)?;
    Ok(AuditEventEnvelope {
        schema_version: SCHEMA_VERSION,
        actor_type: format!("{}-{}", record.namespace, record.pod_name),
        actor_id: record.host_node.clone(),
        actor_detail_message: record.message,
        event_source: record.host_node,
        event_name: record.stream,
        event_time_utc,
        event_id,
        recipient_account_id: account_id.to_string(),
        raw_record: record.raw,
    })
}

#[derive(Debug, Clone)]
pub struct EventTransformer {
    account_id: String,
    id_strategy: EventIdStrategy,
}

impl EventTransformer {
    pub fn new(account_id: impl Into<String>, id_strategy: EventIdStrategy) -> Self {
        Self {
            account_id: account_id.into(),
            id_strategy,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Transforms the record found at `index` in the object stored under `key`.
    pub fn transform(
        &self,
        key: &str,
        index: usize,
        record: LogRecord,
    ) -> Result<AuditEventEnvelope, RecordError> {
        let event_id = self.event_id(key, index, &record);
        to_audit_event(record, &self.account_id, event_id)
    }

    /// Transforms every record of one object, in order. Stops at the first invalid record.
    pub fn transform_all(
        &self,
        key: &str,
        records: Vec<LogRecord>,
    ) -> Result<Vec<AuditEventEnvelope>, RecordError> {
        records
            .into_iter()
            .enumerate()
            .map(|(index, record)| self.transform(key, index, record))
            .collect()
    }

    fn event_id(&self, key: &str, index: usize, record: &LogRecord) -> Uuid {
        match self.id_strategy {
            EventIdStrategy::Random => Uuid::new_v4(),
            EventIdStrategy::Deterministic => {
                let name = format!("{key}#{index}#{}", record.raw);
                Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
            }
        }
    }
}
