// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory object store and sink used by the pipeline tests

use async_trait::async_trait;
use audit_pipeline::{
    error::{SinkError, StoreError, StoreOperation},
    sink::{AcceptedEntry, AuditEventEntry, AuditSink, PutAuditEventsResponse, RejectedEntry},
    store::ObjectStore,
};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// A store operation observed by [`MemoryObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List(String),
    Read(String),
    Copy(String, String),
    Delete(String),
}

/// Object store backed by a map, recording every call.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    calls: Mutex<Vec<StoreCall>>,
    failure: Mutex<Option<(StoreOperation, String)>>,
}

#[allow(dead_code)]
impl MemoryObjectStore {
    pub fn with_objects(objects: Vec<(&str, Vec<u8>)>) -> Self {
        let store = MemoryObjectStore::default();
        for (key, body) in objects {
            store.put(key, body);
        }
        store
    }

    pub fn put(&self, key: &str, body: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), body);
    }

    /// Makes `operation` fail for `key`. A `List` failure matches on the prefix.
    pub fn fail_on(&self, operation: StoreOperation, key: &str) {
        *self.failure.lock().unwrap() = Some((operation, key.to_string()));
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Copy and delete calls only.
    pub fn mutations(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, StoreCall::Copy(..) | StoreCall::Delete(_)))
            .collect()
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, operation: StoreOperation, key: &str) -> Result<(), StoreError> {
        match &*self.failure.lock().unwrap() {
            Some((failing, failing_key)) if *failing == operation && failing_key == key => {
                Err(StoreError::Backend {
                    operation,
                    key: key.to_string(),
                    message: "injected failure".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.record(StoreCall::List(prefix.to_string()));
        self.check(StoreOperation::List, prefix)?;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn read_object(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.record(StoreCall::Read(key.to_string()));
        self.check(StoreOperation::Read, key)?;
        self.get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn copy_object(&self, source_key: &str, dest_key: &str) -> Result<(), StoreError> {
        self.record(StoreCall::Copy(source_key.to_string(), dest_key.to_string()));
        self.check(StoreOperation::Copy, source_key)?;
        let body = self
            .get(source_key)
            .ok_or_else(|| StoreError::NotFound(source_key.to_string()))?;
        self.put(dest_key, body);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        self.record(StoreCall::Delete(key.to_string()));
        self.check(StoreOperation::Delete, key)?;
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// How [`RecordingSink`] answers a given call.
#[derive(Debug, Clone)]
pub enum SinkBehavior {
    Accept,
    Unavailable,
    /// Reject the first entry of the batch.
    RejectFirst,
    /// Answer 2xx without acknowledging any entry.
    AcknowledgeNone,
    /// Acknowledge only the first entry of the batch.
    AcknowledgeFirst,
}

/// Sink that records every submitted batch.
pub struct RecordingSink {
    calls: Mutex<Vec<(String, Vec<AuditEventEntry>)>>,
    /// Behavior per call index; calls past the end are accepted.
    script: Vec<SinkBehavior>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn accepting() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn scripted(script: Vec<SinkBehavior>) -> Self {
        RecordingSink {
            calls: Mutex::new(Vec::new()),
            script,
        }
    }

    pub fn batches(&self) -> Vec<Vec<AuditEventEntry>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, entries)| entries.clone())
            .collect()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches().iter().map(Vec::len).collect()
    }

    pub fn channels(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(channel, _)| channel.clone())
            .collect()
    }
}

#[async_trait]
impl AuditSink for RecordingSink {
    async fn put_audit_events(
        &self,
        channel_arn: &str,
        events: &[AuditEventEntry],
    ) -> Result<PutAuditEventsResponse, SinkError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((channel_arn.to_string(), events.to_vec()));
            calls.len() - 1
        };

        let accepted = |entries: &[AuditEventEntry]| {
            entries
                .iter()
                .map(|entry| AcceptedEntry {
                    id: entry.id.clone(),
                    event_id: entry.id.clone(),
                })
                .collect::<Vec<_>>()
        };

        match self.script.get(index).unwrap_or(&SinkBehavior::Accept) {
            SinkBehavior::Accept => Ok(PutAuditEventsResponse {
                successful: accepted(events),
                failed: Vec::new(),
            }),
            SinkBehavior::Unavailable => Err(SinkError::Status {
                status: 503,
                body: "Service Unavailable".to_string(),
            }),
            SinkBehavior::RejectFirst => Ok(PutAuditEventsResponse {
                successful: accepted(&events[1..]),
                failed: vec![RejectedEntry {
                    id: events[0].id.clone(),
                    error_code: "InvalidEventData".to_string(),
                    error_message: "eventData is not valid".to_string(),
                }],
            }),
            SinkBehavior::AcknowledgeNone => Ok(PutAuditEventsResponse::default()),
            SinkBehavior::AcknowledgeFirst => Ok(PutAuditEventsResponse {
                successful: accepted(&events[..1]),
                failed: Vec::new(),
            }),
        }
    }
}
