// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fixed-size chunking of audit events for submission.

use crate::transform::AuditEventEnvelope;

/// Maximum number of events the audit sink accepts in one submission.
pub const MAX_BATCH_ENTRIES: usize = 100;

/// An ordered, non-empty run of at most [`MAX_BATCH_ENTRIES`] envelopes from one object.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch(Vec<AuditEventEnvelope>);

impl Batch {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn envelopes(&self) -> &[AuditEventEnvelope] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AuditEventEnvelope> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<AuditEventEnvelope> {
        self.0
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a AuditEventEnvelope;
    type IntoIter = std::slice::Iter<'a, AuditEventEnvelope>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Batcher {
    max_entries: usize,
}

impl Default for Batcher {
    fn default() -> Self {
        Batcher {
            max_entries: MAX_BATCH_ENTRIES,
        }
    }
}

impl Batcher {
    /// `max_entries` is clamped to `1..=MAX_BATCH_ENTRIES`.
    pub fn new(max_entries: usize) -> Self {
        Batcher {
            max_entries: max_entries.clamp(1, MAX_BATCH_ENTRIES),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Partitions `envelopes` into full batches followed by at most one partial batch.
    pub fn batch(&self, envelopes: Vec<AuditEventEnvelope>) -> Vec<Batch> {
        let mut batches = Vec::with_capacity(envelopes.len().div_ceil(self.max_entries));
        let mut remaining = envelopes.into_iter().peekable();
        while remaining.peek().is_some() {
            batches.push(Batch(remaining.by_ref().take(self.max_entries).collect()));
        }
        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::SCHEMA_VERSION;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn envelopes(count: usize) -> Vec<AuditEventEnvelope> {
        (0..count)
            .map(|i| AuditEventEnvelope {
                schema_version: SCHEMA_VERSION,
                actor_type: "payments-myapp".to_string(),
                actor_id: "node".to_string(),
                actor_detail_message: format!("line {i}"),
                event_source: "node".to_string(),
                event_name: "stdout".to_string(),
                event_time_utc: "2023-05-01T12:00:00Z".to_string(),
                event_id: Uuid::new_v4(),
                recipient_account_id: "123456789012".to_string(),
                raw_record: serde_json::json!({ "seq": i }),
            })
            .collect()
    }

    #[test]
    fn test_batch_sizes_for_250() {
        let batches = Batcher::default().batch(envelopes(250));
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[test]
    fn test_no_envelopes_no_batches() {
        assert!(Batcher::default().batch(Vec::new()).is_empty());
    }

    #[test]
    fn test_exact_multiple_has_no_partial_batch() {
        let sizes: Vec<usize> = Batcher::default()
            .batch(envelopes(200))
            .iter()
            .map(Batch::len)
            .collect();
        assert_eq!(sizes, vec![100, 100]);
    }

    #[test]
    fn test_max_entries_is_clamped() {
        assert_eq!(Batcher::new(0).max_entries(), 1);
        assert_eq!(Batcher::new(500).max_entries(), MAX_BATCH_ENTRIES);
        assert_eq!(Batcher::new(10).max_entries(), 10);
    }

    proptest! {
        #[test]
        fn prop_batches_preserve_order_and_bounds(count in 0usize..450, max in 1usize..=100) {
            let input = envelopes(count);
            let expected: Vec<Uuid> = input.iter().map(|e| e.event_id).collect();

            let batches = Batcher::new(max).batch(input);

            prop_assert_eq!(batches.len(), count.div_ceil(max));
            for (i, batch) in batches.iter().enumerate() {
                prop_assert!(!batch.is_empty());
                prop_assert!(batch.len() <= max);
                if i + 1 < batches.len() {
                    prop_assert_eq!(batch.len(), max);
                }
            }
            let flattened: Vec<Uuid> = batches
                .into_iter()
                .flat_map(Batch::into_inner)
                .map(|e| e.event_id)
                .collect();
            prop_assert_eq!(flattened, expected);
        }
    }
}
