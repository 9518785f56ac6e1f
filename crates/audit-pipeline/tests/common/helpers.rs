// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use audit_pipeline::{config::PipelineConfig, filter::IdentityFilter, transform::EventIdStrategy};
use serde_json::{json, Value};
use std::time::Duration;

pub const ACCOUNT_ID: &str = "123456789012";
pub const CHANNEL_ARN: &str = "arn:aws:cloudtrail:us-east-1:123456789012:channel/abc";

/// One shipped log line as written by the log forwarder.
pub fn log_line(index: usize, pod_name: &str) -> String {
    json!({
        "date": format!("2023-05-01T12:{:02}:{:02}.{:06}Z", (index / 60) % 60, index % 60, index),
        "stream": "stdout",
        "log": format!("request {index} handled"),
        "kubernetes": {
            "host": "ip-10-0-1-12.ec2.internal",
            "namespace_name": "payments",
            "pod_name": pod_name,
        }
    })
    .to_string()
}

/// `count` log lines written back to back, the way the forwarder batches them.
pub fn object_body(count: usize, pod_name: &str) -> Vec<u8> {
    (0..count)
        .map(|i| log_line(i, pod_name))
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes()
}

pub fn test_config(fragments: &[&str]) -> PipelineConfig {
    PipelineConfig {
        filter: IdentityFilter::new(fragments.iter().copied()),
        bucket: "eks-pod-logs".to_string(),
        channel_arn: CHANNEL_ARN.to_string(),
        account_id: ACCOUNT_ID.to_string(),
        list_prefix: "pod-logs".to_string(),
        event_id_strategy: EventIdStrategy::Random,
        call_timeout: Duration::from_secs(5),
    }
}

/// Sink response body acknowledging every entry of a `PutAuditEvents` request body.
pub fn acknowledge_all(request_body: &[u8]) -> Vec<u8> {
    let request: Value = serde_json::from_slice(request_body).unwrap();
    let successful: Vec<Value> = request["auditEvents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| json!({"id": entry["id"], "eventID": format!("e-{}", entry["id"])}))
        .collect();
    json!({"successful": successful, "failed": []})
        .to_string()
        .into_bytes()
}
