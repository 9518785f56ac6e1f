// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Imports shipped workload log objects into an audit event sink.
//!
//! Each run lists the log objects of a bucket, keeps those whose key names a configured
//! workload, turns every log record into an audit event envelope and submits the envelopes in
//! batches of at most 100. Objects whose batches were all accepted are copied to
//! `backup_<key>` and removed.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batcher;
pub mod config;
pub mod error;
pub mod filter;
pub mod http;
pub mod params;
pub mod parser;
pub mod pipeline;
pub mod sink;
pub mod store;
pub mod transform;
