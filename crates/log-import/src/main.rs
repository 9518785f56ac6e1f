// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use anyhow::anyhow;
use std::env;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use audit_pipeline::{
    config::{ParameterSource, PipelineConfig, RuntimeSettings},
    error::{ConfigError, PipelineError},
    params::{EnvParameterStore, ExtensionParameterStore, ParameterStore},
    pipeline::{InvocationResponse, Pipeline, RunReport},
    sink::HttpAuditSink,
    store::FsObjectStore,
};

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let log_level = env::var("LOG_IMPORT_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    // stdout carries the invocation response only
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter)
                .map_err(|e| anyhow!("could not parse log level in configuration: {e}"))?,
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    debug!("Logging subsystem enabled");

    let result = match RuntimeSettings::from_env() {
        Ok(settings) => run(settings).await,
        Err(e) => Err(PipelineError::ConfigUnavailable(e)),
    };

    let response = InvocationResponse::from_run(&result);
    println!("{}", response.to_json());

    match result {
        Ok(report) => {
            info!("{}", report.summary());
            Ok(())
        }
        Err(e) => {
            error!("Log import failed: {e}");
            Err(anyhow!(response.message))
        }
    }
}

async fn run(settings: RuntimeSettings) -> Result<RunReport, PipelineError> {
    let params = parameter_store(&settings)?;
    let config = Arc::new(PipelineConfig::resolve(params.as_ref(), &settings).await?);

    let sink_endpoint = settings
        .sink_endpoint
        .as_deref()
        .ok_or_else(|| ConfigError::Missing("LOG_IMPORT_SINK_ENDPOINT".to_string()))?;
    let sink = HttpAuditSink::new(
        sink_endpoint,
        settings.https_proxy.as_deref(),
        settings.call_timeout,
    )
    .map_err(|e| ConfigError::Invalid(format!("Unable to build audit sink: {e}")))?;

    let store = FsObjectStore::for_bucket(&settings.object_store_root, &config.bucket);
    debug!(
        "Reading objects of bucket '{}' from {}",
        config.bucket,
        store.root().display()
    );

    Pipeline::new(config, Arc::new(store), Arc::new(sink))
        .run()
        .await
}

fn parameter_store(settings: &RuntimeSettings) -> Result<Box<dyn ParameterStore>, ConfigError> {
    match &settings.parameter_source {
        ParameterSource::Env => Ok(Box::new(EnvParameterStore)),
        ParameterSource::Extension { endpoint } => {
            let token = settings.session_token.as_deref().ok_or_else(|| {
                ConfigError::Missing("AWS_SESSION_TOKEN for the parameters extension".to_string())
            })?;
            Ok(Box::new(ExtensionParameterStore::new(
                endpoint,
                token,
                settings.call_timeout,
            )?))
        }
    }
}
