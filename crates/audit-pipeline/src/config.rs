// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::error::ConfigError;
use crate::filter::IdentityFilter;
use crate::params::{ParameterStore, DEFAULT_EXTENSION_ENDPOINT};
use crate::transform::EventIdStrategy;

pub const PARAM_WORKLOAD_FILTERS: &str = "/log-import/workload-filters";
pub const PARAM_LOG_BUCKET_URL: &str = "/log-import/log-bucket-url";
pub const PARAM_AUDIT_CHANNEL_ARN: &str = "/log-import/audit-channel-arn";

const DEFAULT_LIST_PREFIX: &str = "pod-logs";
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_OBJECT_STORE_ROOT: &str = "/mnt/log-import";

/// Where named parameters are resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterSource {
    Env,
    Extension { endpoint: String },
}

/// Process wiring read from the environment at startup.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
    pub parameter_source: ParameterSource,
    /// Session token presented to the parameters extension.
    pub session_token: Option<String>,
    /// Directory holding one subdirectory per bucket.
    pub object_store_root: PathBuf,
    /// Base URL of the audit ingestion endpoint.
    pub sink_endpoint: Option<String>,
    /// Upper bound for every store, sink and parameter call.
    pub call_timeout: Duration,
    pub list_prefix: String,
    pub event_id_strategy: EventIdStrategy,
    pub https_proxy: Option<String>,
    pub account_id: Option<String>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            parameter_source: ParameterSource::Env,
            session_token: None,
            object_store_root: PathBuf::from(DEFAULT_OBJECT_STORE_ROOT),
            sink_endpoint: None,
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            list_prefix: DEFAULT_LIST_PREFIX.to_string(),
            event_id_strategy: EventIdStrategy::Random,
            https_proxy: None,
            account_id: None,
        }
    }
}

impl RuntimeSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let log_level = env::var("LOG_IMPORT_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| "info".to_string());

        let parameter_source = match env::var("LOG_IMPORT_PARAMETER_SOURCE")
            .map(|val| val.to_lowercase())
            .as_deref()
        {
            Err(_) | Ok("env") => ParameterSource::Env,
            Ok("extension") => ParameterSource::Extension {
                endpoint: env::var("LOG_IMPORT_PARAMETER_ENDPOINT")
                    .unwrap_or_else(|_| DEFAULT_EXTENSION_ENDPOINT.to_string()),
            },
            Ok(other) => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown parameter source '{other}'. Must be one of: env, extension"
                )))
            }
        };

        let call_timeout = env::var("LOG_IMPORT_CALL_TIMEOUT_SECS")
            .ok()
            .and_then(|secs| secs.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS));

        let event_id_strategy = match env::var("LOG_IMPORT_EVENT_ID_MODE") {
            Ok(mode) => EventIdStrategy::parse(&mode).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "Unknown event id mode '{mode}'. Must be one of: random, deterministic"
                ))
            })?,
            Err(_) => EventIdStrategy::Random,
        };

        let account_id = match env::var("LOG_IMPORT_ACCOUNT_ID") {
            Ok(id) => Some(id),
            Err(_) => match env::var("LOG_IMPORT_INVOKED_FUNCTION_ARN") {
                Ok(arn) => Some(account_id_from_arn(&arn)?),
                Err(_) => None,
            },
        };

        let settings = Self {
            log_level,
            parameter_source,
            session_token: env::var("AWS_SESSION_TOKEN").ok(),
            object_store_root: env::var("LOG_IMPORT_OBJECT_STORE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_OBJECT_STORE_ROOT)),
            sink_endpoint: env::var("LOG_IMPORT_SINK_ENDPOINT").ok(),
            call_timeout,
            list_prefix: env::var("LOG_IMPORT_LIST_PREFIX")
                .unwrap_or_else(|_| DEFAULT_LIST_PREFIX.to_string()),
            event_id_strategy,
            https_proxy: env::var("HTTPS_PROXY").ok(),
            account_id,
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        if self.call_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "Call timeout must be greater than 0".to_string(),
            ));
        }

        if let Some(account_id) = &self.account_id {
            validate_account_id(account_id)?;
        }

        Ok(())
    }
}

/// Immutable configuration for one import run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub filter: IdentityFilter,
    pub bucket: String,
    /// Sink destination identifier.
    pub channel_arn: String,
    pub account_id: String,
    pub list_prefix: String,
    pub event_id_strategy: EventIdStrategy,
    pub call_timeout: Duration,
}

impl PipelineConfig {
    /// Resolves the remote parameters. Any missing or empty required value is an error.
    pub async fn resolve(
        params: &dyn ParameterStore,
        settings: &RuntimeSettings,
    ) -> Result<Self, ConfigError> {
        let account_id = settings.account_id.clone().ok_or_else(|| {
            ConfigError::Missing(
                "account id (LOG_IMPORT_ACCOUNT_ID or LOG_IMPORT_INVOKED_FUNCTION_ARN)".to_string(),
            )
        })?;

        let filters = fetch(params, PARAM_WORKLOAD_FILTERS, settings.call_timeout).await?;
        let bucket_url = fetch(params, PARAM_LOG_BUCKET_URL, settings.call_timeout).await?;
        let channel_arn = fetch(params, PARAM_AUDIT_CHANNEL_ARN, settings.call_timeout).await?;

        let channel_arn = channel_arn.trim().to_string();
        if channel_arn.is_empty() {
            return Err(ConfigError::Missing(PARAM_AUDIT_CHANNEL_ARN.to_string()));
        }

        let config = PipelineConfig {
            filter: IdentityFilter::from_csv(&filters),
            bucket: bucket_from_url(&bucket_url)?,
            channel_arn,
            account_id,
            list_prefix: settings.list_prefix.clone(),
            event_id_strategy: settings.event_id_strategy,
            call_timeout: settings.call_timeout,
        };
        debug!(
            "CONFIG | Resolved bucket '{}' with {} workload filters",
            config.bucket,
            config.filter.fragments().len()
        );
        Ok(config)
    }
}

async fn fetch(
    params: &dyn ParameterStore,
    name: &str,
    timeout: Duration,
) -> Result<String, ConfigError> {
    match tokio::time::timeout(timeout, params.get_parameter(name)).await {
        Ok(result) => result,
        Err(_) => Err(ConfigError::Fetch {
            name: name.to_string(),
            message: format!("timed out after {timeout:?}"),
        }),
    }
}

/// Extracts the bucket name from a location such as `s3://bucket/optional/path`.
pub fn bucket_from_url(location: &str) -> Result<String, ConfigError> {
    let url = reqwest::Url::parse(location.trim())
        .map_err(|e| ConfigError::Invalid(format!("Invalid bucket location '{location}': {e}")))?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(host.to_string()),
        _ => Err(ConfigError::Invalid(format!(
            "Bucket location '{location}' has no bucket name"
        ))),
    }
}

/// Account id from an ARN such as `arn:aws:lambda:us-east-1:123456789012:function:name`.
pub fn account_id_from_arn(arn: &str) -> Result<String, ConfigError> {
    let parts: Vec<&str> = arn.split(':').collect();
    if parts.len() < 6 || parts[0] != "arn" {
        return Err(ConfigError::Invalid(format!("Invalid ARN '{arn}'")));
    }
    let account_id = parts[4].to_string();
    validate_account_id(&account_id)?;
    Ok(account_id)
}

fn validate_account_id(account_id: &str) -> Result<(), ConfigError> {
    if account_id.len() != 12 || !account_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::Invalid(format!(
            "Invalid account id '{account_id}'. Must be 12 digits"
        )));
    }
    Ok(())
}
