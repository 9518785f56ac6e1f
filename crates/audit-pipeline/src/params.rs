// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Named configuration parameters (`GetConfigValue`).

use async_trait::async_trait;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::debug;

use crate::error::ConfigError;
use crate::http::build_client;

pub const DEFAULT_EXTENSION_ENDPOINT: &str = "http://localhost:2773";
const EXTENSION_TOKEN_HEADER: &str = "X-Aws-Parameters-Secrets-Token";
const ENV_PREFIX: &str = "LOG_IMPORT_";

#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn get_parameter(&self, name: &str) -> Result<String, ConfigError>;
}

/// Resolves parameters from environment variables.
///
/// `/log-import/workload-filters` is read from `LOG_IMPORT_WORKLOAD_FILTERS`: the last path
/// segment, upper-cased, with `-` replaced by `_`.
#[derive(Debug, Clone, Default)]
pub struct EnvParameterStore;

impl EnvParameterStore {
    pub fn env_var_for(name: &str) -> String {
        let leaf = name.rsplit('/').next().unwrap_or(name);
        format!("{ENV_PREFIX}{}", leaf.replace('-', "_").to_uppercase())
    }
}

#[async_trait]
impl ParameterStore for EnvParameterStore {
    async fn get_parameter(&self, name: &str) -> Result<String, ConfigError> {
        let var = Self::env_var_for(name);
        env::var(&var).map_err(|_| ConfigError::Missing(format!("{name} (env {var})")))
    }
}

#[derive(Deserialize)]
struct ParameterResponse {
    #[serde(rename = "Parameter")]
    parameter: ParameterValue,
}

#[derive(Deserialize)]
struct ParameterValue {
    #[serde(rename = "Value")]
    value: String,
}

/// Resolves parameters through the local parameters-and-secrets HTTP extension.
#[derive(Debug, Clone)]
pub struct ExtensionParameterStore {
    client: reqwest::Client,
    endpoint: String,
    session_token: String,
}

impl ExtensionParameterStore {
    pub fn new(endpoint: &str, session_token: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let client = build_client(None, timeout)
            .map_err(|e| ConfigError::Invalid(format!("unable to build HTTP client: {e}")))?;
        Ok(ExtensionParameterStore {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            session_token: session_token.to_string(),
        })
    }
}

#[async_trait]
impl ParameterStore for ExtensionParameterStore {
    async fn get_parameter(&self, name: &str) -> Result<String, ConfigError> {
        let fetch_error = |message: String| ConfigError::Fetch {
            name: name.to_string(),
            message,
        };

        let response = self
            .client
            .get(format!("{}/systemsmanager/parameters/get", self.endpoint))
            .query(&[("name", name), ("withDecryption", "true")])
            .header(EXTENSION_TOKEN_HEADER, &self.session_token)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(fetch_error(format!("status {status}: {body}")));
        }

        let parsed: ParameterResponse = response
            .json()
            .await
            .map_err(|e| fetch_error(format!("unreadable response: {e}")))?;
        debug!("CONFIG | Resolved parameter {name}");
        Ok(parsed.parameter.value)
    }
}
