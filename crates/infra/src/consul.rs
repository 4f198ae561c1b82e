use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::config::AppConfig;

const PORT_KEY: &str = "port";
const ADDRESS_KEY: &str = "address";
const SURREAL_ENDPOINT_KEY: &str = "surreal.endpoint";

#[derive(Debug, Error)]
pub enum ConsulError {
    #[error("consul transport error: {0}")]
    Transport(String),
    #[error("consul returned status {status} for '{key}'")]
    Status { key: String, status: u16 },
    #[error("consul value for '{key}' is invalid: {value}")]
    InvalidValue { key: String, value: String },
}

/// Reads raw values from the Consul KV store under
/// `config/<service>/<environment>/`.
#[derive(Debug, Clone)]
pub struct ConsulKvClient {
    http: reqwest::Client,
    base_url: String,
    prefix: String,
}

impl ConsulKvClient {
    pub fn from_config(config: &AppConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::new(
            http,
            &config.consul_url,
            &config.consul_service_name,
            &config.app_env,
        )
    }

    pub fn new(http: reqwest::Client, base_url: &str, service: &str, environment: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            prefix: format!("config/{service}/{environment}"),
        }
    }

    pub fn key_path(&self, key: &str) -> String {
        format!("{}/{}", self.prefix, key.trim_start_matches('/'))
    }

    /// `Ok(None)` when the key is absent or holds an empty value.
    pub async fn get(&self, key: &str) -> Result<Option<String>, ConsulError> {
        let path = self.key_path(key);
        let url = format!("{}/v1/kv/{path}?raw", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| ConsulError::Transport(err.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let value = response
                    .text()
                    .await
                    .map_err(|err| ConsulError::Transport(err.to_string()))?;
                let value = value.trim();
                Ok((!value.is_empty()).then(|| value.to_string()))
            }
            status => Err(ConsulError::Status {
                key: path,
                status: status.as_u16(),
            }),
        }
    }
}

/// Overrides the listen address, port and store endpoint with whatever Consul
/// holds for them. Keys that are not set keep the locally configured value.
pub async fn apply_overrides(
    config: &mut AppConfig,
    client: &ConsulKvClient,
) -> Result<(), ConsulError> {
    if let Some(port) = client.get(PORT_KEY).await? {
        config.port = port.parse().map_err(|_| ConsulError::InvalidValue {
            key: client.key_path(PORT_KEY),
            value: port.clone(),
        })?;
    }
    if let Some(address) = client.get(ADDRESS_KEY).await? {
        config.bind_address = address;
    }
    if let Some(endpoint) = client.get(SURREAL_ENDPOINT_KEY).await? {
        config.surreal_endpoint = endpoint;
    }
    tracing::info!(
        address = %config.bind_address,
        port = config.port,
        surreal_endpoint = %config.surreal_endpoint,
        "applied consul overrides"
    );
    Ok(())
}
