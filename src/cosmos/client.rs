// Copyright 2022 ComposableFi
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::core::error::Error;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_RPC_URL: &str = "https://cosmos-rpc.publicnode.com";

/// Retry behaviour of [`CosmosClient::fetch_json`].
///
/// Delays grow by `multiplier` from `initial_delay_ms` up to `max_delay_ms`. With
/// `max_attempts = None` the client never gives up.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(1000),
            initial_delay_ms: 3_000,
            max_delay_ms: 60_000,
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.multiplier.max(1)).saturating_pow(attempt.saturating_sub(1));
        let delay = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.max_attempts == Some(0) {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(Error::Config(
                "retry.max_delay_ms must not be lower than retry.initial_delay_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// config options for [`CosmosClient`]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CosmosClientConfig {
    /// Chain name
    pub name: String,
    /// rpc url for cosmos, e.g. `https://cosmos-rpc.publicnode.com`
    pub rpc_url: String,
    /// Per request timeout
    pub request_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for CosmosClientConfig {
    fn default() -> Self {
        Self {
            name: "cosmoshub".to_string(),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            request_timeout_ms: 5_000,
            retry: RetryPolicy::default(),
        }
    }
}

/// Read-only JSON RPC client for a Tendermint based chain.
///
/// Every request goes through [`CosmosClient::fetch_json`], which keeps retrying failed
/// requests according to the configured [`RetryPolicy`].
#[derive(Clone, Debug)]
pub struct CosmosClient {
    /// Chain name
    pub name: String,
    /// Chain rpc base url, always ending with a slash
    pub rpc_url: Url,
    pub retry: RetryPolicy,
    http: reqwest::Client,
}

impl CosmosClient {
    /// Initializes a [`CosmosClient`] given a [`CosmosClientConfig`]
    pub fn new(config: CosmosClientConfig) -> Result<Self, Error> {
        config.retry.validate()?;
        let mut rpc_url = Url::parse(&config.rpc_url)
            .map_err(|e| Error::Config(format!("Invalid rpc url {:?}: {}", config.rpc_url, e)))?;
        if !rpc_url.path().ends_with('/') {
            let path = format!("{}/", rpc_url.path());
            rpc_url.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| Error::RpcError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            name: config.name,
            rpc_url,
            retry: config.retry,
            http,
        })
    }

    /// Url of an rpc endpoint, optionally queried at a height.
    pub fn endpoint(&self, method: &str, height: Option<u64>) -> Result<Url, Error> {
        let mut url = self
            .rpc_url
            .join(method)
            .map_err(|e| Error::Custom(format!("Invalid rpc method {:?}: {}", method, e)))?;
        if let Some(height) = height {
            url.query_pairs_mut()
                .append_pair("height", &height.to_string());
        }
        Ok(url)
    }

    /// Issues a GET request and returns the decoded JSON body.
    ///
    /// Connection failures, timeouts, non-2xx statuses and undecodable bodies are retried with
    /// backoff until the retry policy runs out.
    pub async fn fetch_json(&self, url: Url) -> Result<Value, Error> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let reason = match self.http.get(url.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    match response.json::<Value>().await {
                        Ok(body) => return Ok(body),
                        Err(e) => format!("invalid body: {}", e),
                    }
                }
                Ok(response) => format!("status {}", response.status()),
                Err(e) => e.to_string(),
            };

            if !self.retry.allows_retry(attempt) {
                log::error!(
                    target: "ibc-packet-scan",
                    "❌ Giving up on {} after {} attempts: {}",
                    url,
                    attempt,
                    reason
                );
                return Err(Error::RetriesExhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    reason,
                });
            }
            let delay = self.retry.delay_for(attempt);
            log::warn!(
                target: "ibc-packet-scan",
                "🔁 Failed to fetch {} ({}), retrying in {:?} (attempt {})",
                url,
                reason,
                delay,
                attempt
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: Some(5),
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            multiplier: 3,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(300));
        assert_eq!(policy.delay_for(3), Duration::from_millis(900));
        assert_eq!(policy.delay_for(4), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(60), Duration::from_millis(1_000));
        assert!(policy.allows_retry(4));
        assert!(!policy.allows_retry(5));
    }

    #[test]
    fn unbounded_attempts_never_give_up() {
        let policy = RetryPolicy {
            max_attempts: None,
            multiplier: 1,
            ..RetryPolicy::default()
        };
        assert!(policy.allows_retry(u32::MAX - 1));
        assert_eq!(policy.delay_for(10), Duration::from_secs(3));
    }

    #[test]
    fn invalid_policies_are_rejected() {
        let zero = RetryPolicy {
            max_attempts: Some(0),
            ..RetryPolicy::default()
        };
        assert!(zero.validate().is_err());
        let inverted = RetryPolicy {
            initial_delay_ms: 10,
            max_delay_ms: 5,
            ..RetryPolicy::default()
        };
        assert!(inverted.validate().is_err());
        assert!(RetryPolicy::default().validate().is_ok());
    }

    #[test]
    fn endpoints_keep_the_base_path() {
        let client = CosmosClient::new(CosmosClientConfig {
            rpc_url: "https://example.org/rpc".to_string(),
            ..CosmosClientConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.endpoint("block_results", Some(42)).unwrap().as_str(),
            "https://example.org/rpc/block_results?height=42"
        );
        assert_eq!(
            client.endpoint("status", None).unwrap().as_str(),
            "https://example.org/rpc/status"
        );
    }

    #[test]
    fn invalid_rpc_url_is_a_config_error() {
        let result = CosmosClient::new(CosmosClientConfig {
            rpc_url: "not a url".to_string(),
            ..CosmosClientConfig::default()
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
