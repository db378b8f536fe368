//! # Point API Client
//!
//! HTTP client for the point history and ledger services. One instance is built at
//! startup and shared by the idempotency gate and the retry executor, so both calls
//! draw from the same bounded set of request slots.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::error::{ClientError, ClientResult};
use super::pool::ConnectionLimiter;
use crate::config::HttpClientConfig;

#[derive(Clone)]
pub struct PointApiClient {
    client: Client,
    base_url: Url,
    config: HttpClientConfig,
    limiter: ConnectionLimiter,
}

impl std::fmt::Debug for PointApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout_ms", &self.config.timeout_ms)
            .field("max_connections", &self.config.max_connections)
            .field("max_pending_acquires", &self.config.max_pending_acquires)
            .finish()
    }
}

impl PointApiClient {
    /// Build the client; fails only on an invalid base URL or TLS setup
    pub fn new(config: &HttpClientConfig) -> ClientResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::ConfigError(format!("Invalid base URL: {e}")))?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(config.max_connections)
            .default_headers(default_headers)
            .user_agent(format!("point-recovery/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::ConfigError(format!("Failed to create HTTP client: {e}")))?;

        info!(
            base_url = %config.base_url,
            timeout_ms = config.timeout_ms,
            max_connections = config.max_connections,
            max_pending_acquires = config.max_pending_acquires,
            "Created point API client"
        );

        Ok(Self {
            client,
            base_url,
            config: config.clone(),
            limiter: ConnectionLimiter::new(config.max_connections, config.max_pending_acquires),
        })
    }

    pub fn history_path(&self) -> &str {
        &self.config.history_path
    }

    pub fn ledger_path(&self) -> &str {
        &self.config.ledger_path
    }

    /// Append `path` to the base URL, keeping any path prefix on the base
    /// (`http://gw/api` + `/point/use` → `http://gw/api/point/use`)
    pub fn endpoint_url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url
    }

    /// POST a JSON body and decode a JSON answer.
    ///
    /// The configured timeout covers waiting for a request slot as well as the exchange
    /// itself. Non-2xx statuses become [`ClientError::ApiError`]; a 2xx body that does
    /// not decode becomes [`ClientError::InvalidResponse`].
    pub async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> ClientResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint_url(path);

        let exchange = async {
            let _permit = self.limiter.acquire().await?;

            debug!(url = %url, "Sending point API request");
            let response = self.client.post(url.clone()).json(body).send().await?;

            let status = response.status();
            let bytes = response.bytes().await?;

            if !status.is_success() {
                return Err(ClientError::api_error(
                    status.as_u16(),
                    String::from_utf8_lossy(&bytes).into_owned(),
                ));
            }

            serde_json::from_slice::<Resp>(&bytes)
                .map_err(|e| ClientError::invalid_response(path, e.to_string()))
        };

        tokio::time::timeout(self.config.timeout(), exchange)
            .await
            .map_err(|_| ClientError::Timeout {
                operation: format!("POST {path}"),
            })?
    }
}
