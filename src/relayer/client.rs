//! Relayer HTTP client
//!
//! [`RelayerApi`] is the seam the rest of the crate talks to; [`HttpRelayerClient`]
//! is the reqwest implementation against the relayer's REST endpoints.

use super::types::{
    OrderHash, OrderStatus, OrderStatusResponse, Quote, QuoteParams, QuoteResponse, ReadyFill,
    ReadyFillsResponse, SecretSubmission, SubmitOrderRequest, SubmitOrderResponse,
};
use crate::config::RelayerConfig;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::metrics;
use crate::secrets::Secret;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::{debug, warn};
use url::Url;

#[cfg(test)]
use mockall::automock;

/// Relayer endpoints, used for error mapping and metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Quote,
    SubmitOrder,
    OrderStatus,
    ReadyFills,
    SubmitSecret,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Quote => "quote",
            Endpoint::SubmitOrder => "order_submit",
            Endpoint::OrderStatus => "order_status",
            Endpoint::ReadyFills => "ready_fills",
            Endpoint::SubmitSecret => "secret",
        }
    }
}

/// Operations the coordinator needs from the relayer
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RelayerApi: Send + Sync {
    /// `POST /quote`
    async fn get_quote(&self, params: &QuoteParams) -> CoordinatorResult<Quote>;

    /// `POST /order/submit`
    async fn submit_order(&self, request: &SubmitOrderRequest) -> CoordinatorResult<OrderHash>;

    /// `GET /order/status/{orderHash}`
    async fn get_order_status(&self, order_hash: &OrderHash) -> CoordinatorResult<OrderStatus>;

    /// `GET /order/{orderHash}/ready-to-accept-secret-fills`
    async fn get_ready_fills(&self, order_hash: &OrderHash) -> CoordinatorResult<Vec<ReadyFill>>;

    /// `POST /order/{orderHash}/secret`
    async fn submit_secret(
        &self,
        order_hash: &OrderHash,
        idx: usize,
        secret: &Secret,
    ) -> CoordinatorResult<()>;
}

/// reqwest-backed relayer client
pub struct HttpRelayerClient {
    http: Client,
    base_url: Url,
}

impl HttpRelayerClient {
    pub fn new(config: &RelayerConfig) -> CoordinatorResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| CoordinatorError::Config(format!("Invalid relayer API key: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| CoordinatorError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: parse_base_url(&config.base_url)?,
        })
    }

    fn build_url(&self, path: &str) -> CoordinatorResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| CoordinatorError::Internal(format!("Invalid relayer path {}: {}", path, e)))
    }

    async fn send(
        &self,
        endpoint: Endpoint,
        request: reqwest::RequestBuilder,
    ) -> CoordinatorResult<Response> {
        let started = Instant::now();
        let result = request.send().await;
        metrics::record_relayer_latency(endpoint.as_str(), started.elapsed().as_secs_f64());

        let response = result.map_err(|e| transport_error(endpoint, e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            "Relayer {} returned {}: {}",
            endpoint.as_str(),
            status,
            truncate(&body)
        );
        Err(status_error(endpoint, status, &body))
    }

    async fn parse<T: DeserializeOwned>(
        endpoint: Endpoint,
        response: Response,
    ) -> CoordinatorResult<T> {
        let body = response.text().await.map_err(|e| transport_error(endpoint, e))?;
        serde_json::from_str(&body).map_err(|e| {
            let message = format!("malformed {} response: {}", endpoint.as_str(), e);
            match endpoint {
                Endpoint::Quote => CoordinatorError::QuoteUnavailable(message),
                _ => CoordinatorError::RelayerUnavailable(message),
            }
        })
    }
}

#[async_trait]
impl RelayerApi for HttpRelayerClient {
    async fn get_quote(&self, params: &QuoteParams) -> CoordinatorResult<Quote> {
        let url = self.build_url("quote")?;
        debug!(
            "Requesting quote {} -> {} for {}",
            params.src_chain_id, params.dst_chain_id, params.amount
        );

        let response = self
            .send(Endpoint::Quote, self.http.post(url).json(params))
            .await?;
        let response: QuoteResponse = Self::parse(Endpoint::Quote, response).await?;
        response.into_quote(params)
    }

    async fn submit_order(&self, request: &SubmitOrderRequest) -> CoordinatorResult<OrderHash> {
        let url = self.build_url("order/submit")?;
        let response = self
            .send(Endpoint::SubmitOrder, self.http.post(url).json(request))
            .await?;
        let response: SubmitOrderResponse = Self::parse(Endpoint::SubmitOrder, response).await?;

        response
            .order_hash
            .filter(|h| !h.is_empty())
            .map(OrderHash::new)
            .ok_or_else(|| {
                CoordinatorError::RelayerUnavailable(
                    "order submission acknowledged without an order hash".to_string(),
                )
            })
    }

    async fn get_order_status(&self, order_hash: &OrderHash) -> CoordinatorResult<OrderStatus> {
        let url = self.build_url(&format!("order/status/{}", order_hash))?;
        let response = self.send(Endpoint::OrderStatus, self.http.get(url)).await?;
        let response: OrderStatusResponse = Self::parse(Endpoint::OrderStatus, response).await?;
        Ok(response.status)
    }

    async fn get_ready_fills(&self, order_hash: &OrderHash) -> CoordinatorResult<Vec<ReadyFill>> {
        let url = self.build_url(&format!(
            "order/{}/ready-to-accept-secret-fills",
            order_hash
        ))?;
        let response = self.send(Endpoint::ReadyFills, self.http.get(url)).await?;
        let response: ReadyFillsResponse = Self::parse(Endpoint::ReadyFills, response).await?;
        Ok(response.fills)
    }

    async fn submit_secret(
        &self,
        order_hash: &OrderHash,
        idx: usize,
        secret: &Secret,
    ) -> CoordinatorResult<()> {
        let url = self.build_url(&format!("order/{}/secret", order_hash))?;
        let secret_hex = secret.to_hex();
        let body = SecretSubmission {
            idx,
            secret: &secret_hex,
        };

        self.send(Endpoint::SubmitSecret, self.http.post(url).json(&body))
            .await
            .map_err(|e| match e {
                CoordinatorError::OrderRejected { reason } => CoordinatorError::ProtocolViolation {
                    order_hash: order_hash.to_string(),
                    message: format!("relayer rejected secret {}: {}", idx, reason),
                },
                other => other,
            })?;
        Ok(())
    }
}

/// Base URL with a trailing slash so relative joins keep its path
fn parse_base_url(raw: &str) -> CoordinatorResult<Url> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&with_slash)
        .map_err(|e| CoordinatorError::Config(format!("Invalid relayer URL {}: {}", raw, e)))
}

fn transport_error(endpoint: Endpoint, e: reqwest::Error) -> CoordinatorError {
    if e.is_timeout() {
        CoordinatorError::Timeout {
            operation: endpoint.as_str().to_string(),
        }
    } else {
        CoordinatorError::RelayerUnavailable(format!("{}: {}", endpoint.as_str(), e))
    }
}

fn status_error(endpoint: Endpoint, status: StatusCode, body: &str) -> CoordinatorError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return CoordinatorError::RateLimited;
    }
    if status.is_server_error() || !status.is_client_error() {
        return CoordinatorError::RelayerUnavailable(format!(
            "{} returned {}",
            endpoint.as_str(),
            status
        ));
    }

    let reason = error_reason(body).unwrap_or_else(|| status.to_string());
    match endpoint {
        Endpoint::Quote => CoordinatorError::QuoteUnavailable(reason),
        _ => CoordinatorError::OrderRejected { reason },
    }
}

/// Pull a human-readable reason out of a JSON error body
fn error_reason(body: &str) -> Option<String> {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["description", "message", "error"]
                .iter()
                .find_map(|key| value.get(key).and_then(|v| v.as_str()).map(str::to_string))
        });

    from_json.or_else(|| (!body.trim().is_empty()).then(|| truncate(body.trim()).to_string()))
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(256) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
