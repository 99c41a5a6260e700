//! Issues authenticated requests and waits out rate limits.

use crate::config::{ApiConfig, Credentials};
use crate::twitter::error::{ApiError, ApiResult};
use crate::twitter::oauth::{generate_nonce, OAuthSigner, Params};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method};
use std::time::Duration;

const RATE_LIMIT_REMAINING: &str = "x-rate-limit-remaining";
const RATE_LIMIT_RESET: &str = "x-rate-limit-reset";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    None,
    Basic,
    Bearer,
    OAuth1,
}

/// A request as described by the API layer, before authentication.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Full URL, including the query string built from `params`
    pub endpoint: String,
    pub params: Params,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub auth: Auth,
}

/// A request ready for the wire.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: Option<String>,
    pub reset: Option<String>,
}

impl RateLimitInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
        };
        Self {
            remaining: get(RATE_LIMIT_REMAINING),
            reset: get(RATE_LIMIT_RESET),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.as_deref() == Some("0")
    }

    /// Time left until the window resets. A missing, malformed or past reset
    /// time yields zero.
    pub fn wait(&self, now: DateTime<Utc>) -> Duration {
        let reset = match self.reset.as_deref().map(str::parse::<i64>) {
            Some(Ok(reset)) => reset,
            other => {
                log::warn!("Unusable rate limit reset header {:?}, retrying now", other);
                return Duration::ZERO;
            }
        };
        let seconds = reset - now.timestamp();
        if seconds > 0 {
            Duration::from_secs(seconds as u64)
        } else {
            Duration::ZERO
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub rate_limit: RateLimitInfo,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> ApiResult<RawResponse>;
}

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(config.timeout)
                .user_agent(concat!("untweet/", env!("CARGO_PKG_VERSION")))
                .build()?,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> ApiResult<RawResponse> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let rate_limit = RateLimitInfo::from_headers(response.headers());
        let body = response.bytes().await?.to_vec();
        Ok(RawResponse {
            status,
            rate_limit,
            body,
        })
    }
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

pub struct Executor<T, C> {
    credentials: Credentials,
    transport: T,
    clock: C,
    max_rate_limit_waits: Option<u32>,
}

impl Executor<ReqwestTransport, SystemClock> {
    pub fn from_config(credentials: Credentials, config: &ApiConfig) -> ApiResult<Self> {
        Ok(Executor::new(
            credentials,
            ReqwestTransport::new(config)?,
            SystemClock,
            config.max_rate_limit_waits,
        ))
    }
}

impl<T: Transport, C: Clock> Executor<T, C> {
    pub fn new(
        credentials: Credentials,
        transport: T,
        clock: C,
        max_rate_limit_waits: Option<u32>,
    ) -> Self {
        Self {
            credentials,
            transport,
            clock,
            max_rate_limit_waits,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Sends `request`, retrying it each time the response reports an
    /// exhausted quota. Every attempt is signed afresh.
    pub async fn execute(&self, request: &ApiRequest) -> ApiResult<RawResponse> {
        let mut waits = 0;
        loop {
            let prepared = self.prepare(request)?;
            log::debug!("{} {}", prepared.method, prepared.url);
            let response = self.transport.send(prepared).await?;
            if !response.rate_limit.is_exhausted() {
                return Ok(response);
            }
            if let Some(max) = self.max_rate_limit_waits {
                if waits >= max {
                    return Err(ApiError::RateLimited { waits });
                }
            }
            waits += 1;
            let wait = response.rate_limit.wait(self.clock.now());
            log::info!(
                "Hit rate limit, waiting {} to proceed",
                humantime::format_duration(wait)
            );
            self.clock.sleep(wait).await;
        }
    }

    fn prepare(&self, request: &ApiRequest) -> ApiResult<HttpRequest> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ApiError::InvalidHeader(name.clone()))?;
            headers.append(name, header_value(value, "header")?);
        }

        let authorization = match request.auth {
            Auth::None => None,
            Auth::Basic => {
                let pair = format!(
                    "{}:{}",
                    self.credentials.consumer_key, self.credentials.consumer_secret
                );
                Some(format!("Basic {}", BASE64.encode(pair)))
            }
            Auth::Bearer => {
                let token = self
                    .credentials
                    .bearer_token
                    .as_ref()
                    .ok_or(ApiError::MissingBearerToken)?;
                Some(format!("Bearer {token}"))
            }
            Auth::OAuth1 => {
                let nonce = generate_nonce()?;
                let timestamp = self.clock.now().timestamp().to_string();
                let header = OAuthSigner::new(&self.credentials).authorization_header(
                    request.method.as_str(),
                    &request.endpoint,
                    &request.params,
                    &nonce,
                    &timestamp,
                )?;
                Some(header)
            }
        };
        if let Some(authorization) = authorization {
            headers.insert(AUTHORIZATION, header_value(&authorization, "authorization")?);
        }

        Ok(HttpRequest {
            method: request.method.clone(),
            url: request.endpoint.clone(),
            headers,
            body: request.body.clone(),
        })
    }
}

fn header_value(value: &str, name: &str) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| ApiError::InvalidHeader(name.to_string()))
}
