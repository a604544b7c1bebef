//! Single HTTP round-trip against the license server.

use super::error::{decode_body, status_error, ApiError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// Per-request options
#[derive(Debug, Clone)]
pub struct RequestOptions {
  pub method: Method,
  pub headers: HeaderMap,
  pub body: Option<Value>,
  /// Overrides the executor's default timeout
  pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
  fn default() -> Self {
    Self::new(Method::GET)
  }
}

impl RequestOptions {
  pub fn new(method: Method) -> Self {
    Self {
      method,
      headers: HeaderMap::new(),
      body: None,
      timeout: None,
    }
  }

  pub fn get() -> Self {
    Self::new(Method::GET)
  }

  pub fn post() -> Self {
    Self::new(Method::POST)
  }

  pub fn put() -> Self {
    Self::new(Method::PUT)
  }

  pub fn delete() -> Self {
    Self::new(Method::DELETE)
  }

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
    self.headers.insert(name, value);
    self
  }
}

/// One attempt at a request, kept only long enough to log its outcome.
#[derive(Debug, Clone)]
pub struct RequestAttempt {
  pub method: Method,
  pub url: String,
  pub attempt_number: u32,
  pub started_at: Instant,
}

impl RequestAttempt {
  pub fn begin(method: &Method, url: &str, attempt_number: u32) -> Self {
    debug!(%method, url, attempt = attempt_number, "sending request");
    Self {
      method: method.clone(),
      url: url.to_string(),
      attempt_number,
      started_at: Instant::now(),
    }
  }

  pub fn finish<T>(&self, result: &Result<T, ApiError>) {
    let elapsed_ms = self.started_at.elapsed().as_millis() as u64;
    match result {
      Ok(_) => debug!(
        method = %self.method,
        url = %self.url,
        attempt = self.attempt_number,
        elapsed_ms,
        "request succeeded"
      ),
      Err(err) => warn!(
        method = %self.method,
        url = %self.url,
        attempt = self.attempt_number,
        elapsed_ms,
        error = %err,
        "request failed"
      ),
    }
  }
}

/// Executes single requests relative to a base URL.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
  client: reqwest::Client,
  base_url: String,
  default_timeout: Duration,
}

impl HttpExecutor {
  pub fn new(base_url: &str, default_timeout: Duration) -> Result<Self, ApiError> {
    let base_url = base_url.trim().trim_end_matches('/').to_string();
    Url::parse(&base_url)?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let client = reqwest::Client::builder()
      .default_headers(headers)
      .user_agent(concat!("licdeck/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(ApiError::Transport)?;

    Ok(Self {
      client,
      base_url,
      default_timeout,
    })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  /// Absolute URL for an endpoint: the base with the endpoint appended verbatim.
  pub fn url_for(&self, endpoint: &str) -> Result<Url, ApiError> {
    let joined = if endpoint.starts_with('/') {
      format!("{}{}", self.base_url, endpoint)
    } else {
      format!("{}/{}", self.base_url, endpoint)
    };
    Ok(Url::parse(&joined)?)
  }

  /// Perform one request and decode its JSON body.
  pub async fn execute(&self, endpoint: &str, options: &RequestOptions) -> Result<Value, ApiError> {
    self.execute_attempt(endpoint, options, 1).await
  }

  /// Same as [`execute`](Self::execute), tagging logs with the attempt number.
  pub async fn execute_attempt(
    &self,
    endpoint: &str,
    options: &RequestOptions,
    attempt_number: u32,
  ) -> Result<Value, ApiError> {
    let url = self.url_for(endpoint)?;
    let attempt = RequestAttempt::begin(&options.method, url.as_str(), attempt_number);
    let result = self.send(url, options).await;
    attempt.finish(&result);
    result
  }

  async fn send(&self, url: Url, options: &RequestOptions) -> Result<Value, ApiError> {
    let timeout = options.timeout.unwrap_or(self.default_timeout);

    let mut request = self
      .client
      .request(options.method.clone(), url)
      .headers(options.headers.clone())
      .timeout(timeout);
    if let Some(body) = &options.body {
      request = request.json(body);
    }

    let response = request
      .send()
      .await
      .map_err(|e| ApiError::from_transport(e, timeout))?;
    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| ApiError::from_transport(e, timeout))?;

    if !status.is_success() {
      return Err(status_error(status.as_u16(), &body));
    }

    decode_body(&body)
  }
}

/// Percent-encode a value for use as a single path segment or query value.
pub fn encode_component(value: &str) -> String {
  url::form_urlencoded::byte_serialize(value.as_bytes())
    .collect::<String>()
    .replace('+', "%20")
}
