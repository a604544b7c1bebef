use serde_json::Value;
use std::time::Duration;

/// Longest response body kept inside an error
const MAX_BODY_IN_ERROR: usize = 512;

/// Errors produced while talking to the license server.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  /// The request did not complete within its deadline
  #[error("request timed out after {}s", .0.as_secs())]
  Timeout(Duration),

  /// Connection refused, DNS failure, reset, ...
  #[error("network error: {0}")]
  Transport(#[source] reqwest::Error),

  /// Server answered with a non-2xx status
  #[error("{status}: {message}")]
  Http { status: u16, message: String },

  /// Server answered 2xx but the body was not JSON
  #[error("invalid response body: {source}")]
  InvalidBody {
    #[source]
    source: serde_json::Error,
    body: String,
  },

  /// JSON was valid but did not match the expected record shape
  #[error("unexpected response shape: {0}")]
  Shape(String),

  #[error("invalid URL: {0}")]
  Url(#[from] url::ParseError),
}

impl ApiError {
  /// Whether another attempt could plausibly succeed.
  ///
  /// Transport failures and HTTP status errors are transient from the
  /// client's point of view. A malformed body on a successful status is a
  /// contract mismatch and repeats deterministically.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      ApiError::Timeout(_) | ApiError::Transport(_) | ApiError::Http { .. }
    )
  }

  /// HTTP status for status errors
  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::Http { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub(crate) fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
    if err.is_timeout() {
      ApiError::Timeout(timeout)
    } else {
      ApiError::Transport(err)
    }
  }
}

/// Build the error for a non-2xx response.
///
/// Prefers a `detail` or `message` field from a JSON body, then the raw body,
/// then a bare `HTTP <status>`.
pub fn status_error(status: u16, body: &str) -> ApiError {
  let trimmed = body.trim();
  let message = if trimmed.is_empty() {
    format!("HTTP {}", status)
  } else {
    match serde_json::from_str::<Value>(trimmed) {
      Ok(json) => extract_message(&json).unwrap_or_else(|| format!("HTTP {}", status)),
      Err(_) => clip(trimmed),
    }
  };

  ApiError::Http { status, message }
}

/// Parse a successful response body.
pub fn decode_body(body: &str) -> Result<Value, ApiError> {
  serde_json::from_str(body).map_err(|source| ApiError::InvalidBody {
    source,
    body: clip(body),
  })
}

fn extract_message(json: &Value) -> Option<String> {
  ["detail", "message"]
    .iter()
    .filter_map(|field| json.get(*field))
    .find_map(|value| match value {
      Value::Null => None,
      Value::String(s) if s.is_empty() => None,
      Value::String(s) => Some(s.clone()),
      // Validation errors arrive as a list of objects
      other => Some(other.to_string()),
    })
}

fn clip(body: &str) -> String {
  if body.len() <= MAX_BODY_IN_ERROR {
    return body.to_string();
  }
  let mut end = MAX_BODY_IN_ERROR;
  while !body.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}...", &body[..end])
}
