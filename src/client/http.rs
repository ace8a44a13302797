//! HTTP request client: base-URL resolution, auth injection, timeouts,
//! retries with exponential backoff, and error classification.

use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::auth::AuthToken;
use crate::config::DataLayerConfig;

use super::error::ApiError;
use super::hooks::{run_after, run_before, RequestContext, RequestHook, ResponseContext};

use color_eyre::{eyre::eyre, Result};

/// Body of an outbound request.
///
/// JSON bodies get `content-type: application/json`; raw bodies carry their
/// own content type (or none), mirroring how form/multipart payloads must not
/// have a JSON content type forced onto them.
#[derive(Debug, Clone)]
pub enum RequestBody {
  Json(serde_json::Value),
  Raw {
    bytes: Vec<u8>,
    content_type: Option<String>,
  },
}

/// Per-call options. Fields left as `None` fall back to the client defaults
/// taken from [`DataLayerConfig`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
  pub method: Method,
  pub headers: Vec<(String, String)>,
  pub body: Option<RequestBody>,
  pub timeout: Option<Duration>,
  pub retries: Option<u32>,
  pub retry_delay: Option<Duration>,
  pub skip_auth_token: bool,
  pub skip_hooks: bool,
}

impl RequestOptions {
  pub fn new(method: Method) -> Self {
    Self {
      method,
      headers: Vec::new(),
      body: None,
      timeout: None,
      retries: None,
      retry_delay: None,
      skip_auth_token: false,
      skip_hooks: false,
    }
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn with_body(mut self, body: RequestBody) -> Self {
    self.body = Some(body);
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
    self.retries = Some(retries);
    self.retry_delay = Some(delay);
    self
  }

  pub fn skip_auth_token(mut self) -> Self {
    self.skip_auth_token = true;
    self
  }

  pub fn skip_hooks(mut self) -> Self {
    self.skip_hooks = true;
    self
  }
}

impl Default for RequestOptions {
  fn default() -> Self {
    Self::new(Method::GET)
  }
}

#[derive(Debug, Clone, Copy)]
struct RequestDefaults {
  timeout: Duration,
  retries: u32,
  retry_delay: Duration,
}

/// HTTP client for the dashboard API.
///
/// Owns timeout/retry policy and credential injection; the fetch coordinator
/// layers its own, independent retry budget on top.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
  token: AuthToken,
  hooks: Arc<Vec<Arc<dyn RequestHook>>>,
  defaults: RequestDefaults,
}

impl ApiClient {
  pub fn new(config: &DataLayerConfig, token: AuthToken) -> Result<Self> {
    let base_url = Url::parse(&config.api.base_url)
      .map_err(|e| eyre!("Invalid base URL {}: {}", config.api.base_url, e))?;

    let http = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      token,
      hooks: Arc::new(Vec::new()),
      defaults: RequestDefaults {
        timeout: Duration::from_millis(config.api.timeout_ms),
        retries: config.api.retries,
        retry_delay: Duration::from_millis(config.api.retry_delay_ms),
      },
    })
  }

  /// Register a lifecycle observer. Hooks run in registration order.
  pub fn with_hook(mut self, hook: Arc<dyn RequestHook>) -> Self {
    Arc::make_mut(&mut self.hooks).push(hook);
    self
  }

  pub fn set_auth_token(&self, token: Option<String>) {
    self.token.set(token);
  }

  pub fn auth_token(&self) -> Option<String> {
    self.token.get()
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Resolve `url` against the base URL unless it is already absolute.
  fn resolve_url(&self, url: &str) -> Result<Url, ApiError> {
    Url::parse(url)
      .or_else(|_| self.base_url.join(url))
      .map_err(|e| ApiError::Parse {
        url: url.to_string(),
        message: format!("invalid url: {e}"),
      })
  }

  /// Issue a request, retrying transport and 5xx failures with exponential
  /// backoff. 4xx responses are terminal and returned after a single attempt.
  pub async fn request(
    &self,
    url: &str,
    opts: RequestOptions,
  ) -> Result<reqwest::Response, ApiError> {
    let resolved = self.resolve_url(url)?;
    let timeout = opts.timeout.unwrap_or(self.defaults.timeout);
    let retries = opts.retries.unwrap_or(self.defaults.retries);
    let retry_delay = opts.retry_delay.unwrap_or(self.defaults.retry_delay);

    if !opts.skip_hooks {
      let ctx = RequestContext {
        method: opts.method.clone(),
        url: resolved.to_string(),
      };
      run_before(&self.hooks, &ctx).await;
    }

    let mut last_error: Option<ApiError> = None;

    for attempt in 0..=retries {
      if attempt > 0 {
        // Exponential backoff: delay * 2^(attempt - 1) after the failed attempt
        let backoff = retry_delay * 2u32.saturating_pow(attempt - 1);
        debug!(url = %resolved, attempt, ?backoff, "retrying request");
        tokio::time::sleep(backoff).await;
      }

      let started = Instant::now();
      let send = self.build_attempt(&resolved, &opts).send();

      let response = match tokio::time::timeout(timeout, send).await {
        Err(_) => {
          last_error = Some(ApiError::Transport {
            url: resolved.to_string(),
            message: format!("timed out after {timeout:?}"),
          });
          continue;
        }
        Ok(Err(err)) => {
          last_error = Some(ApiError::Transport {
            url: resolved.to_string(),
            message: err.to_string(),
          });
          continue;
        }
        Ok(Ok(response)) => response,
      };

      if !opts.skip_hooks {
        let ctx = ResponseContext {
          method: opts.method.clone(),
          url: resolved.to_string(),
          status: response.status().as_u16(),
          attempt,
          elapsed: started.elapsed(),
        };
        run_after(&self.hooks, &ctx).await;
      }

      let status = response.status();
      if status.is_success() {
        return Ok(response);
      }

      // Best-effort body capture for the classified error
      let body = response.text().await.ok().filter(|b| !b.is_empty());
      let error = if status.is_client_error() {
        ApiError::Client {
          status: status.as_u16(),
          url: resolved.to_string(),
          body,
        }
      } else {
        ApiError::Server {
          status: status.as_u16(),
          url: resolved.to_string(),
          body,
        }
      };

      // 4xx is terminal, never retried
      if !error.is_retryable() {
        return Err(error);
      }
      last_error = Some(error);
    }

    Err(last_error.unwrap_or_else(|| ApiError::Transport {
      url: resolved.to_string(),
      message: "no attempts were made".to_string(),
    }))
  }

  fn build_attempt(&self, url: &Url, opts: &RequestOptions) -> reqwest::RequestBuilder {
    let mut builder = self.http.request(opts.method.clone(), url.clone());

    match &opts.body {
      Some(RequestBody::Json(value)) => {
        builder = builder.json(value);
      }
      Some(RequestBody::Raw {
        bytes,
        content_type,
      }) => {
        builder = builder.body(bytes.clone());
        if let Some(ct) = content_type {
          builder = builder.header(CONTENT_TYPE, ct);
        }
      }
      None => {}
    }

    if !opts.skip_auth_token {
      if let Some(token) = self.token.get() {
        builder = builder.bearer_auth(token);
      }
    }

    for (name, value) in &opts.headers {
      builder = builder.header(name, value);
    }

    builder
  }

  pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
    self.send_json(Method::GET, path, None::<&()>).await
  }

  pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
    &self,
    path: &str,
    body: &B,
  ) -> Result<T, ApiError> {
    self.send_json(Method::POST, path, Some(body)).await
  }

  pub async fn put_json<T: DeserializeOwned, B: Serialize + ?Sized>(
    &self,
    path: &str,
    body: &B,
  ) -> Result<T, ApiError> {
    self.send_json(Method::PUT, path, Some(body)).await
  }

  pub async fn patch_json<T: DeserializeOwned, B: Serialize + ?Sized>(
    &self,
    path: &str,
    body: &B,
  ) -> Result<T, ApiError> {
    self.send_json(Method::PATCH, path, Some(body)).await
  }

  pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
    self.send_json(Method::DELETE, path, None::<&()>).await
  }

  /// Shared JSON convenience path: serialize the body, require a JSON
  /// response content type, and decode.
  async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
    &self,
    method: Method,
    path: &str,
    body: Option<&B>,
  ) -> Result<T, ApiError> {
    let mut opts = RequestOptions::new(method);
    if let Some(body) = body {
      let value = serde_json::to_value(body).map_err(|e| ApiError::Parse {
        url: path.to_string(),
        message: format!("unserializable request body: {e}"),
      })?;
      opts.body = Some(RequestBody::Json(value));
    }

    let response = self.request(path, opts).await?;
    let url = response.url().to_string();

    let content_type = response
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .unwrap_or("")
      .to_string();
    if !content_type.contains("application/json") {
      return Err(ApiError::Parse {
        url,
        message: format!("expected JSON response, got content-type {content_type:?}"),
      });
    }

    response
      .json::<T>()
      .await
      .map_err(|e| ApiError::Parse {
        url,
        message: e.to_string(),
      })
  }
}

impl std::fmt::Debug for ApiClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ApiClient")
      .field("base_url", &self.base_url.as_str())
      .field("hooks", &self.hooks.len())
      .finish_non_exhaustive()
  }
}
