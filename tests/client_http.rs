//! Request client tests against a live local server.

use async_trait::async_trait;
use axum::extract::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use color_eyre::eyre::eyre;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashfetch::client::{RequestContext, RequestHook, ResponseContext};
use dashfetch::config::{ApiConfig, CacheConfig, DataLayerConfig};
use dashfetch::{ApiClient, ApiError, AuthToken, RequestOptions};

async fn serve(app: Router) -> SocketAddr {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .try_init();
  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    axum::serve(listener, app).await.unwrap();
  });
  addr
}

fn client_for(addr: SocketAddr) -> ApiClient {
  client_with(addr, 2, 20)
}

fn client_with(addr: SocketAddr, retries: u32, retry_delay_ms: u64) -> ApiClient {
  let config = DataLayerConfig {
    api: ApiConfig {
      base_url: format!("http://{addr}/"),
      timeout_ms: 2_000,
      retries,
      retry_delay_ms,
    },
    cache: CacheConfig::default(),
  };
  ApiClient::new(&config, AuthToken::default()).unwrap()
}

#[tokio::test]
async fn server_error_is_retried_then_succeeds() {
  let hits = Arc::new(AtomicUsize::new(0));
  let state = hits.clone();
  let app = Router::new().route(
    "/flaky",
    get(move || {
      let state = state.clone();
      async move {
        if state.fetch_add(1, Ordering::SeqCst) == 0 {
          (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"})))
        } else {
          (StatusCode::OK, Json(json!({"ok": true})))
        }
      }
    }),
  );
  let client = client_for(serve(app).await);

  let started = Instant::now();
  let value: Value = client.get_json("flaky").await.unwrap();

  assert_eq!(value["ok"], true);
  assert_eq!(hits.load(Ordering::SeqCst), 2);
  // One backoff of retry_delay * 2^0 between the two attempts
  assert!(started.elapsed() >= Duration::from_millis(20));
}

#[tokio::test]
async fn client_error_is_terminal_after_one_attempt() {
  let hits = Arc::new(AtomicUsize::new(0));
  let state = hits.clone();
  let app = Router::new().route(
    "/missing",
    get(move || {
      let state = state.clone();
      async move {
        state.fetch_add(1, Ordering::SeqCst);
        (StatusCode::NOT_FOUND, "no such widget")
      }
    }),
  );
  let client = client_for(serve(app).await);

  let err = client
    .request("missing", RequestOptions::default())
    .await
    .unwrap_err();

  match err {
    ApiError::Client { status, body, .. } => {
      assert_eq!(status, 404);
      assert_eq!(body.as_deref(), Some("no such widget"));
    }
    other => panic!("expected client error, got {other:?}"),
  }
  assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn backoff_is_exponential_across_attempts() {
  let hits = Arc::new(AtomicUsize::new(0));
  let state = hits.clone();
  let app = Router::new().route(
    "/down",
    get(move || {
      let state = state.clone();
      async move {
        state.fetch_add(1, Ordering::SeqCst);
        StatusCode::SERVICE_UNAVAILABLE
      }
    }),
  );
  let client = client_with(serve(app).await, 2, 50);

  let started = Instant::now();
  let err = client
    .request("down", RequestOptions::default())
    .await
    .unwrap_err();

  assert!(matches!(err, ApiError::Server { status: 503, .. }));
  assert_eq!(hits.load(Ordering::SeqCst), 3);
  // Backoffs of 50ms and 100ms between the three attempts
  assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn bearer_token_is_injected_unless_skipped() {
  let app = Router::new().route(
    "/whoami",
    get(|headers: HeaderMap| async move {
      let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
      Json(json!({ "auth": auth }))
    }),
  );
  let client = client_for(serve(app).await);
  client.set_auth_token(Some("sekrit".to_string()));

  let value: Value = client.get_json("whoami").await.unwrap();
  assert_eq!(value["auth"], "Bearer sekrit");

  let response = client
    .request("whoami", RequestOptions::default().skip_auth_token())
    .await
    .unwrap();
  let value: Value = response.json().await.unwrap();
  assert_eq!(value["auth"], Value::Null);
}

#[tokio::test]
async fn non_json_response_is_a_parse_error() {
  let app = Router::new().route("/text", get(|| async { "just text" }));
  let client = client_for(serve(app).await);

  let err = client.get_json::<Value>("text").await.unwrap_err();
  assert!(matches!(err, ApiError::Parse { .. }));
}

#[tokio::test]
async fn timeout_classifies_as_transport() {
  let app = Router::new().route(
    "/slow",
    get(|| async {
      tokio::time::sleep(Duration::from_millis(500)).await;
      Json(json!({"ok": true}))
    }),
  );
  let client = client_for(serve(app).await);

  let opts = RequestOptions::default()
    .with_timeout(Duration::from_millis(50))
    .with_retries(0, Duration::from_millis(10));
  let err = client.request("slow", opts).await.unwrap_err();

  assert!(matches!(err, ApiError::Transport { .. }));
  assert!(err.is_retryable());
}

#[tokio::test]
async fn post_json_round_trips_through_the_convenience_layer() {
  let app = Router::new().route("/echo", post(|Json(value): Json<Value>| async move { Json(value) }));
  let client = client_for(serve(app).await);

  let value: Value = client.post_json("echo", &json!({"a": 1})).await.unwrap();
  assert_eq!(value["a"], 1);
}

struct Observing {
  before: AtomicUsize,
  after: AtomicUsize,
}

#[async_trait]
impl RequestHook for Observing {
  async fn before_request(&self, _ctx: &RequestContext) -> color_eyre::Result<()> {
    self.before.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }

  async fn after_response(&self, ctx: &ResponseContext) -> color_eyre::Result<()> {
    assert!(ctx.status > 0);
    self.after.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}

struct Broken;

#[async_trait]
impl RequestHook for Broken {
  async fn before_request(&self, _ctx: &RequestContext) -> color_eyre::Result<()> {
    Err(eyre!("observer exploded"))
  }
}

#[tokio::test]
async fn hooks_observe_without_affecting_the_request() {
  let app = Router::new().route("/ok", get(|| async { Json(json!({"ok": true})) }));
  let observer = Arc::new(Observing {
    before: AtomicUsize::new(0),
    after: AtomicUsize::new(0),
  });
  let client = client_for(serve(app).await)
    .with_hook(Arc::new(Broken))
    .with_hook(observer.clone());

  let value: Value = client.get_json("ok").await.unwrap();
  assert_eq!(value["ok"], true);

  // The broken hook was isolated; the observing one saw both phases
  assert_eq!(observer.before.load(Ordering::SeqCst), 1);
  assert_eq!(observer.after.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn after_response_hook_skipped_on_transport_failure() {
  // Bind then drop a listener so the port refuses connections
  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  drop(listener);

  let observer = Arc::new(Observing {
    before: AtomicUsize::new(0),
    after: AtomicUsize::new(0),
  });
  let client = client_with(addr, 0, 10).with_hook(observer.clone());

  let err = client
    .request("anything", RequestOptions::default())
    .await
    .unwrap_err();

  assert!(matches!(err, ApiError::Transport { .. }));
  assert_eq!(observer.before.load(Ordering::SeqCst), 1);
  assert_eq!(observer.after.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn skip_hooks_suppresses_observers() {
  let app = Router::new().route("/ok", get(|| async { Json(json!({"ok": true})) }));
  let observer = Arc::new(Observing {
    before: AtomicUsize::new(0),
    after: AtomicUsize::new(0),
  });
  let client = client_for(serve(app).await).with_hook(observer.clone());

  let response = client
    .request("ok", RequestOptions::default().skip_hooks())
    .await
    .unwrap();
  assert!(response.status().is_success());

  assert_eq!(observer.before.load(Ordering::SeqCst), 0);
  assert_eq!(observer.after.load(Ordering::SeqCst), 0);
}
