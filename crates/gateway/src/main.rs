//! DocChat API Gateway
//!
//! The entry point for all external API requests.
//! Handles:
//! - Conversations (open chat and retrieval-augmented turns)
//! - Document upload and text extraction
//! - Rate limiting
//! - Observability (logging, metrics)

mod handlers;
mod middleware;
mod services;

use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post},
    BoxError, Router,
};
use docchat_common::{
    config::{AppConfig, ObservabilityConfig},
    llm::{create_chat_model, ChatModel},
    metrics,
    repository::{DocumentRepository, InMemoryStore},
};
use docchat_ingestion::DocumentIngestor;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Notify;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use services::{ConversationService, ConversationSettings};

/// Multipart framing allowance on top of the upload limit
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub conversations: Arc<ConversationService>,
    pub ingestor: Arc<DocumentIngestor>,
    pub documents: Arc<dyn DocumentRepository>,
}

impl AppState {
    /// Wire services over a fresh in-memory store
    pub fn new(config: Arc<AppConfig>, model: Arc<dyn ChatModel>) -> Self {
        let store = Arc::new(InMemoryStore::new());

        let conversations = ConversationService::with_store(
            store.clone(),
            model,
            ConversationSettings::from_config(&config),
        );
        let ingestor = DocumentIngestor::new(
            store.clone(),
            config.retrieval.chunk_size,
            config.server.max_upload_bytes,
        );

        Self {
            config,
            conversations: Arc::new(conversations),
            ingestor: Arc::new(ingestor),
            documents: store,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing
    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting DocChat API Gateway v{}",
        docchat_common::VERSION
    );

    config.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;
    let config = Arc::new(config);

    // Initialize metrics
    init_metrics(&config.observability)?;
    metrics::register_metrics();

    let model = create_chat_model(&config.llm).map_err(|e| {
        error!(error = %e, "Failed to configure chat model");
        e
    })?;

    // Create app state
    let state = AppState::new(config.clone(), model);

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    // Signalled once shutdown starts; open connections then get
    // `shutdown_timeout` to drain
    let draining = Arc::new(Notify::new());
    let server = axum::serve(listener, app)
        .with_graceful_shutdown({
            let draining = draining.clone();
            async move {
                shutdown_signal().await;
                draining.notify_one();
            }
        })
        .into_future();

    let shutdown_timeout = config.shutdown_timeout();
    tokio::select! {
        result = server => result?,
        _ = async {
            draining.notified().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            warn!(timeout = ?shutdown_timeout, "Graceful shutdown timed out, dropping open connections");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Install the Prometheus exporter unless disabled with port 0
fn init_metrics(observability: &ObservabilityConfig) -> Result<(), Box<dyn std::error::Error>> {
    if observability.metrics_port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], observability.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("request_duration_seconds".to_string()),
            metrics::LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("model_call_duration_seconds".to_string()),
            metrics::MODEL_CALL_BUCKETS,
        )?
        .install()?;

    info!(port = observability.metrics_port, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|_: BoxError| async {
            StatusCode::REQUEST_TIMEOUT
        }))
        .timeout(state.config.request_timeout());

    let body_limit = DefaultBodyLimit::max(state.config.server.max_upload_bytes + MULTIPART_OVERHEAD_BYTES);

    let mut app = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Conversation endpoints
        .route(
            "/conversations",
            post(handlers::conversations::create_conversation)
                .get(handlers::conversations::list_conversations),
        )
        .route(
            "/conversations/{id}",
            get(handlers::conversations::get_conversation)
                .delete(handlers::conversations::delete_conversation),
        )
        .route("/conversations/{id}/messages", post(handlers::conversations::add_message))
        .route("/conversations/{id}/rag", post(handlers::conversations::add_rag_message))

        // Document endpoints
        .route("/documents/upload", post(handlers::documents::upload_document))
        .route("/documents/{id}", get(handlers::documents::get_document))

        .route_layer(axum::middleware::from_fn(middleware::track_metrics))
        .layer(body_limit);

    let rate_limit = &state.config.rate_limit;
    if rate_limit.enabled {
        let limiter = middleware::create_rate_limiter(rate_limit.requests_per_second, rate_limit.burst);
        let limit = rate_limit.requests_per_second;
        app = app.layer(axum::middleware::from_fn(move |request, next| {
            middleware::rate_limit_middleware(request, next, limiter.clone(), limit)
        }));
    }

    // Compose the app
    app.layer(timeout)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use docchat_common::llm::MockChatModel;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_app(model: MockChatModel) -> Router {
        let mut config = AppConfig::default();
        config.retrieval.chunk_size = 50;
        config.retrieval.top_k = 2;
        create_router(AppState::new(Arc::new(config), Arc::new(model)))
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: Method, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(MockChatModel::default());
        let (status, body) = send(&app, empty_request(Method::GET, "/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], docchat_common::VERSION);
    }

    #[tokio::test]
    async fn test_conversation_lifecycle() {
        let app = test_app(MockChatModel::new("Hi! How can I help?"));

        let (status, created) = send(
            &app,
            json_request(Method::POST, "/conversations", json!({ "first_message": "Hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["reply"], "Hi! How can I help?");
        let id = created["conversation_id"].as_str().unwrap().to_string();

        let (status, reply) = send(
            &app,
            json_request(
                Method::POST,
                &format!("/conversations/{id}/messages"),
                json!({ "content": "Tell me a joke" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(reply["message_id"].is_string());

        let (status, detail) = send(&app, empty_request(Method::GET, &format!("/conversations/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["mode"], "open_chat");
        assert_eq!(detail["messages"].as_array().unwrap().len(), 4);
        assert_eq!(detail["messages"][0]["role"], "user");

        let (status, listed) = send(&app, empty_request(Method::GET, "/conversations")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed[0]["message_count"], 4);

        let (status, _) = send(&app, empty_request(Method::DELETE, &format!("/conversations/{id}"))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, empty_request(Method::DELETE, &format!("/conversations/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "CONVERSATION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_rag_turn_returns_sources() {
        let app = test_app(MockChatModel::new("Paris."));
        let (_, created) = send(
            &app,
            json_request(Method::POST, "/conversations", json!({ "first_message": "Hello" })),
        )
        .await;
        let id = created["conversation_id"].as_str().unwrap().to_string();

        let document = "Paris is the capital city of France. It is known for the Eiffel Tower. \
                        Berlin is the capital of Germany and has a long history.";
        let (status, reply) = send(
            &app,
            json_request(
                Method::POST,
                &format!("/conversations/{id}/rag"),
                json!({ "content": "What is the capital of France?", "document_text": document }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["reply"], "Paris.");
        let sources = reply["sources"].as_array().unwrap();
        assert!(!sources.is_empty() && sources.len() <= 2);
        assert!(sources[0].as_str().unwrap().contains("Paris"));
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_404() {
        let app = test_app(MockChatModel::default());
        let uri = format!("/conversations/{}/messages", uuid::Uuid::new_v4());
        let (status, body) = send(&app, json_request(Method::POST, &uri, json!({ "content": "hi" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "CONVERSATION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let app = test_app(MockChatModel::default());
        let (status, body) = send(
            &app,
            json_request(Method::POST, "/conversations", json!({ "first_message": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_model_failure_returns_prepared_prompt() {
        let app = test_app(MockChatModel::failing("provider down"));
        let (status, body) = send(
            &app,
            json_request(Method::POST, "/conversations", json!({ "first_message": "Hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "MODEL_CALL_FAILED");
        let messages = body["error"]["details"]["messages"].as_array().unwrap();
        assert_eq!(messages.last().unwrap()["content"], "Hello");
    }

    fn upload_request(filename: &str, content: &str) -> Request<Body> {
        let boundary = "docchat-test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             {content}\r\n\
             --{boundary}--\r\n"
        );
        Request::builder()
            .method(Method::POST)
            .uri("/documents/upload")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_format() {
        let app = test_app(MockChatModel::default());
        let (status, body) = send(&app, upload_request("notes.docx", "just text")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_FORMAT");
    }

    #[tokio::test]
    async fn test_upload_plain_text_then_fetch() {
        let app = test_app(MockChatModel::default());
        let (status, summary) = send(
            &app,
            upload_request("notes.txt", "Paris is the capital of France."),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["filename"], "notes.txt");
        assert_eq!(summary["chunk_count"], 1);

        let id = summary["document_id"].as_str().unwrap().to_string();
        let (status, document) =
            send(&app, empty_request(Method::GET, &format!("/documents/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(document["char_count"], 31);
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let app = test_app(MockChatModel::default());
        let boundary = "docchat-test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"comment\"\r\n\r\n\
             no file here\r\n\
             --{boundary}--\r\n"
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/documents/upload")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_slow_model_reports_prompt_before_gateway_timeout() {
        let mut config = AppConfig::default();
        config.server.request_timeout_secs = 1;
        let model = MockChatModel::default().with_delay(std::time::Duration::from_secs(3));
        let app = create_router(AppState::new(Arc::new(config), Arc::new(model)));

        let (status, body) = send(
            &app,
            json_request(Method::POST, "/conversations", json!({ "first_message": "Still there?" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "MODEL_CALL_FAILED");
        let messages = body["error"]["details"]["messages"].as_array().unwrap();
        assert_eq!(messages.last().unwrap()["content"], "Still there?");
    }

    #[tokio::test]
    async fn test_unknown_document_is_404() {
        let app = test_app(MockChatModel::default());
        let uri = format!("/documents/{}", uuid::Uuid::new_v4());
        let (status, body) = send(&app, empty_request(Method::GET, &uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "DOCUMENT_NOT_FOUND");
    }
}
