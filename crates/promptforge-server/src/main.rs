//! Promptforge HTTP API Server
//!
//! REST endpoints for rendering prompt templates, managing their versions,
//! and running admin maintenance against the promptforge registry.

use axum::{Json, Router, extract::State, http::HeaderValue, routing::get};
use promptforge_registry::{
    AdminOps, MemoryCache, MemoryStore, PromptCache, PromptService, TemplateStore,
};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

mod config;
mod error;
mod models;
mod routes;

use config::ServerConfig;
use error::Result;

/// Main application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PromptService>,
    pub admin: Arc<AdminOps>,
    pub config: ServerConfig,
}

impl AppState {
    async fn from_config(config: ServerConfig) -> Result<Self> {
        let store: Arc<dyn TemplateStore> = match &config.database_url {
            Some(url) => Arc::new(promptforge_registry::SqliteStore::new(url).await?),
            None => Arc::new(MemoryStore::new()),
        };

        let cache = Arc::new(PromptCache::new(
            Arc::new(MemoryCache::new()),
            Duration::from_secs(config.cache_ttl_seconds),
        ));
        let service = Arc::new(
            PromptService::new(store, cache)
                .with_store_timeout(Duration::from_millis(config.store_timeout_ms)),
        );
        let admin = Arc::new(AdminOps::new(Arc::clone(&service)));

        Ok(AppState {
            service,
            admin,
            config,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let config = ServerConfig::from_env()?;

    // Initialize tracing; RUST_LOG wins over the DEBUG shorthand
    let default_filter = if config.debug {
        "promptforge_server=trace,tower_http=trace"
    } else {
        "promptforge_server=debug,tower_http=debug"
    };
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string()))
        .init();

    info!(
        "Starting Promptforge Server on {}:{}",
        config.host, config.port
    );

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::from_config(config).await?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // API routes
        .nest("/api", api_routes())
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// CORS policy from configuration. `*` anywhere in the list means permissive.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// API routes
fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/render", routes::render::router())
        .nest("/templates", routes::templates::router())
        .nest("/admin", routes::admin::router())
}

/// Health check endpoint. Cache-backend trouble is reported as a degraded
/// signal, never as a hard failure of the service.
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let cache = if state.service.cache().is_degraded() {
        "degraded"
    } else {
        "ok"
    };

    Json(json!({
        "status": "healthy",
        "service": "promptforge-server",
        "version": env!("CARGO_PKG_VERSION"),
        "cache": cache,
        "timestamp": time::OffsetDateTime::now_utc()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn test_router() -> Router {
        let state = AppState::from_config(ServerConfig::default()).await.unwrap();
        create_router(state)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn create_promote_render_flow() {
        let app = test_router().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/templates/greeting/versions",
                json!({"source": "Hello {{name}}!", "display_name": "Greeting"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        let version_id = created["version_id"].as_str().unwrap().to_string();
        assert_eq!(created["sequence_number"], 1);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/templates/greeting/promote",
                json!({"version_id": version_id}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/render",
                json!({"template_key": "greeting", "bindings": {"name": "World"}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let rendered = body_json(response).await;
        assert_eq!(rendered["text"], "Hello World!");
        assert_eq!(rendered["version_id"].as_str().unwrap(), version_id);
    }

    #[tokio::test]
    async fn render_unknown_template_is_not_found() {
        let app = test_router().await;

        let response = app
            .oneshot(post_json("/api/render", json!({"template_key": "nope"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "not_found");
        assert_eq!(body["retryable"], false);
    }

    #[tokio::test]
    async fn malformed_source_reports_offset() {
        let app = test_router().await;

        let response = app
            .oneshot(post_json(
                "/api/templates/broken/versions",
                json!({"source": "text {{#if x}}never closed"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "invalid_input");
        assert_eq!(body["offset"], 5);
    }

    #[tokio::test]
    async fn missing_binding_is_unprocessable() {
        let app = test_router().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/templates/greeting/versions",
                json!({"source": "Hi {{name}}"}),
            ))
            .await
            .unwrap();
        let version_id = body_json(response).await["version_id"]
            .as_str()
            .unwrap()
            .to_string();
        app.clone()
            .oneshot(post_json(
                "/api/templates/greeting/promote",
                json!({"version_id": version_id}),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(post_json("/api/render", json!({"template_key": "greeting"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "invalid_input");
    }

    #[tokio::test]
    async fn force_update_and_repair_endpoints() {
        let app = test_router().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/admin/force-update",
                json!({"templates": [
                    {"key": "system", "display_name": "System", "source": "be helpful"}
                ]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["updated_count"], 1);

        let response = app
            .clone()
            .oneshot(post_json("/api/admin/repair", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["repaired_count"], 0);

        let response = app
            .oneshot(post_json(
                "/api/render",
                json!({"template_key": "system"}),
            ))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["text"], "be helpful");
    }

    #[tokio::test]
    async fn cors_honors_configured_origins() {
        let config = ServerConfig {
            cors_origins: vec!["https://example.com".to_string()],
            ..ServerConfig::default()
        };
        let state = AppState::from_config(config).await.unwrap();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "https://example.com"
        );

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://elsewhere.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }

    #[tokio::test]
    async fn health_reports_cache_state() {
        let app = test_router().await;

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["cache"], "ok");
    }
}
