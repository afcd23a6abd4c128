//! Middleman proxy between the bridge and the LLM providers
//!
//! Stateless: every request carries its own provider choice and message
//! list, and both upstreams are normalized to one `{response, provider}`
//! shape.

use anyhow::Result;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::providers::{ChatRequest, ChatResponse, ProviderError, create_provider};

pub struct Server {
    config: Config,
}

struct AppState {
    config: Config,
}

impl Server {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub async fn run(&self) -> Result<()> {
        let state = Arc::new(AppState {
            config: self.config.clone(),
        });

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = Router::new()
            .route("/chat", post(chat))
            .route("/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(state);

        let addr: SocketAddr =
            format!("{}:{}", self.config.server.bind, self.config.server.port).parse()?;

        info!("Starting proxy on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

// Error response type
struct AppError(StatusCode, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({"status": "healthy"}))
}

async fn chat(State(state): State<Arc<AppState>>, Json(request): Json<ChatRequest>) -> Response {
    debug!(
        "chat request: provider={} messages={}",
        request.provider,
        request.messages.len()
    );

    let provider = match create_provider(&request.provider, &state.config, request.model.as_deref())
    {
        Ok(provider) => provider,
        Err(e @ ProviderError::UnknownProvider(_)) => {
            return AppError(StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
        Err(e) => {
            return AppError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let temperature = request
        .temperature
        .unwrap_or(state.config.bridge.default_temperature);

    match provider.complete(&request.messages, temperature).await {
        Ok(text) => Json(ChatResponse {
            response: text,
            provider: request.provider,
        })
        .into_response(),
        Err(e) => {
            error!("{} error: {e:#}", request.provider);
            AppError(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")).into_response()
        }
    }
}
