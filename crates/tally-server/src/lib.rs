//! Tally Web Server
//!
//! Axum-based REST API for the Tally conversational ledger.
//!
//! Every ledger route is scoped by a `:user` path segment; users never see
//! each other's records.
//!
//! Security features:
//! - Bearer API-key authentication when keys are configured
//! - Restrictive CORS policy
//! - Bounded result limits
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use tally_core::{Dispatcher, IntentClassifier, ServerSettings};

mod handlers;

/// Maximum result limit for list and search routes
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// API keys accepted as "Bearer <key>"; empty disables authentication
    pub api_keys: Vec<String>,
}

impl ServerConfig {
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            allowed_origins: settings.allowed_origins.clone(),
            api_keys: settings
                .api_keys
                .iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn requires_auth(&self) -> bool {
        !self.api_keys.is_empty()
    }
}

/// Shared application state
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub config: ServerConfig,
}

impl AppState {
    pub fn db(&self) -> &tally_core::Database {
        self.dispatcher.database()
    }
}

/// Authentication middleware - validates a bearer API key when keys are configured
///
/// Keys are compared in constant time.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.requires_auth() {
        return next.run(request).await;
    }

    let api_key_valid = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|key| validate_api_key(key.trim(), &state.config.api_keys))
        .unwrap_or(false);

    if api_key_valid {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid API key");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

/// Validate an API key against the configured keys using constant-time comparison
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();
    valid_keys.iter().any(|key| {
        let key_bytes = key.as_bytes();
        // Lengths must match before the constant-time comparison
        provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
    })
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Result of an idempotent delete
#[derive(Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

/// Create the application router
pub fn create_router(dispatcher: Dispatcher, config: ServerConfig) -> Router {
    match dispatcher.classifier() {
        Some(client) => info!(backend = client.name(), host = client.host(), "Intent classifier configured"),
        None => info!("ℹ️  Intent classifier not configured (set AI_API_URL to enable messages)"),
    }

    let state = Arc::new(AppState {
        dispatcher,
        config: config.clone(),
    });

    let user_routes = Router::new()
        // Conversational entry points
        .route("/messages", post(handlers::post_message))
        .route("/intents", post(handlers::post_intent))
        // Balances
        .route("/balance", get(handlers::get_balance))
        .route("/balance/methods", get(handlers::get_balance_by_method))
        .route("/net-worth", get(handlers::get_net_worth))
        // Day records and entries
        .route("/days/:date", get(handlers::get_day))
        .route("/entries", post(handlers::create_entry))
        .route("/entries/:id", delete(handlers::delete_entry))
        .route("/entries/:id/amount", put(handlers::update_entry_amount))
        .route("/entries/:id/payment", put(handlers::update_entry_payment))
        // Transfers
        .route(
            "/transfers",
            get(handlers::list_transfers).post(handlers::create_transfer),
        )
        .route(
            "/transfers/:id",
            get(handlers::get_transfer).delete(handlers::delete_transfer),
        )
        // Budgets
        .route(
            "/budgets",
            get(handlers::list_budgets).put(handlers::set_budget),
        )
        .route("/budgets/status", get(handlers::budget_status))
        .route("/budgets/alert", get(handlers::budget_alert))
        .route("/budgets/:category", delete(handlers::delete_budget))
        // Queries
        .route("/search", get(handlers::search_keyword))
        .route("/search/range", get(handlers::search_range))
        .route("/known", get(handlers::get_known))
        .route("/export", get(handlers::export_csv));

    let api_routes = Router::new()
        .nest("/users/:user", user_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .route("/health", get(handlers::health));

    // Build CORS layer
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve(
    dispatcher: Dispatcher,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.requires_auth() {
        warn!("⚠️  No API keys configured - authentication disabled, do not expose to network!");
    }

    check_classifier_connection(&dispatcher).await;

    let app = create_router(dispatcher, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log intent classifier connection status
async fn check_classifier_connection(dispatcher: &Dispatcher) {
    match dispatcher.classifier() {
        Some(client) => {
            if client.health_check().await {
                info!("✅ Intent classifier connected: {} ({})", client.host(), client.name());
            } else {
                warn!(
                    "⚠️  Intent classifier configured but not responding: {} ({})",
                    client.host(),
                    client.name()
                );
            }
        }
        None => {
            info!("ℹ️  Intent classifier not configured; /messages will return 500");
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<tally_core::Error> for AppError {
    fn from(err: tally_core::Error) -> Self {
        let status = if err.is_rejection() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else if err.is_malformed_intent() {
            StatusCode::BAD_REQUEST
        } else if err.is_transient() {
            StatusCode::SERVICE_UNAVAILABLE
        } else if matches!(err, tally_core::Error::NotFound(_)) {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            Self {
                status,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(err.into()),
            }
        } else {
            if status == StatusCode::SERVICE_UNAVAILABLE {
                warn!(error = %err, "Upstream unavailable");
            }
            Self {
                status,
                message: err.to_string(),
                internal: None,
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "An internal error occurred".to_string(),
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
