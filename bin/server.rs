// Location Resolver - Decision Service Server
// Serves the baseline matcher at POST /solution/ for the match-rate harness

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use location_resolver::config::DEFAULT_DB_PATH;
use location_resolver::{propose_match, MerchantRequest, SqliteStore};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<SqliteStore>>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "OK",
        version: location_resolver::VERSION,
    })
}

/// POST /solution/ - Propose a location and corporation for a merchant
async fn solution(
    State(state): State<AppState>,
    Json(request): Json<MerchantRequest>,
) -> impl IntoResponse {
    let Ok(store) = state.store.lock() else {
        tracing::error!("Store lock poisoned");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error: "store unavailable".to_string() }),
        )
            .into_response();
    };

    match propose_match(&*store, &request) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Error proposing match");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: e.to_string() }),
            )
                .into_response()
        }
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/solution/", post(solution))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    location_resolver::init_tracing();

    let db_path = std::env::var("LOCATIONS_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_PATH));
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());

    if !db_path.exists() {
        tracing::error!(path = %db_path.display(), "Database not found, run `location-resolver load-csv` first");
        std::process::exit(1);
    }

    let store = SqliteStore::open(&db_path).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to open database");
        std::process::exit(1);
    });
    tracing::info!(path = %db_path.display(), "Database opened");

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
    };

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind");
            std::process::exit(1);
        });

    tracing::info!("Server running on http://{addr}");
    println!("\n🚀 Decision service on http://{addr}/solution/");
    println!("   Press Ctrl+C to stop\n");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server stopped");
        std::process::exit(1);
    }
}
