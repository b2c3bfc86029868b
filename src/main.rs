use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json};
use serde_json::json;
use std::sync::Arc;

use undercut_sim::{
    EngineConfig, EngineError, ModelCache, Orchestrator, ScenarioRequest, ServerConfig,
    SimulateResponse, StaticDataProvider,
};

// ---------- Server state ----------

#[derive(Clone)]
struct AppState {
    provider: Arc<StaticDataProvider>,
    cache: Arc<ModelCache>,
    engine: EngineConfig,
}

// ---------- Handlers ----------

async fn simulate(
    State(state): State<AppState>,
    Json(request): Json<ScenarioRequest>,
) -> Result<Json<SimulateResponse>, (StatusCode, Json<serde_json::Value>)> {
    let orchestrator = Orchestrator::new(state.provider.as_ref())
        .with_cache(&state.cache)
        .with_config(state.engine);

    match orchestrator.run(&request) {
        Ok(outcome) => Ok(Json(outcome.into_response())),
        Err(err @ EngineError::Validation { field, .. }) => {
            tracing::warn!("rejected simulate request: {err}");
            Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": err.to_string(), "field": field })),
            ))
        }
        Err(err @ EngineError::UpstreamData(_)) => {
            tracing::error!("simulate failed: {err}");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": err.to_string() })),
            ))
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();
    let provider = match &config.data_path {
        Some(path) => {
            let provider = StaticDataProvider::from_file(path)?;
            tracing::info!("loaded historical dataset from {path}");
            provider
        }
        None => {
            tracing::warn!("DATA_PATH not set; running on prior models only");
            StaticDataProvider::empty()
        }
    };

    let state = AppState {
        provider: Arc::new(provider),
        cache: Arc::new(ModelCache::new()),
        engine: EngineConfig::default(),
    };

    let app = axum::Router::new()
        .route("/simulate", post(simulate))
        .route("/health", get(health))
        .with_state(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
