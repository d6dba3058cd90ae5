use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{
    routing::{get, post},
    Json, Router,
};
use roleta_core::{
    commit, CategoryPolicy, ClaimRecord, DrawSource, OsDraw, ProvablyFairRng, Segment,
    SegmentSet, SpinCoordinator,
};
use roleta_shared::{ApiError, ErrorKind, SpinRequest, SpinResponse, VerifyResponse};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

mod store;

use store::{init_db, SqliteStore};

struct AppState {
    coordinator: SpinCoordinator,
    store: Arc<SqliteStore>,
}

/// Environment-driven settings.
#[derive(Debug)]
struct ServerConfig {
    database_url: String,
    bind: String,
    seeded_draw: bool,
    category_policy: CategoryPolicy,
    claim_timeout: Duration,
}

impl ServerConfig {
    fn from_env() -> anyhow::Result<Self> {
        let env = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.into());
        let seeded_draw = match env("DRAW_MODE", "seeded").as_str() {
            "seeded" => true,
            "os" => false,
            other => anyhow::bail!("DRAW_MODE must be `seeded` or `os`, got {other:?}"),
        };
        let category_policy =
            CategoryPolicy::from_str(&env("CATEGORY_MATCH", "exact")).map_err(anyhow::Error::msg)?;
        let claim_timeout = Duration::from_millis(env("CLAIM_TIMEOUT_MS", "2000").parse()?);
        Ok(Self {
            database_url: env("DATABASE_URL", "sqlite://roleta.db?mode=rwc"),
            bind: env("BIND", "127.0.0.1:8080"),
            seeded_draw,
            category_policy,
            claim_timeout,
        })
    }
}

/// Maps API errors onto HTTP statuses.
struct HttpError(ApiError);

impl<E: Into<ApiError>> From<E> for HttpError {
    fn from(e: E) -> Self {
        HttpError(e.into())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::AlreadyClaimed => StatusCode::CONFLICT,
            ErrorKind::NoEligibleSegment => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Invalid => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unresolved | ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if let ApiError::Store(e) = &self.0 {
            error!(error = %e, "store failure");
        }
        (status, Json(self.0.body())).into_response()
    }
}

/// `Json` extractor whose rejections use the API error body.
struct ApiJson<T>(T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(HttpError(ApiError::BadRequest(rejection.body_text()))),
        }
    }
}

async fn route_verify(State(state): State<Arc<AppState>>) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        server_seed_hash: state.coordinator.commitment(),
    })
}

async fn route_get_configuration(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SegmentSet>, HttpError> {
    let set = state
        .coordinator
        .config()
        .load()
        .await?
        .ok_or_else(|| HttpError(ApiError::NotFound("no configuration committed".into())))?;
    Ok(Json(set.as_ref().clone()))
}

async fn route_put_configuration(
    State(state): State<Arc<AppState>>,
    ApiJson(segments): ApiJson<Vec<Segment>>,
) -> Result<Json<SegmentSet>, HttpError> {
    let saved = commit(state.store.as_ref(), state.store.as_ref(), segments).await?;
    Ok(Json(saved.as_ref().clone()))
}

async fn route_spin(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SpinRequest>,
) -> Result<Json<SpinResponse>, HttpError> {
    if req.customer_id.trim().is_empty() {
        return Err(HttpError(ApiError::BadRequest("customerId is empty".into())));
    }
    let result = state
        .coordinator
        .spin(&req.customer_id, req.category.as_deref())
        .await?;
    Ok(Json(SpinResponse {
        won: result.segment,
        claim: result.claim,
        server_seed_hash: state.coordinator.commitment(),
    }))
}

async fn route_claim_status(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<String>,
) -> Result<Json<ClaimRecord>, HttpError> {
    let record = state
        .coordinator
        .ledger()
        .get(&customer_id)
        .await?
        .ok_or_else(|| HttpError(ApiError::NotFound(format!("no claim for {customer_id}"))))?;
    Ok(Json(record))
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/verify", get(route_verify))
        .route(
            "/configuration",
            get(route_get_configuration).put(route_put_configuration),
        )
        .route("/spin", post(route_spin))
        .route("/claims/:customer_id", get(route_claim_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let cfg = ServerConfig::from_env()?;

    let opts = SqliteConnectOptions::from_str(&cfg.database_url)?
        .create_if_missing(true)
        .busy_timeout(cfg.claim_timeout);
    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(cfg.claim_timeout)
        .connect_with(opts)
        .await?;
    let params = init_db(&db).await?;

    let draw: Arc<dyn DrawSource> = if cfg.seeded_draw {
        Arc::new(ProvablyFairRng::new(params.server_seed))
    } else {
        Arc::new(OsDraw)
    };
    let store = Arc::new(SqliteStore::new(db, cfg.claim_timeout));
    let coordinator = SpinCoordinator::new(store.clone(), store.clone(), draw)
        .with_policy(cfg.category_policy);
    info!(
        seeded = cfg.seeded_draw,
        policy = ?cfg.category_policy,
        server_seed_hash = %params.server_seed_hash,
        "spin engine ready"
    );

    let state = Arc::new(AppState { coordinator, store });

    let app = app(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind).await?;
    info!("listening on {}", cfg.bind);
    axum::serve(listener, app).await?;
    Ok(())
}
