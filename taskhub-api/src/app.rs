/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use taskhub_api::{app::{build_router, AppState}, config::Config};
/// use taskhub_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(DatabaseConfig::new("postgresql://localhost/taskhub")).await?;
/// let app = build_router(AppState::postgres(pool, config));
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer};
use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use taskhub_shared::{
    auth::middleware::require_auth,
    models::{access_token::AccessToken, task::Task, user::User},
    repository::{
        memory::{MemoryRepository, MemoryStore},
        postgres::PgRepository,
    },
    services::{auth::AuthService, tasks::TaskService},
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned per request; services hold their repositories behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub tasks: TaskService,
    pub config: Arc<Config>,

    /// Storage label reported by the health check
    pub storage: &'static str,
}

impl AppState {
    /// State backed by PostgreSQL
    pub fn postgres(pool: PgPool, config: Config) -> Self {
        let auth = AuthService::new(
            Arc::new(PgRepository::<User>::new(pool.clone())),
            Arc::new(PgRepository::<AccessToken>::new(pool.clone())),
        )
        .with_token_ttl(config.token_ttl());
        let tasks = TaskService::new(Arc::new(PgRepository::<Task>::new(pool)));

        Self {
            auth,
            tasks,
            config: Arc::new(config),
            storage: "postgres",
        }
    }

    /// State backed by a fresh in-memory store
    pub fn in_memory(config: Config) -> Self {
        let store = MemoryStore::new();
        let auth = AuthService::new(
            Arc::new(MemoryRepository::<User>::new(store.clone())),
            Arc::new(MemoryRepository::<AccessToken>::new(store.clone())),
        )
        .with_token_ttl(config.token_ttl());
        let tasks = TaskService::new(Arc::new(MemoryRepository::<Task>::new(store)));

        Self {
            auth,
            tasks,
            config: Arc::new(config),
            storage: "memory",
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET    /health            public
/// ├── POST   /register          public
/// ├── POST   /login             public
/// ├── POST   /logout            bearer
/// ├── POST   /change-password   bearer
/// ├── GET    /profile           bearer
/// ├── POST   /tasks             bearer
/// ├── GET    /tasks             bearer
/// ├── GET    /tasks/:id         bearer
/// ├── PUT    /tasks/:id         bearer
/// └── DELETE /tasks/:id         bearer
/// ```
///
/// Layers, outermost first: security headers, CORS, request tracing.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login));

    let protected_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/change-password", post(routes::auth::change_password))
        .route("/profile", get(routes::auth::profile))
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::store_task),
        )
        .route(
            "/tasks/:id",
            get(routes::tasks::show_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .layer(from_fn_with_state(state.auth.clone(), require_auth));

    let cors = cors_layer(&state.config);
    let production = state.config.api.production;

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
