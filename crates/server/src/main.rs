use accountpool::api;
use accountpool::config::Config;
use accountpool::db;
use accountpool::pool::{AccountsRepo, DirectoryStore, ExecutionsRepo, LeaseCoordinator, Selector};

use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::from_env()?;

    info!(
        api_addr = %cfg.api_addr,
        db_pool_size = cfg.db_pool_size,
        default_max_retries = cfg.default_max_retries,
        migrate_on_startup = cfg.migrate_on_startup,
        "accountpool starting"
    );

    let pool = db::make_pool(&cfg.database_url, cfg.db_pool_size, cfg.db_pool_pre_ping).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
    }

    let store = DirectoryStore::new(pool.clone());
    let selector = Selector::new(store.clone());
    let coordinator = LeaseCoordinator::new(store, selector, cfg.coordinator_config());

    let state = api::ApiState {
        coordinator,
        accounts: AccountsRepo::new(pool.clone()),
        executions: ExecutionsRepo::new(pool.clone()),
    };

    let app = api::router(state).layer(cors_layer(&cfg.allowed_origins)?);

    let listener = tokio::net::TcpListener::bind(&cfg.api_addr).await?;
    info!(addr = %cfg.api_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(allowed_origins: &[String]) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    if allowed_origins.iter().any(|o| o == "*") {
        return Ok(layer.allow_origin(Any));
    }

    let origins = allowed_origins
        .iter()
        .map(|o| o.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}
