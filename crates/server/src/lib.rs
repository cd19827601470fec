pub mod error;
pub mod extract;
pub mod routes;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
};
use deployment::Deployment;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{
    Expiry, MemoryStore, SessionManagerLayer, SessionStore, cookie::SameSite,
};
use tower_sessions_sqlx_store::PostgresStore;
use tracing::info;

pub type DeploymentImpl = local_deployment::LocalDeployment;

const SESSION_COOKIE: &str = "giftgenie.sid";
const SESSION_IDLE_DAYS: i64 = 7;

fn with_sessions<S>(router: Router, store: S, secure: bool) -> Router
where
    S: SessionStore + Clone,
{
    let layer = SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE)
        .with_secure(secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(SESSION_IDLE_DAYS)));
    router.layer(layer)
}

fn cors(origin: &str) -> anyhow::Result<CorsLayer> {
    Ok(CorsLayer::new()
        .allow_origin(origin.parse::<HeaderValue>()?)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]))
}

/// The full HTTP application: `/api` routes, sessions, CORS and request tracing.
pub async fn app(deployment: DeploymentImpl) -> anyhow::Result<Router> {
    let secure = deployment.config().session_secure;
    let router = routes::router(deployment.clone());

    let router = match deployment.db() {
        Some(db) => {
            let store = PostgresStore::new(db.pool.clone());
            store.migrate().await?;
            info!("Using PostgreSQL session store");
            with_sessions(router, store, secure)
        }
        None => with_sessions(router, MemoryStore::default(), secure),
    };

    let router = match deployment.config().cors_origin.as_deref() {
        Some(origin) => router.layer(cors(origin)?),
        None => router,
    };

    Ok(router.layer(TraceLayer::new_for_http()))
}
