use axum::Router;
use sqlx::PgPool;

use crate::Config;

mod data;
mod devices;
mod health;
mod stats;

// ---

pub fn router(pool: PgPool, config: Config) -> Router {
    // ---
    Router::new()
        .merge(health::router())
        .merge(devices::router())
        .merge(data::router())
        .merge(stats::router())
        .with_state((pool, config))
}
