pub mod status;

use axum::Router;
use axum::routing::get;

use crate::cache::ReadCache;
use crate::error::CallCacheError;

/// Values are the raw hex return data of `eth_call`.
pub type CallCache = ReadCache<String, CallCacheError>;

#[derive(Clone)]
pub struct AppState {
    pub cache: CallCache,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(status::health_handler))
        .route("/status", get(status::status_handler))
        .with_state(state)
}
