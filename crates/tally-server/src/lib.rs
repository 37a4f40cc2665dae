//! Tally server wiring: configuration, background maintenance, and the
//! top-level router.

pub mod settings;
pub mod maintenance;

use std::sync::Arc;

use axum::Router;
use tally_core::{spotlight::SpotlightCache, store::EngagementStore};
use tower_http::trace::TraceLayer;

pub use settings::ServerConfig;

/// Build the server's router: the engagement API plus request tracing.
pub fn router<S, C>(store: Arc<S>, cache: Arc<C>) -> Router
where
  S: EngagementStore + 'static,
  C: SpotlightCache + 'static,
{
  tally_api::api_router(store, cache).layer(TraceLayer::new_for_http())
}
