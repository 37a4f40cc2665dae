//! JSON HTTP API for Tally.
//!
//! Exposes an axum [`Router`] backed by any
//! [`tally_core::store::EngagementStore`] and
//! [`tally_core::spotlight::SpotlightCache`]. Authentication happens
//! upstream; this layer trusts the `x-user-id` header it is handed.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", tally_api::api_router(store.clone(), cache.clone()))
//! ```

pub mod error;
pub mod identity;
pub mod likes;
pub mod spotlight;
pub mod views;


use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use tally_core::{spotlight::SpotlightCache, store::EngagementStore};
use tally_spotlight::Spotlight;
use uuid::Uuid;

pub use error::ApiError;

/// Shared handler state.
pub struct AppState<S, C> {
  pub store:     Arc<S>,
  pub spotlight: Spotlight<S, C>,
}

impl<S, C> Clone for AppState<S, C> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), spotlight: self.spotlight.clone() }
  }
}

/// Parse a `{id}` path segment, rejecting with a JSON 400 rather than
/// axum's plain-text path rejection.
pub(crate) fn parse_content_id(raw: &str) -> Result<Uuid, ApiError> {
  Uuid::parse_str(raw)
    .map_err(|_| ApiError::BadRequest(format!("invalid content id: {raw}")))
}

/// Build a fully-materialised API router for `store`, with spotlight
/// selections cached in `cache`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, C>(store: Arc<S>, cache: Arc<C>) -> Router<()>
where
  S: EngagementStore + 'static,
  C: SpotlightCache + 'static,
{
  let state = AppState {
    spotlight: Spotlight::new(Arc::clone(&store), cache),
    store,
  };

  Router::new()
    // Views
    .route("/content/{id}/view", post(views::record::<S, C>))
    // Likes
    .route(
      "/content/{id}/like",
      get(likes::status::<S, C>)
        .post(likes::toggle::<S, C>)
        .put(likes::like::<S, C>)
        .delete(likes::unlike::<S, C>),
    )
    // Spotlight
    .route("/content/random", get(spotlight::random::<S, C>))
    .route("/health", get(|| async { "ok" }))
    .with_state(state)
}
