//! JSON REST API for the courier shipment lifecycle.
//!
//! Exposes an axum [`Router`] backed by a [`LifecycleEngine`] over any
//! [`ShipmentStore`]. Auth, TLS, and transport concerns are the caller's
//! responsibility; the acting user arrives in the `x-actor-id` header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", courier_api::api_router(engine.clone()))
//! ```

pub mod actor;
pub mod error;
pub mod scans;
pub mod shipments;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use courier_core::{engine::LifecycleEngine, store::ShipmentStore};

pub use actor::{ACTOR_HEADER, Actor};
pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(engine: Arc<LifecycleEngine<S>>) -> Router<()>
where
  S: ShipmentStore + 'static,
{
  Router::new()
    // Shipments
    .route("/shipments", post(shipments::create::<S>))
    .route("/shipments/{id}", get(shipments::get_one::<S>))
    .route("/tracking/{tracking_number}", get(shipments::by_tracking_number::<S>))
    .route("/shipments/{id}/transitions", get(shipments::transitions::<S>))
    .route("/shipments/{id}/scans", get(shipments::scans::<S>))
    .route("/shipments/{id}/allowed", get(shipments::allowed::<S>))
    .route("/shipments/{id}/transition", post(shipments::transition::<S>))
    .route(
      "/shipments/{id}/resolve-exception",
      post(shipments::resolve_exception::<S>),
    )
    // Physical entities
    .route("/shipments/{id}/parcels", post(shipments::add_parcel::<S>))
    .route("/bags", post(shipments::create_bag::<S>))
    // Scans
    .route("/scans", post(scans::record::<S>))
    .with_state(engine)
}
