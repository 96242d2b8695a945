//! The ambient actor, read from the `x-actor-id` request header.
//!
//! Authentication happens upstream; this crate only trusts the header it is
//! handed and passes the id explicitly into the core.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// `Some(id)` when the request names an actor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Actor(pub Option<Uuid>);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    let Some(value) = parts.headers.get(ACTOR_HEADER) else {
      return Ok(Actor(None));
    };
    let id = value
      .to_str()
      .ok()
      .and_then(|s| Uuid::parse_str(s.trim()).ok())
      .ok_or_else(|| ApiError::BadRequest(format!("{ACTOR_HEADER} is not a UUID")))?;
    Ok(Actor(Some(id)))
  }
}
