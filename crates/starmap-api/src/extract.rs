//! Request extractors.
//!
//! Authentication happens upstream; the gateway forwards the acting player
//! and their active planet as headers. A missing header is `401`, a header
//! that is not a UUID is `400`. JSON bodies are deserialized and then
//! checked with [`validator`] before a handler sees them.

use std::str::FromStr;

use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use starmap_core::Actor;
use starmap_types::{PlanetId, PlayerId};
use validator::Validate;

use crate::error::ApiError;

/// Header carrying the authenticated player id.
pub const PLAYER_HEADER: &str = "x-player-id";

/// Header carrying the player's active planet id.
pub const PLANET_HEADER: &str = "x-planet-id";

/// The acting player and the planet they act from.
#[derive(Debug, Clone, Copy)]
pub struct CurrentActor(pub Actor);

impl<S: Send + Sync> FromRequestParts<S> for CurrentActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let player: PlayerId = header_id(parts, PLAYER_HEADER)?;
        let planet: PlanetId = header_id(parts, PLANET_HEADER)?;
        Ok(Self(Actor::new(player, planet)))
    }
}

/// The acting player, for read endpoints that need no active planet.
#[derive(Debug, Clone, Copy)]
pub struct CurrentPlayer(pub PlayerId);

impl<S: Send + Sync> FromRequestParts<S> for CurrentPlayer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_id(parts, PLAYER_HEADER).map(Self)
    }
}

fn header_id<T: FromStr>(parts: &Parts, name: &str) -> Result<T, ApiError> {
    let value = parts
        .headers
        .get(name)
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {name} header")))?;
    value
        .to_str()
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .ok_or_else(|| ApiError::BadRequest(format!("malformed {name} header")))
}

/// A JSON body that passed its [`Validate`] rules.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        value
            .validate()
            .map_err(|errors| ApiError::BadRequest(errors.to_string()))?;
        Ok(Self(value))
    }
}
