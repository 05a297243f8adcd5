//! REST handlers for dispatching and inspecting movements.
//!
//! The planet in a dispatch path is the movement's *destination*; the
//! origin is always the actor's active planet. Each dispatch handler
//! authorizes the target first (`403` when the planet is not hostile or
//! not friendly as the movement type requires), then hands a
//! [`DispatchRequest`] to the core.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use starmap_core::{Actor, DispatchRequest};
use starmap_types::{
    Movement, MovementId, MovementType, PlanetId, QuantityMap, Report, ResourceAmounts,
};
use validator::{Validate, ValidationError};

use crate::error::ApiError;
use crate::extract::{CurrentActor, CurrentPlayer, ValidatedJson};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST .../movements/scout`.
#[derive(Debug, Deserialize, Validate)]
pub struct ScoutBody {
    /// Number of scouts to send.
    #[validate(range(min = 1, message = "at least one scout must be sent"))]
    pub quantity: u64,
}

/// Body of the attack and support endpoints.
#[derive(Debug, Deserialize, Validate)]
pub struct UnitsBody {
    /// Units to send.
    #[validate(custom(function = "validate_fleet"))]
    pub quantities: QuantityMap,
}

/// Body of `POST .../movements/transport`.
#[derive(Debug, Deserialize, Validate)]
pub struct TransportBody {
    /// Transporters to send.
    #[validate(custom(function = "validate_fleet"))]
    pub quantities: QuantityMap,
    /// Resources to load.
    #[validate(custom(function = "validate_cargo"))]
    pub cargo: ResourceAmounts,
}

fn validate_fleet(quantities: &QuantityMap) -> Result<(), ValidationError> {
    if quantities.total().is_none() {
        return Err(ValidationError::new("fleet_too_large"));
    }
    Ok(())
}

fn validate_cargo(cargo: &ResourceAmounts) -> Result<(), ValidationError> {
    if cargo.is_empty() {
        return Err(ValidationError::new("cargo_empty"));
    }
    if cargo.values().any(|amount| *amount == 0) {
        return Err(ValidationError::new("cargo_zero_amount"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// `POST /api/planets/{id}/movements/scout`
pub async fn dispatch_scout(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<ScoutBody>,
) -> Result<(StatusCode, Json<Movement>), ApiError> {
    let request = DispatchRequest::Scout {
        quantity: body.quantity,
    };
    dispatch(&state, actor, &id, &request).await
}

/// `POST /api/planets/{id}/movements/attack`
pub async fn dispatch_attack(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<UnitsBody>,
) -> Result<(StatusCode, Json<Movement>), ApiError> {
    let request = DispatchRequest::Attack {
        quantities: body.quantities,
    };
    dispatch(&state, actor, &id, &request).await
}

/// `POST /api/planets/{id}/movements/occupy`
pub async fn dispatch_occupy(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Movement>), ApiError> {
    dispatch(&state, actor, &id, &DispatchRequest::Occupy).await
}

/// `POST /api/planets/{id}/movements/support`
pub async fn dispatch_support(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<UnitsBody>,
) -> Result<(StatusCode, Json<Movement>), ApiError> {
    let request = DispatchRequest::Support {
        quantities: body.quantities,
    };
    dispatch(&state, actor, &id, &request).await
}

/// `POST /api/planets/{id}/movements/transport`
pub async fn dispatch_transport(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<TransportBody>,
) -> Result<(StatusCode, Json<Movement>), ApiError> {
    let request = DispatchRequest::Transport {
        quantities: body.quantities,
        cargo: body.cargo,
    };
    dispatch(&state, actor, &id, &request).await
}

/// Authorize the target for the movement type, then dispatch.
async fn dispatch(
    state: &AppState,
    actor: Actor,
    destination: &str,
    request: &DispatchRequest,
) -> Result<(StatusCode, Json<Movement>), ApiError> {
    let destination: PlanetId = parse_id(destination)?;
    let target = state
        .service
        .planet(destination)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("planet {destination} not found")))?;

    let movement_type = request.movement_type();
    let policy = state.service.policy();
    let allowed = if is_hostile_action(movement_type) {
        policy.is_hostile(&actor, &target)
    } else {
        policy.is_friendly(&actor, &target)
    };
    if !allowed {
        tracing::debug!(
            player = %actor.player,
            planet = %destination,
            movement_type = movement_type.as_str(),
            "Dispatch target refused"
        );
        return Err(ApiError::Forbidden(format!(
            "planet {destination} is not a valid {} target",
            movement_type.as_str()
        )));
    }

    let movement = state
        .service
        .dispatch(actor, destination, request, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// Scouting, attacking and occupying need a hostile target; support and
/// transport need a friendly one.
const fn is_hostile_action(movement_type: MovementType) -> bool {
    matches!(
        movement_type,
        MovementType::Scout | MovementType::Attack | MovementType::Occupy
    )
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// `GET /api/movements/{id}` -- a movement owned by the caller.
///
/// Another player's movement is reported as not found.
pub async fn get_movement(
    State(state): State<Arc<AppState>>,
    CurrentPlayer(player): CurrentPlayer,
    Path(id): Path<String>,
) -> Result<Json<Movement>, ApiError> {
    let id: MovementId = parse_id(&id)?;
    state
        .service
        .movement(id)
        .await?
        .filter(|movement| movement.owner == player)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("movement {id} not found")))
}

/// `GET /api/reports` -- the caller's scout and battle reports, newest
/// first.
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    CurrentPlayer(player): CurrentPlayer,
) -> Result<Json<Vec<Report>>, ApiError> {
    Ok(Json(state.service.reports_for(player).await?))
}

/// `GET /api/health`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn parse_id<T: std::str::FromStr>(raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .ok()
        .ok_or_else(|| ApiError::BadRequest(format!("invalid id '{raw}'")))
}
