//! Integration tests for the movement API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server, backed by the in-memory store.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use starmap_api::router::build_router;
use starmap_api::state::AppState;
use starmap_core::catalog::{FIGHTER, SCOUT, SETTLER, TRANSPORTER};
use starmap_core::{MemoryStore, MovementService, StarmapConfig, UnitCatalog, WorldState};
use starmap_types::{Planet, PlanetId, PlayerId, Resource};
use tower::ServiceExt;

const ALICE: PlayerId = PlayerId::from_u128(0xA11CE);
const BOB: PlayerId = PlayerId::from_u128(0xB0B);

const HOME: PlanetId = PlanetId::from_u128(1);
const ENEMY: PlanetId = PlanetId::from_u128(2);
const NEUTRAL: PlanetId = PlanetId::from_u128(3);
const COLONY: PlanetId = PlanetId::from_u128(4);

fn planet(id: PlanetId, x: i32, owner: Option<PlayerId>) -> Planet {
    Planet {
        id,
        name: format!("planet-{x}"),
        x,
        y: 0,
        owner,
        resources: [(Resource::Metal, 200)].into_iter().collect(),
    }
}

fn app() -> Router {
    let catalog = UnitCatalog::standard();
    let mut world = WorldState::new();
    world.add_planet(planet(HOME, 0, Some(ALICE)));
    world.add_planet(planet(ENEMY, 50, Some(BOB)));
    world.add_planet(planet(NEUTRAL, 30, None));
    world.add_planet(planet(COLONY, 40, Some(ALICE)));
    world.add_population(HOME, SCOUT, ALICE, 10).unwrap();
    world.add_population(HOME, FIGHTER, ALICE, 20).unwrap();
    world.add_population(HOME, TRANSPORTER, ALICE, 5).unwrap();
    world.add_population(HOME, SETTLER, ALICE, 1).unwrap();

    let store = Arc::new(MemoryStore::new(world, &catalog));
    let service = MovementService::new(store, catalog, &StarmapConfig::default());
    build_router(Arc::new(AppState::new(Arc::new(service))))
}

fn post(path: &str, player: PlayerId, planet: PlanetId, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .header("x-player-id", player.to_string())
        .header("x-planet-id", planet.to_string())
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(path: &str, player: PlayerId) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header("x-player-id", player.to_string())
        .body(Body::empty())
        .unwrap()
}

fn movements(target: PlanetId, kind: &str) -> String {
    format!("/api/planets/{target}/movements/{kind}")
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn health_returns_ok() {
    let (status, body) = send(app(), get("/api/health", ALICE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn scout_dispatch_creates_movement() {
    let (status, body) = send(
        app(),
        post(&movements(ENEMY, "scout"), ALICE, HOME, &json!({ "quantity": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["movement_type"], "scout");
    assert_eq!(body["state"], "en_route");
    assert_eq!(body["origin"], HOME.to_string());
    assert_eq!(body["destination"], ENEMY.to_string());
}

#[tokio::test]
async fn missing_actor_headers_are_unauthorized() {
    let request = Request::builder()
        .method("POST")
        .uri(movements(ENEMY, "scout"))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "quantity": 1 }).to_string()))
        .unwrap();
    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn malformed_actor_header_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri(movements(ENEMY, "scout"))
        .header("content-type", "application/json")
        .header("x-player-id", "not-a-uuid")
        .header("x-planet-id", HOME.to_string())
        .body(Body::from(json!({ "quantity": 1 }).to_string()))
        .unwrap();
    let (status, _) = send(app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn hostile_actions_against_own_planet_are_forbidden() {
    let (status, _) = send(
        app(),
        post(&movements(COLONY, "scout"), ALICE, HOME, &json!({ "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        app(),
        post(&movements(COLONY, "occupy"), ALICE, HOME, &Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn friendly_actions_need_friendly_target() {
    let fighters = json!({ "quantities": { FIGHTER.to_string(): 5 } });

    let (status, _) = send(app(), post(&movements(ENEMY, "support"), ALICE, HOME, &fighters)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        app(),
        post(&movements(COLONY, "support"), ALICE, HOME, &fighters),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["movement_type"], "support");
}

#[tokio::test]
async fn occupy_sends_a_settler() {
    let (status, body) = send(
        app(),
        post(&movements(NEUTRAL, "occupy"), ALICE, HOME, &Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["quantities"][SETTLER.to_string()], 1);
}

#[tokio::test]
async fn invalid_bodies_are_rejected() {
    let (status, _) = send(
        app(),
        post(&movements(ENEMY, "scout"), ALICE, HOME, &json!({ "quantity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        app(),
        post(&movements(ENEMY, "attack"), ALICE, HOME, &json!({ "quantities": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let empty_cargo = json!({
        "quantities": { TRANSPORTER.to_string(): 1 },
        "cargo": {}
    });
    let (status, _) = send(
        app(),
        post(&movements(COLONY, "transport"), ALICE, HOME, &empty_cargo),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dispatch_rejections_are_bad_requests() {
    let (status, body) = send(
        app(),
        post(&movements(ENEMY, "scout"), ALICE, HOME, &json!({ "quantity": 11 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("insufficient"));

    let scouts_on_attack = json!({ "quantities": { SCOUT.to_string(): 1 } });
    let (status, _) = send(
        app(),
        post(&movements(ENEMY, "attack"), ALICE, HOME, &scouts_on_attack),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_target_is_not_found() {
    let nowhere = PlanetId::from_u128(99);
    let (status, _) = send(
        app(),
        post(&movements(nowhere, "scout"), ALICE, HOME, &json!({ "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn acting_from_a_foreign_planet_is_forbidden() {
    let (status, _) = send(
        app(),
        post(&movements(NEUTRAL, "scout"), ALICE, ENEMY, &json!({ "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn movements_are_visible_to_their_owner_only() {
    let app = app();
    let (status, body) = send(
        app.clone(),
        post(&movements(ENEMY, "scout"), ALICE, HOME, &json!({ "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap().to_owned();

    let (status, body) = send(app.clone(), get(&format!("/api/movements/{id}"), ALICE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());

    let (status, _) = send(app.clone(), get(&format!("/api/movements/{id}"), BOB)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(app, get("/api/movements/not-a-uuid", ALICE)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reports_start_empty() {
    let (status, body) = send(app(), get("/api/reports", BOB)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}
