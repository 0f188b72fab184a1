//! Battle lookup endpoints: create, existence check, state, result, termination.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ApiError, ApiErrorBody};
use crate::gateway::events::{EndReason, GatewayMessage};
use crate::gateway::fanout::Room;
use crate::models::battle::{BattleResult, BattleState};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/battle/create", get(create_battle))
        .route(
            "/battle/{battle_id}",
            get(battle_exists).delete(terminate_battle),
        )
        .route("/battle/{battle_id}/state", get(battle_state))
        .route("/battle/{battle_id}/result", post(record_result))
}

// ---------------------------------------------------------------------------
// GET /battle/create
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBattleResponse {
    pub battle_id: String,
}

#[utoipa::path(
    get,
    path = "/battle/create",
    tag = "Battles",
    responses(
        (status = 200, description = "Battle created", body = CreateBattleResponse),
        (status = 500, description = "Could not allocate an id", body = ApiErrorBody),
    ),
)]
pub async fn create_battle(
    State(state): State<AppState>,
) -> Result<Json<CreateBattleResponse>, ApiError> {
    let battle_id = state.battles.create()?;
    Ok(Json(CreateBattleResponse { battle_id }))
}

// ---------------------------------------------------------------------------
// GET /battle/:battle_id
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExistsResponse {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[utoipa::path(
    get,
    path = "/battle/{battle_id}",
    tag = "Battles",
    params(
        ("battle_id" = String, Path, description = "Battle ID"),
    ),
    responses(
        (status = 200, description = "Battle exists", body = ExistsResponse),
        (status = 404, description = "Battle does not exist", body = ExistsResponse),
    ),
)]
pub async fn battle_exists(
    State(state): State<AppState>,
    Path(battle_id): Path<String>,
) -> (StatusCode, Json<ExistsResponse>) {
    if state.battles.exists(&battle_id) {
        (
            StatusCode::OK,
            Json(ExistsResponse {
                exists: true,
                message: None,
            }),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ExistsResponse {
                exists: false,
                message: Some("Battle not found".to_string()),
            }),
        )
    }
}

// ---------------------------------------------------------------------------
// GET /battle/:battle_id/state
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/battle/{battle_id}/state",
    tag = "Battles",
    params(
        ("battle_id" = String, Path, description = "Battle ID"),
    ),
    responses(
        (status = 200, description = "Current battle state", body = BattleState),
        (status = 404, description = "Battle not found", body = ApiErrorBody),
    ),
)]
pub async fn battle_state(
    State(state): State<AppState>,
    Path(battle_id): Path<String>,
) -> Result<Json<BattleState>, ApiError> {
    state
        .battles
        .snapshot(&battle_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Battle not found"))
}

// ---------------------------------------------------------------------------
// POST /battle/:battle_id/result
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordResultRequest {
    pub winner: String,
    pub loser: String,
}

#[utoipa::path(
    post,
    path = "/battle/{battle_id}/result",
    tag = "Battles",
    params(
        ("battle_id" = String, Path, description = "Battle ID"),
    ),
    request_body = RecordResultRequest,
    responses(
        (status = 200, description = "Result recorded", body = BattleState),
        (status = 400, description = "Winner or loser is not seated", body = ApiErrorBody),
        (status = 404, description = "Battle not found", body = ApiErrorBody),
        (status = 409, description = "Battle not active or result already recorded", body = ApiErrorBody),
    ),
)]
pub async fn record_result(
    State(state): State<AppState>,
    Path(battle_id): Path<String>,
    Json(body): Json<RecordResultRequest>,
) -> Result<Json<BattleState>, ApiError> {
    let result = BattleResult {
        winner: body.winner,
        loser: body.loser,
    };
    let battle_state = state.battles.record_result(&battle_id, result)?;

    state.hub.broadcast_room(
        &Room::Battle(battle_id.clone()),
        GatewayMessage::battle_result(&battle_state),
    );
    tracing::info!(battle_id = %battle_id, winner = ?battle_state.winner, "battle result recorded");

    Ok(Json(battle_state))
}

// ---------------------------------------------------------------------------
// DELETE /battle/:battle_id
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/battle/{battle_id}",
    tag = "Battles",
    params(
        ("battle_id" = String, Path, description = "Battle ID"),
    ),
    responses(
        (status = 204, description = "Battle terminated"),
        (status = 404, description = "Battle not found", body = ApiErrorBody),
    ),
)]
pub async fn terminate_battle(
    State(state): State<AppState>,
    Path(battle_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .battles
        .remove(&battle_id)
        .ok_or_else(|| ApiError::not_found("Battle not found"))?;

    let room = Room::Battle(battle_id.clone());
    let notified = state
        .hub
        .broadcast_room(&room, GatewayMessage::battle_ended(&battle_id, EndReason::Terminated));
    state.hub.dissolve(&room);

    tracing::info!(battle_id = %battle_id, notified, "battle terminated");

    Ok(StatusCode::NO_CONTENT)
}
