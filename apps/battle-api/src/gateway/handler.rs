//! Inbound event dispatch: joinGame, joinBattle, and the legacy room join.

use serde_json::Value;

use crate::models::battle::{BattleState, Player, Pokemon};
use crate::registry::JoinOutcome;
use crate::AppState;

use super::events::{
    ClientMessage, EndReason, EventName, GatewayMessage, JoinBattlePayload, JoinGamePayload,
};
use super::fanout::Room;
use super::server::CLOSE_BATTLE_FULL;

/// Dispatch one client event.
///
/// Payload problems are answered with an `error` notification. `Err` is
/// reserved for protocol violations that end the connection.
pub fn handle_event(
    state: &AppState,
    connection_id: &str,
    msg: ClientMessage,
) -> Result<(), &'static str> {
    match msg.t.as_str() {
        EventName::JOIN_GAME => handle_join_game(state, connection_id, msg.d),
        EventName::JOIN_BATTLE => handle_join_battle(state, connection_id, msg.d),
        EventName::JOIN_BATTLE_ROOM => handle_join_battle_room(state, connection_id, msg.d),
        other => {
            tracing::debug!(connection_id = %connection_id, event = %other, "unknown event");
            return Err("Unknown event");
        }
    }
    Ok(())
}

/// `joinGame`: attach the connection to the battle's group. No notification.
fn handle_join_game(state: &AppState, connection_id: &str, data: Value) {
    let payload: JoinGamePayload = match serde_json::from_value(data) {
        Ok(p) => p,
        Err(e) => return reject(state, connection_id, &format!("Invalid joinGame payload: {e}")),
    };
    if payload.battle_id.trim().is_empty() {
        return reject(state, connection_id, "battleId must not be empty");
    }

    let room = Room::Battle(payload.battle_id);
    tracing::debug!(connection_id = %connection_id, room = %room.name(), "joined room");
    state.hub.join(connection_id, room);
}

/// `join-battle-room`: legacy group join keyed by the bare battle id. Tells
/// every member, the newcomer included, who joined.
fn handle_join_battle_room(state: &AppState, connection_id: &str, data: Value) {
    let battle_id: String = match serde_json::from_value(data) {
        Ok(id) => id,
        Err(_) => return reject(state, connection_id, "join-battle-room expects a battle id string"),
    };
    if battle_id.trim().is_empty() {
        return reject(state, connection_id, "battleId must not be empty");
    }

    let room = Room::Legacy(battle_id);
    state.hub.join(connection_id, room.clone());
    let delivered = state
        .hub
        .broadcast_room(&room, GatewayMessage::player_joined(connection_id));

    tracing::debug!(
        connection_id = %connection_id,
        room = %room.name(),
        delivered,
        "player joined legacy room"
    );
}

/// `joinBattle`: claim a slot and notify according to the join outcome.
fn handle_join_battle(state: &AppState, connection_id: &str, data: Value) {
    let payload: JoinBattlePayload = match serde_json::from_value(data) {
        Ok(p) => p,
        Err(e) => return reject(state, connection_id, &format!("Invalid joinBattle payload: {e}")),
    };
    if let Err(reason) = payload.validate() {
        return reject(state, connection_id, reason);
    }

    let battle_id = payload.battle_id;

    // A connection holds at most one slot. Seats in this battle are checked by
    // the registry under the battle lock.
    let seated_elsewhere = state
        .hub
        .rooms_of(connection_id)
        .iter()
        .filter_map(Room::battle_id)
        .any(|other| other != battle_id && state.battles.holds_seat(other, connection_id));
    if seated_elsewhere {
        return reject(state, connection_id, "Connection is already seated in another battle");
    }

    let player = Player {
        address: payload.player_address,
        connection_id: connection_id.to_string(),
        pokemon: Pokemon {
            id: payload.pokemon_id,
            name: payload.name,
            hp: payload.hp,
            moves: payload.moves,
        },
    };
    let room = Room::Battle(battle_id.clone());

    // The registry lock is released by the time any notification is queued.
    match state.battles.join(&battle_id, player) {
        JoinOutcome::Waiting { player_number } => {
            state.hub.join(connection_id, room);
            state.hub.send_to(
                connection_id,
                GatewayMessage::waiting_for_opponent(&battle_id, player_number),
            );
            tracing::info!(
                battle_id = %battle_id,
                connection_id = %connection_id,
                player_number,
                "player waiting for opponent"
            );
        }
        JoinOutcome::Ready(battle_state) => announce_ready(state, connection_id, &battle_state),
        JoinOutcome::SessionFull => {
            state
                .hub
                .send_to(connection_id, GatewayMessage::battle_full(&battle_id));
            state
                .hub
                .close(connection_id, CLOSE_BATTLE_FULL, "Battle full");
            tracing::debug!(battle_id = %battle_id, connection_id = %connection_id, "battle full");
        }
        JoinOutcome::AlreadyJoined => {
            state.hub.join(connection_id, room);
            state
                .hub
                .send_to(connection_id, GatewayMessage::already_joined(&battle_id));
            tracing::debug!(battle_id = %battle_id, connection_id = %connection_id, "already joined");
        }
        JoinOutcome::NotFound => {
            state
                .hub
                .send_to(connection_id, GatewayMessage::battle_not_found(&battle_id));
            tracing::debug!(battle_id = %battle_id, connection_id = %connection_id, "battle not found");
        }
    }
}

/// Put the second player in the battle's room and tell the room the battle is
/// ready.
///
/// The opponent can drop between the registry join and the room join. The
/// reconciler then removes the battle before this connection is in the room,
/// so the joiner is told here instead. The seat is checked again after the
/// broadcast so that `battleEnded` is always the last word on a battle that
/// ended mid-announcement.
fn announce_ready(state: &AppState, connection_id: &str, battle_state: &BattleState) {
    let battle_id = battle_state.battle_id.as_str();
    let room = Room::Battle(battle_id.to_string());
    state.hub.join(connection_id, room.clone());

    if !state.battles.holds_seat(battle_id, connection_id) {
        return end_before_ready(state, connection_id, battle_id, &room);
    }

    let delivered = state
        .hub
        .broadcast_room(&room, GatewayMessage::battle_ready(battle_state));

    if !state.battles.holds_seat(battle_id, connection_id) {
        return end_before_ready(state, connection_id, battle_id, &room);
    }

    tracing::info!(
        battle_id = %battle_id,
        connection_id = %connection_id,
        delivered,
        "battle ready"
    );
}

fn end_before_ready(state: &AppState, connection_id: &str, battle_id: &str, room: &Room) {
    state.hub.send_to(
        connection_id,
        GatewayMessage::battle_ended(battle_id, EndReason::OpponentDisconnected),
    );
    state.hub.dissolve(room);
    tracing::info!(
        battle_id = %battle_id,
        connection_id = %connection_id,
        "opponent left before battle ready was announced"
    );
}

fn reject(state: &AppState, connection_id: &str, message: &str) {
    tracing::debug!(connection_id = %connection_id, %message, "rejected event");
    state
        .hub
        .send_to(connection_id, GatewayMessage::error(message));
}
