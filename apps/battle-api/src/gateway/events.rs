//! Gateway event names and wire-format messages.
//!
//! Every frame in both directions is a JSON object `{ "t": <event>, "d": <data> }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::battle::{BattleState, Move};

// ---------------------------------------------------------------------------
// Server → Client message
// ---------------------------------------------------------------------------

/// A message sent from the server to the client over WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayMessage {
    pub t: String,
    pub d: Value,
}

impl GatewayMessage {
    pub fn new(event_name: &str, data: Value) -> Self {
        Self {
            t: event_name.to_string(),
            d: data,
        }
    }

    /// First message on every connection, carrying its server-side id.
    pub fn connected(connection_id: &str) -> Self {
        Self::new(
            EventName::CONNECTED,
            serde_json::json!({ "connectionId": connection_id }),
        )
    }

    pub fn waiting_for_opponent(battle_id: &str, player_number: u8) -> Self {
        Self::new(
            EventName::WAITING_FOR_OPPONENT,
            serde_json::json!({
                "battleId": battle_id,
                "playerNumber": player_number,
                "message": "Waiting for opponent to join...",
            }),
        )
    }

    pub fn battle_ready(state: &BattleState) -> Self {
        Self::new(
            EventName::BATTLE_READY,
            serde_json::json!({
                "battleId": state.battle_id,
                "battleState": state,
                "message": "Both players joined. Battle is ready!",
            }),
        )
    }

    pub fn battle_result(state: &BattleState) -> Self {
        Self::new(
            EventName::BATTLE_RESULT,
            serde_json::json!({
                "battleId": state.battle_id,
                "battleState": state,
                "message": "Battle finished",
            }),
        )
    }

    pub fn battle_full(battle_id: &str) -> Self {
        Self::new(
            EventName::BATTLE_FULL,
            serde_json::json!({
                "battleId": battle_id,
                "message": "Battle already has two players",
            }),
        )
    }

    pub fn already_joined(battle_id: &str) -> Self {
        Self::new(
            EventName::ALREADY_JOINED,
            serde_json::json!({
                "battleId": battle_id,
                "message": "You have already joined this battle",
            }),
        )
    }

    pub fn battle_not_found(battle_id: &str) -> Self {
        Self::new(
            EventName::BATTLE_NOT_FOUND,
            serde_json::json!({
                "battleId": battle_id,
                "message": "Battle not found",
            }),
        )
    }

    pub fn player_joined(connection_id: &str) -> Self {
        Self::new(
            EventName::PLAYER_JOINED,
            serde_json::json!({ "playerId": connection_id }),
        )
    }

    pub fn battle_ended(battle_id: &str, reason: EndReason) -> Self {
        Self::new(
            EventName::BATTLE_ENDED,
            serde_json::json!({
                "battleId": battle_id,
                "reason": reason,
                "message": reason.message(),
            }),
        )
    }

    pub fn error(message: &str) -> Self {
        Self::new(EventName::ERROR, serde_json::json!({ "message": message }))
    }

    pub fn server_shutdown() -> Self {
        Self::new(
            EventName::SERVER_SHUTDOWN,
            serde_json::json!({ "message": "Server is shutting down" }),
        )
    }
}

/// Why a battle left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    OpponentDisconnected,
    Terminated,
}

impl EndReason {
    fn message(self) -> &'static str {
        match self {
            EndReason::OpponentDisconnected => "Session ended: opponent disconnected",
            EndReason::Terminated => "Session ended: battle terminated",
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server message
// ---------------------------------------------------------------------------

/// A message received from the client over WebSocket.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    pub t: String,
    #[serde(default)]
    pub d: Value,
}

// ---------------------------------------------------------------------------
// joinGame payload
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGamePayload {
    pub battle_id: String,
}

// ---------------------------------------------------------------------------
// joinBattle payload
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinBattlePayload {
    pub battle_id: String,
    pub player_address: String,
    pub name: String,
    pub pokemon_id: i64,
    pub hp: i32,
    pub moves: Vec<Move>,
}

impl JoinBattlePayload {
    /// Reject payloads that parse but cannot identify a battle or a player.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.battle_id.trim().is_empty() {
            return Err("battleId must not be empty");
        }
        if self.player_address.trim().is_empty() {
            return Err("playerAddress must not be empty");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Event names used on the wire.
pub struct EventName;

impl EventName {
    // Client → Server
    pub const JOIN_GAME: &'static str = "joinGame";
    pub const JOIN_BATTLE: &'static str = "joinBattle";
    pub const JOIN_BATTLE_ROOM: &'static str = "join-battle-room";

    // Server → Client
    pub const CONNECTED: &'static str = "connected";
    pub const WAITING_FOR_OPPONENT: &'static str = "waitingForOpponent";
    pub const BATTLE_READY: &'static str = "battleReady";
    pub const BATTLE_RESULT: &'static str = "battleResult";
    pub const BATTLE_FULL: &'static str = "battleFull";
    pub const ALREADY_JOINED: &'static str = "alreadyJoined";
    pub const BATTLE_NOT_FOUND: &'static str = "battleNotFound";
    pub const PLAYER_JOINED: &'static str = "player-joined";
    pub const BATTLE_ENDED: &'static str = "battleEnded";
    pub const ERROR: &'static str = "error";
    pub const SERVER_SHUTDOWN: &'static str = "serverShutdown";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_battle_payload_parses_camel_case() {
        let d = serde_json::json!({
            "battleId": "btl_1",
            "playerAddress": "0xabc",
            "name": "Bulbasaur",
            "pokemonId": 1,
            "hp": 45,
            "moves": [{ "attackName": "Vine Whip", "attackPower": 45, "agility": 3 }],
        });
        let payload: JoinBattlePayload = serde_json::from_value(d).unwrap();
        assert_eq!(payload.battle_id, "btl_1");
        assert_eq!(payload.moves[0].attack_name, "Vine Whip");
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn join_battle_payload_missing_field_is_rejected() {
        let d = serde_json::json!({
            "battleId": "btl_1",
            "name": "Bulbasaur",
            "pokemonId": 1,
            "hp": 45,
            "moves": [],
        });
        assert!(serde_json::from_value::<JoinBattlePayload>(d).is_err());
    }

    #[test]
    fn blank_address_fails_validation() {
        let payload = JoinBattlePayload {
            battle_id: "btl_1".to_string(),
            player_address: "  ".to_string(),
            name: "Squirtle".to_string(),
            pokemon_id: 7,
            hp: 44,
            moves: vec![],
        };
        assert_eq!(payload.validate(), Err("playerAddress must not be empty"));
    }

    #[test]
    fn client_message_without_data_defaults_to_null() {
        let msg: ClientMessage = serde_json::from_str(r#"{"t":"joinGame"}"#).unwrap();
        assert_eq!(msg.t, EventName::JOIN_GAME);
        assert!(msg.d.is_null());
    }

    #[test]
    fn waiting_message_shape() {
        let msg = GatewayMessage::waiting_for_opponent("btl_1", 1);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["t"], "waitingForOpponent");
        assert_eq!(json["d"]["battleId"], "btl_1");
        assert_eq!(json["d"]["playerNumber"], 1);
        assert!(json["d"]["message"].is_string());
    }

    #[test]
    fn battle_ended_carries_reason() {
        let msg = GatewayMessage::battle_ended("btl_1", EndReason::OpponentDisconnected);
        assert_eq!(msg.t, EventName::BATTLE_ENDED);
        assert_eq!(msg.d["reason"], "opponentDisconnected");
        assert_eq!(msg.d["message"], "Session ended: opponent disconnected");
    }
}
