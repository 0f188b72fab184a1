use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Turn counter value before both players are seated.
pub const PRE_BATTLE_TURN: u32 = 0;

/// Turn counter value once the battle becomes ready.
pub const FIRST_TURN: u32 = 1;

/// A single attack a combatant can use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    pub attack_name: String,
    pub attack_power: i32,
    pub agility: i32,
}

/// The combatant a player brings into the battle.
#[derive(Debug, Clone, PartialEq)]
pub struct Pokemon {
    pub id: i64,
    pub name: String,
    pub hp: i32,
    pub moves: Vec<Move>,
}

/// A seated player. `address` is the player's identity within a battle and
/// is accepted as an opaque token.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub address: String,
    /// Gateway connection that claimed the slot.
    pub connection_id: String,
    pub pokemon: Pokemon,
}

/// Winner and loser addresses, recorded once when combat resolves.
#[derive(Debug, Clone, PartialEq)]
pub struct BattleResult {
    pub winner: String,
    pub loser: String,
}

/// One battle's full state. Owned by the registry and mutated only through it.
#[derive(Debug)]
pub struct Battle {
    pub id: String,
    pub slots: [Option<Player>; 2],
    pub active: bool,
    pub turn: u32,
    pub result: Option<BattleResult>,
    pub created_at: DateTime<Utc>,
    /// Set when the battle leaves the registry. A handle obtained before the
    /// removal must treat the battle as gone.
    pub ended: bool,
}

impl Battle {
    pub fn new(id: String) -> Self {
        Self {
            id,
            slots: [None, None],
            active: false,
            turn: PRE_BATTLE_TURN,
            result: None,
            created_at: Utc::now(),
            ended: false,
        }
    }

    pub fn is_seated(&self, address: &str) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|p| p.address == address)
    }

    pub fn seated_connection(&self, connection_id: &str) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|p| p.connection_id == connection_id)
    }

    pub fn snapshot(&self) -> BattleState {
        let [p1, p2] = &self.slots;
        BattleState {
            battle_id: self.id.clone(),
            player1_address: p1.as_ref().map(|p| p.address.clone()),
            player2_address: p2.as_ref().map(|p| p.address.clone()),
            pokemon1_id: p1.as_ref().map(|p| p.pokemon.id),
            pokemon2_id: p2.as_ref().map(|p| p.pokemon.id),
            pokemon1_name: p1.as_ref().map(|p| p.pokemon.name.clone()),
            pokemon2_name: p2.as_ref().map(|p| p.pokemon.name.clone()),
            pokemon1_hp: p1.as_ref().map(|p| p.pokemon.hp),
            pokemon2_hp: p2.as_ref().map(|p| p.pokemon.hp),
            pokemon1_moves: p1.as_ref().map(|p| p.pokemon.moves.clone()),
            pokemon2_moves: p2.as_ref().map(|p| p.pokemon.moves.clone()),
            current_turn: self.turn,
            winner: self.result.as_ref().map(|r| r.winner.clone()),
            loser: self.result.as_ref().map(|r| r.loser.clone()),
            is_active: self.active,
            created_at: self.created_at,
        }
    }
}

/// Wire snapshot of a battle, sent in `battleReady` and by the state endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BattleState {
    pub battle_id: String,
    pub player1_address: Option<String>,
    pub player2_address: Option<String>,
    pub pokemon1_id: Option<i64>,
    pub pokemon2_id: Option<i64>,
    pub pokemon1_name: Option<String>,
    pub pokemon2_name: Option<String>,
    #[serde(rename = "pokemon1HP")]
    pub pokemon1_hp: Option<i32>,
    #[serde(rename = "pokemon2HP")]
    pub pokemon2_hp: Option<i32>,
    pub pokemon1_moves: Option<Vec<Move>>,
    pub pokemon2_moves: Option<Vec<Move>>,
    pub current_turn: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loser: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
