//! Battle registry: the single owner of every live battle.
//!
//! Uses `DashMap` for shard-level concurrency and a `parking_lot::Mutex` per
//! battle, so joins against one battle are serialized while battles on
//! different entries never wait on each other. Map guards are always released
//! before a battle lock is taken.

use std::sync::Arc;

use battle_common::id::{prefix, prefixed_ulid};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::models::battle::{Battle, BattleResult, BattleState, Player, FIRST_TURN};

/// How many fresh identifiers `create` tries before giving up.
const MAX_ID_ATTEMPTS: usize = 8;

/// Result of a join attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    /// The player took the first slot and waits for an opponent.
    Waiting { player_number: u8 },
    /// The player took the second slot; the battle is now active.
    Ready(BattleState),
    /// Both slots are taken by other players.
    SessionFull,
    /// The player's address already holds a slot. Nothing changed.
    AlreadyJoined,
    /// No such battle (never created, or already removed).
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("battle identifier space exhausted")]
    ResourceExhausted,
    #[error("battle not found")]
    NotFound,
    #[error("battle is not active")]
    NotActive,
    #[error("battle result already recorded")]
    ResultAlreadyRecorded,
    #[error("winner and loser must be the two seated players")]
    UnknownPlayer,
}

pub struct BattleRegistry {
    battles: DashMap<String, Arc<Mutex<Battle>>>,
}

impl Default for BattleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BattleRegistry {
    pub fn new() -> Self {
        Self {
            battles: DashMap::new(),
        }
    }

    /// Allocate a new battle with both slots empty and return its id.
    pub fn create(&self) -> Result<String, RegistryError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = prefixed_ulid(prefix::BATTLE);
            if let Entry::Vacant(slot) = self.battles.entry(id.clone()) {
                slot.insert(Arc::new(Mutex::new(Battle::new(id.clone()))));
                tracing::info!(battle_id = %id, "battle created");
                return Ok(id);
            }
        }
        tracing::error!(attempts = MAX_ID_ATTEMPTS, "could not allocate a battle id");
        Err(RegistryError::ResourceExhausted)
    }

    pub fn exists(&self, battle_id: &str) -> bool {
        self.battles.contains_key(battle_id)
    }

    pub fn len(&self) -> usize {
        self.battles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.battles.is_empty()
    }

    /// Seat `player` in the first empty slot of the battle.
    ///
    /// Identity is the player's address: a second join with a seated address
    /// is rejected as `AlreadyJoined` even when the battle is full. A
    /// connection holds at most one slot, so a seated connection joining
    /// under another address is `AlreadyJoined` too.
    pub fn join(&self, battle_id: &str, player: Player) -> JoinOutcome {
        let Some(handle) = self.handle(battle_id) else {
            return JoinOutcome::NotFound;
        };
        let mut battle = handle.lock();

        if battle.ended {
            return JoinOutcome::NotFound;
        }
        if battle.is_seated(&player.address) || battle.seated_connection(&player.connection_id) {
            return JoinOutcome::AlreadyJoined;
        }
        let Some(index) = battle.slots.iter().position(Option::is_none) else {
            return JoinOutcome::SessionFull;
        };

        battle.slots[index] = Some(player);

        if battle.slots.iter().all(Option::is_some) {
            battle.active = true;
            battle.turn = FIRST_TURN;
            JoinOutcome::Ready(battle.snapshot())
        } else {
            JoinOutcome::Waiting {
                player_number: (index + 1) as u8,
            }
        }
    }

    /// Snapshot of a live battle.
    pub fn snapshot(&self, battle_id: &str) -> Option<BattleState> {
        let handle = self.handle(battle_id)?;
        let battle = handle.lock();
        (!battle.ended).then(|| battle.snapshot())
    }

    /// Whether `connection_id` holds a slot in a live battle.
    pub fn holds_seat(&self, battle_id: &str, connection_id: &str) -> bool {
        self.handle(battle_id).is_some_and(|handle| {
            let battle = handle.lock();
            !battle.ended && battle.seated_connection(connection_id)
        })
    }

    /// Remove a battle. Returns its final state, or `None` if it was already gone.
    pub fn remove(&self, battle_id: &str) -> Option<BattleState> {
        let (_, handle) = self.battles.remove(battle_id)?;
        let mut battle = handle.lock();
        battle.ended = true;
        battle.active = false;
        Some(battle.snapshot())
    }

    /// Remove a battle only if `connection_id` holds one of its slots.
    pub fn remove_seated(&self, battle_id: &str, connection_id: &str) -> Option<BattleState> {
        let handle = self.handle(battle_id)?;
        let state = {
            let mut battle = handle.lock();
            if battle.ended || !battle.seated_connection(connection_id) {
                return None;
            }
            battle.ended = true;
            battle.active = false;
            battle.snapshot()
        };
        self.battles
            .remove_if(battle_id, |_, entry| Arc::ptr_eq(entry, &handle));
        Some(state)
    }

    /// Record the outcome of an active battle. The result can be set once;
    /// recording it ends the battle.
    pub fn record_result(
        &self,
        battle_id: &str,
        result: BattleResult,
    ) -> Result<BattleState, RegistryError> {
        let handle = self.handle(battle_id).ok_or(RegistryError::NotFound)?;
        let mut battle = handle.lock();

        if battle.ended {
            return Err(RegistryError::NotFound);
        }
        if battle.result.is_some() {
            return Err(RegistryError::ResultAlreadyRecorded);
        }
        if !battle.active {
            return Err(RegistryError::NotActive);
        }
        if result.winner == result.loser
            || !battle.is_seated(&result.winner)
            || !battle.is_seated(&result.loser)
        {
            return Err(RegistryError::UnknownPlayer);
        }

        battle.result = Some(result);
        battle.active = false;
        Ok(battle.snapshot())
    }

    fn handle(&self, battle_id: &str) -> Option<Arc<Mutex<Battle>>> {
        self.battles.get(battle_id).map(|entry| Arc::clone(entry.value()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;

    use super::*;
    use crate::models::battle::{Move, Pokemon};

    fn player(address: &str) -> Player {
        Player {
            address: address.to_string(),
            connection_id: format!("conn_{address}"),
            pokemon: Pokemon {
                id: 4,
                name: "Charmander".to_string(),
                hp: 39,
                moves: vec![Move {
                    attack_name: "Ember".to_string(),
                    attack_power: 40,
                    agility: 5,
                }],
            },
        }
    }

    #[test]
    fn full_lifecycle_scenario() {
        let registry = BattleRegistry::new();
        assert!(!registry.exists("btl_missing"));

        let id = registry.create().unwrap();
        assert!(id.starts_with("btl_"));
        assert!(registry.exists(&id));

        let before = registry.snapshot(&id).unwrap();
        assert!(!before.is_active);
        assert_eq!(before.current_turn, 0);

        assert_eq!(
            registry.join(&id, player("p1")),
            JoinOutcome::Waiting { player_number: 1 }
        );
        assert!(!registry.snapshot(&id).unwrap().is_active);

        let state = match registry.join(&id, player("p2")) {
            JoinOutcome::Ready(state) => state,
            other => panic!("expected Ready, got {other:?}"),
        };
        assert!(state.is_active);
        assert_eq!(state.current_turn, 1);
        assert_eq!(state.player1_address.as_deref(), Some("p1"));
        assert_eq!(state.player2_address.as_deref(), Some("p2"));

        assert_eq!(registry.join(&id, player("p1")), JoinOutcome::AlreadyJoined);
        assert_eq!(registry.join(&id, player("p3")), JoinOutcome::SessionFull);

        // Rejections leave the battle untouched.
        assert_eq!(registry.snapshot(&id).unwrap(), state);

        assert!(registry.remove_seated(&id, "conn_p2").is_some());
        assert!(!registry.exists(&id));
    }

    #[test]
    fn join_unknown_battle_is_not_found_and_creates_nothing() {
        let registry = BattleRegistry::new();
        assert_eq!(registry.join("btl_nope", player("p1")), JoinOutcome::NotFound);
        assert!(registry.is_empty());
        assert!(!registry.exists("btl_nope"));
    }

    #[test]
    fn rejoin_while_waiting_is_already_joined() {
        let registry = BattleRegistry::new();
        let id = registry.create().unwrap();

        registry.join(&id, player("p1"));
        assert_eq!(registry.join(&id, player("p1")), JoinOutcome::AlreadyJoined);

        let state = registry.snapshot(&id).unwrap();
        assert!(!state.is_active);
        assert!(state.player2_address.is_none());
    }

    #[test]
    fn seated_connection_cannot_take_second_slot() {
        let registry = BattleRegistry::new();
        let id = registry.create().unwrap();

        registry.join(&id, player("p1"));
        let mut other_address = player("p2");
        other_address.connection_id = "conn_p1".to_string();
        assert_eq!(registry.join(&id, other_address), JoinOutcome::AlreadyJoined);

        let state = registry.snapshot(&id).unwrap();
        assert!(!state.is_active);
        assert!(state.player2_address.is_none());
    }

    #[test]
    fn concurrent_joins_produce_one_waiting_and_one_ready() {
        const JOINERS: usize = 16;

        for _ in 0..20 {
            let registry = BattleRegistry::new();
            let id = registry.create().unwrap();
            let barrier = Barrier::new(JOINERS);

            let outcomes: Vec<JoinOutcome> = std::thread::scope(|scope| {
                let handles: Vec<_> = (0..JOINERS)
                    .map(|i| {
                        let registry = &registry;
                        let barrier = &barrier;
                        let id = &id;
                        scope.spawn(move || {
                            barrier.wait();
                            registry.join(id, player(&format!("p{i}")))
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            let waiting = outcomes
                .iter()
                .filter(|o| matches!(o, JoinOutcome::Waiting { player_number: 1 }))
                .count();
            let ready = outcomes
                .iter()
                .filter(|o| matches!(o, JoinOutcome::Ready(_)))
                .count();
            let full = outcomes
                .iter()
                .filter(|o| matches!(o, JoinOutcome::SessionFull))
                .count();

            assert_eq!(waiting, 1);
            assert_eq!(ready, 1);
            assert_eq!(full, JOINERS - 2);

            let state = registry.snapshot(&id).unwrap();
            assert!(state.is_active);
            assert_ne!(state.player1_address, state.player2_address);
        }
    }

    #[test]
    fn joins_on_different_battles_are_independent() {
        let registry = BattleRegistry::new();
        let a = registry.create().unwrap();
        let b = registry.create().unwrap();
        assert_ne!(a, b);

        assert!(matches!(registry.join(&a, player("p1")), JoinOutcome::Waiting { .. }));
        assert!(matches!(registry.join(&b, player("p1")), JoinOutcome::Waiting { .. }));
        assert!(matches!(registry.join(&a, player("p2")), JoinOutcome::Ready(_)));
        assert!(!registry.snapshot(&b).unwrap().is_active);
    }

    #[test]
    fn remove_is_idempotent_and_blocks_joins() {
        let registry = BattleRegistry::new();
        let id = registry.create().unwrap();
        registry.join(&id, player("p1"));

        let last = registry.remove(&id).unwrap();
        assert!(!last.is_active);
        assert!(registry.remove(&id).is_none());
        assert!(!registry.exists(&id));
        assert!(registry.snapshot(&id).is_none());
        assert_eq!(registry.join(&id, player("p2")), JoinOutcome::NotFound);
    }

    #[test]
    fn stale_handle_sees_removed_battle_as_ended() {
        let registry = BattleRegistry::new();
        let id = registry.create().unwrap();
        let handle = registry.handle(&id).unwrap();

        registry.remove(&id);

        let battle = handle.lock();
        assert!(battle.ended);
        assert!(!battle.active);
    }

    #[test]
    fn remove_seated_ignores_unseated_connections() {
        let registry = BattleRegistry::new();
        let id = registry.create().unwrap();
        registry.join(&id, player("p1"));

        assert!(registry.remove_seated(&id, "conn_spectator").is_none());
        assert!(registry.exists(&id));
        assert!(registry.holds_seat(&id, "conn_p1"));
        assert!(!registry.holds_seat(&id, "conn_spectator"));

        let state = registry.remove_seated(&id, "conn_p1").unwrap();
        assert_eq!(state.player1_address.as_deref(), Some("p1"));
        assert!(!registry.exists(&id));
        assert!(registry.remove_seated(&id, "conn_p1").is_none());
    }

    #[test]
    fn record_result_once_on_active_battle() {
        let registry = BattleRegistry::new();
        let id = registry.create().unwrap();
        let result = || BattleResult {
            winner: "p1".to_string(),
            loser: "p2".to_string(),
        };

        registry.join(&id, player("p1"));
        assert_eq!(
            registry.record_result(&id, result()),
            Err(RegistryError::NotActive)
        );

        registry.join(&id, player("p2"));
        let stranger = BattleResult {
            winner: "p1".to_string(),
            loser: "p9".to_string(),
        };
        assert_eq!(
            registry.record_result(&id, stranger),
            Err(RegistryError::UnknownPlayer)
        );

        let state = registry.record_result(&id, result()).unwrap();
        assert_eq!(state.winner.as_deref(), Some("p1"));
        assert_eq!(state.loser.as_deref(), Some("p2"));
        assert!(!state.is_active);

        assert_eq!(
            registry.record_result(&id, result()),
            Err(RegistryError::ResultAlreadyRecorded)
        );
        assert_eq!(
            registry.record_result("btl_nope", result()),
            Err(RegistryError::NotFound)
        );
    }
}
