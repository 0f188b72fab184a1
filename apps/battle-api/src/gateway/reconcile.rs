//! Disconnect handling: tear down battles the lost connection was seated in.
//!
//! A seated player leaving ends the battle. Anyone left in the battle's room
//! gets `battleEnded` before the room is dissolved; a room with nobody left is
//! removed silently. Room-only memberships are simply dropped.

use crate::AppState;

use super::events::{EndReason, GatewayMessage};
use super::fanout::Room;

pub fn handle_disconnect(state: &AppState, connection_id: &str) {
    let rooms = state.hub.unregister(connection_id);

    for battle_id in rooms.iter().filter_map(Room::battle_id) {
        let Some(last_state) = state.battles.remove_seated(battle_id, connection_id) else {
            continue;
        };

        let room = Room::Battle(battle_id.to_string());
        let notified = state.hub.broadcast_room(
            &room,
            GatewayMessage::battle_ended(battle_id, EndReason::OpponentDisconnected),
        );
        state.hub.dissolve(&room);

        tracing::info!(
            battle_id = %battle_id,
            connection_id = %connection_id,
            both_seated = last_state.player2_address.is_some(),
            notified,
            remaining_battles = state.battles.len(),
            "battle ended: player disconnected"
        );
    }
}
