//! Live NPC instances and the spawn directives that produce them.

use crate::entities::character::PlayerId;
use crate::world::position::Direction;

/// Spawn directive from the map file: where an NPC of `id` appears and
/// how long a respawn takes after it dies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NpcSpawn {
    pub id: u16,
    pub x: u8,
    pub y: u8,
    pub spawn_type: u8,
    pub respawn_minutes: u16,
    pub amount: u8,
}

#[derive(Debug, Clone)]
pub struct Npc {
    /// Map-local index used on the wire.
    pub index: u8,
    pub id: u16,
    pub x: u8,
    pub y: u8,
    pub direction: Direction,
    pub alive: bool,
    pub spawn: NpcSpawn,
    /// Players this NPC currently has aggro on.
    tracking: Vec<PlayerId>,
}

impl Npc {
    pub fn from_spawn(index: u8, spawn: NpcSpawn) -> Self {
        Self {
            index,
            id: spawn.id,
            x: spawn.x,
            y: spawn.y,
            direction: Direction::Down,
            alive: true,
            spawn,
            tracking: Vec::new(),
        }
    }

    /// Starts tracking `player` unless already doing so.
    pub fn track(&mut self, player: PlayerId) {
        if !self.tracking.contains(&player) {
            self.tracking.push(player);
        }
    }

    /// Forgets `player`, typically because they left visible range or
    /// the map.
    pub fn drop_tracking(&mut self, player: PlayerId) {
        self.tracking.retain(|tracked| *tracked != player);
    }

    pub fn is_tracking(&self, player: PlayerId) -> bool {
        self.tracking.contains(&player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npc() -> Npc {
        Npc::from_spawn(
            0,
            NpcSpawn {
                id: 170,
                x: 8,
                y: 9,
                spawn_type: 7,
                respawn_minutes: 15,
                amount: 1,
            },
        )
    }

    #[test]
    fn tracking_is_deduplicated() {
        let mut npc = npc();
        npc.track(PlayerId(1));
        npc.track(PlayerId(1));
        npc.track(PlayerId(2));
        assert!(npc.is_tracking(PlayerId(1)));
        assert!(npc.is_tracking(PlayerId(2)));
        npc.drop_tracking(PlayerId(1));
        assert!(!npc.is_tracking(PlayerId(1)));
        assert!(npc.is_tracking(PlayerId(2)));
    }

    #[test]
    fn spawn_seeds_position_and_id() {
        let npc = npc();
        assert!(npc.alive);
        assert_eq!((npc.id, npc.x, npc.y), (170, 8, 9));
        assert_eq!(npc.direction, Direction::Down);
    }
}
