//! World-level registry of live maps and the two background schedulers.
//!
//! Each map sits behind its own mutex; every mutation funnels through
//! that one lock so a broadcast always sees a consistent snapshot.
//! Cross-map moves release the source lock completely before touching
//! the destination.

use crate::config::Limits;
use crate::entities::character::{Character, CharacterId};
use crate::telemetry::logging;
use crate::world::map::Map;
use crate::world::tile::KeyTable;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Fixed cadence of the chest replenishment sweep.
pub const CHEST_RESPAWN_INTERVAL_MS: u64 = 60_000;

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub struct WorldState {
    maps: HashMap<u16, Arc<Mutex<Map>>>,
    limits: Limits,
    keys: KeyTable,
}

impl WorldState {
    pub fn new(limits: Limits, keys: KeyTable) -> Self {
        Self {
            maps: HashMap::new(),
            limits,
            keys,
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn keys(&self) -> &KeyTable {
        &self.keys
    }

    /// Loads every `.emf` file in `map_dir`. Maps that fail to decode are
    /// kept as non-existing placeholders so later lookups stay cheap.
    /// Returns the number of maps brought online.
    pub fn load(&mut self, map_dir: &Path, now_ms: u64) -> Result<usize, String> {
        let entries = std::fs::read_dir(map_dir)
            .map_err(|err| format!("failed to read {}: {}", map_dir.display(), err))?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| format!("map directory walk failed: {}", err))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("emf") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match stem.parse::<u16>() {
                Ok(id) => ids.push(id),
                Err(_) => {
                    logging::log_error(&format!("ignoring map file {}", path.display()));
                }
            }
        }
        ids.sort_unstable();

        let mut loaded = 0;
        for id in ids {
            let map = Map::load(id, map_dir, self.limits, now_ms);
            if map.exists {
                loaded += 1;
            }
            self.maps.insert(id, Arc::new(Mutex::new(map)));
        }

        logging::log_game(&format!("{} maps loaded", loaded));
        logging::log_load(loaded as u64);
        Ok(loaded)
    }

    pub fn map(&self, id: u16) -> Option<Arc<Mutex<Map>>> {
        self.maps.get(&id).cloned()
    }

    pub fn insert_map(&mut self, map: Map) {
        self.maps.insert(map.id, Arc::new(Mutex::new(map)));
    }

    pub fn map_count(&self) -> usize {
        self.maps.len()
    }

    /// Moves a character between maps. The source lock is fully released
    /// before the destination lock is taken; when the destination turns
    /// out to be missing the character re-enters the source map, so an
    /// error never strands it off every map.
    pub fn warp_character(
        &self,
        id: CharacterId,
        from: u16,
        to: u16,
        x: u8,
        y: u8,
        animation: u8,
    ) -> Result<(), String> {
        let source = self
            .map(from)
            .ok_or_else(|| format!("warp source map {} unknown", from))?;
        let character = {
            let mut source = source
                .lock()
                .map_err(|_| format!("map {} lock poisoned", from))?;
            source
                .leave(id, animation, false)
                .ok_or_else(|| format!("character not on map {}", from))?
        };

        let Some(destination) = self.map(to) else {
            Self::put_back(&source, character, animation);
            return Err(format!("warp target map {} unknown", to));
        };
        let mut destination = match destination.lock() {
            Ok(destination) => destination,
            Err(_) => {
                Self::put_back(&source, character, animation);
                return Err(format!("map {} lock poisoned", to));
            }
        };
        if !destination.exists {
            drop(destination);
            Self::put_back(&source, character, animation);
            return Err(format!("warp target map {} does not exist", to));
        }
        let mut character = character;
        character.x = x;
        character.y = y;
        destination.enter(character, animation);
        Ok(())
    }

    fn put_back(source: &Arc<Mutex<Map>>, character: Character, animation: u8) {
        if let Ok(mut source) = source.lock() {
            source.enter(character, animation);
        }
    }

    /// Periodic sweep refilling due chest slots on every map that owns a
    /// chest.
    pub fn chest_respawn_tick(&self, now_ms: u64) {
        for map in self.maps.values() {
            let Ok(mut map) = map.lock() else {
                continue;
            };
            if map.exists && !map.chests.is_empty() {
                map.spawn_chests(now_ms);
            }
        }
    }

    /// Closes doors whose auto-close deadline has passed, on every map.
    pub fn pump_door_timers(&self, now_ms: u64) {
        for map in self.maps.values() {
            let Ok(mut map) = map.lock() else {
                continue;
            };
            map.pump_doors(now_ms);
        }
    }

    pub fn summary(&self) -> String {
        let mut existing = 0;
        let mut chests = 0;
        let mut npcs = 0;
        for map in self.maps.values() {
            let Ok(map) = map.lock() else {
                continue;
            };
            if map.exists {
                existing += 1;
                chests += map.chests.len();
                npcs += map.npcs.len();
            }
        }
        format!(
            "maps: {} ({} loaded), chests: {}, npcs: {}",
            self.maps.len(),
            existing,
            chests,
            npcs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::character::PlayerId;
    use crate::net::packet::{Packet, PacketAction, PacketFamily};
    use crate::world::chest::ChestSpawnRule;
    use crate::world::map_file::map_file_name;
    use crate::world::tile::Tile;
    use std::sync::mpsc::Receiver;

    const NOW: u64 = 3_000_000;

    fn live_map(id: u16) -> Map {
        let mut map = Map::empty(id, Limits::default());
        map.exists = true;
        map.width = 20;
        map.height = 20;
        map.tiles = vec![Tile::default(); 400];
        map
    }

    fn world_with_maps(ids: &[u16]) -> WorldState {
        let mut world = WorldState::new(Limits::default(), KeyTable::default());
        for &id in ids {
            world.insert_map(live_map(id));
        }
        world
    }

    fn joined_character(
        world: &WorldState,
        map_id: u16,
        id: u32,
        name: &str,
        x: u8,
        y: u8,
    ) -> Receiver<Packet> {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut character = Character::new(CharacterId(id), PlayerId(id as u16), name, tx);
        character.x = x;
        character.y = y;
        let map = world.map(map_id).expect("map");
        map.lock().expect("lock").enter(character, 0);
        while rx.try_recv().is_ok() {}
        rx
    }

    #[test]
    fn warp_moves_character_across_maps() {
        let world = world_with_maps(&[1, 2]);
        let _rx = joined_character(&world, 1, 7, "Wren", 5, 5);

        world
            .warp_character(CharacterId(7), 1, 2, 9, 4, 0)
            .expect("warp");

        let source = world.map(1).expect("map");
        assert!(source.lock().expect("lock").characters.is_empty());
        let target = world.map(2).expect("map");
        let target = target.lock().expect("lock");
        let character = target.character_by_id(CharacterId(7)).expect("character");
        assert_eq!((character.x, character.y), (9, 4));
        assert_eq!(character.map_id, 2);
    }

    #[test]
    fn warp_to_missing_map_keeps_character_on_source() {
        let mut world = world_with_maps(&[1]);
        world.insert_map(Map::empty(9, Limits::default()));
        let _rx = joined_character(&world, 1, 7, "Wren", 5, 5);

        // Unregistered target map.
        let err = world.warp_character(CharacterId(7), 1, 8, 0, 0, 0).unwrap_err();
        assert!(err.contains("map 8"), "{err}");
        let source = world.map(1).expect("map");
        {
            let source = source.lock().expect("lock");
            let character = source.character_by_id(CharacterId(7)).expect("character");
            assert_eq!(character.map_id, 1);
            assert_eq!((character.x, character.y), (5, 5));
        }

        // Registered but failed-to-load target map.
        let err = world.warp_character(CharacterId(7), 1, 9, 0, 0, 0).unwrap_err();
        assert!(err.contains("map 9"), "{err}");
        let source = source.lock().expect("lock");
        assert!(source.character_by_id(CharacterId(7)).is_some());
    }

    #[test]
    fn chest_tick_sweeps_every_map() {
        let mut world = world_with_maps(&[]);
        let mut map = live_map(1);
        let mut chest = crate::world::chest::Chest::new(4, 4);
        chest.spawns.push(ChestSpawnRule {
            slot: 1,
            minutes: 30,
            item_id: 379,
            amount: 1,
            last_taken_ms: 0,
        });
        chest.slots = 1;
        map.chests.push(chest);
        world.insert_map(map);

        let rx = joined_character(&world, 1, 7, "Wren", 4, 5);

        world.chest_respawn_tick(29 * 60_000);
        assert!(rx.try_recv().is_err());

        world.chest_respawn_tick(30 * 60_000);
        let packet = rx.try_recv().expect("chest update");
        assert!(packet.is(PacketFamily::Chest, PacketAction::Agree));
    }

    #[test]
    fn load_scans_emf_files_and_keeps_failures_as_placeholders() {
        let dir = std::env::temp_dir().join(format!("world-load-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("tempdir");

        // A structurally valid minimal map and one truncated file.
        let mut data = vec![254u8; 0x2E];
        data[0] = b'E';
        data[1] = b'M';
        data[2] = b'F';
        data.extend_from_slice(&[1, 1, 1, 1, 1]);
        std::fs::write(dir.join(map_file_name(1)), &data).expect("write");
        std::fs::write(dir.join(map_file_name(2)), [0u8; 4]).expect("write");
        std::fs::write(dir.join("notes.txt"), b"ignored").expect("write");

        let mut world = WorldState::new(Limits::default(), KeyTable::default());
        let loaded = world.load(&dir, NOW).expect("load");
        assert_eq!(loaded, 1);
        assert_eq!(world.map_count(), 2);

        let good = world.map(1).expect("map 1");
        assert!(good.lock().expect("lock").exists);
        let bad = world.map(2).expect("map 2");
        assert!(!bad.lock().expect("lock").exists);
        assert!(world.map(3).is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
