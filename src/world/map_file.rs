//! Decoder for the binary map file format.
//!
//! Header fields live at fixed offsets; the section area at 0x2E is read
//! in two passes because tile specs and warps come after the spawn
//! sections, yet chest spawn rules can only be attached once the chest
//! tiles are known.

use crate::net::packet::PacketReader;
use crate::telemetry::logging;
use crate::world::chest::{Chest, ChestSpawnRule};
use crate::world::npc::NpcSpawn;
use crate::world::tile::{Tile, TileSpec, Warp, WarpSpec};

const OFF_RID: usize = 0x03;
const OFF_PK: usize = 0x1F;
const OFF_MUSIC: usize = 0x21;
const OFF_SIZE: usize = 0x25;
const OFF_SCROLL: usize = 0x2A;
const OFF_SECTIONS: usize = 0x2E;

/// Decoded, static contents of one map file.
#[derive(Debug, Clone)]
pub struct MapFile {
    pub id: u16,
    /// Revision id, sent verbatim to clients for cache validation.
    pub rid: [u8; 4],
    pub pk: bool,
    pub effect: u8,
    pub music: u8,
    pub width: u8,
    pub height: u8,
    pub scroll: u8,
    pub relog_x: u8,
    pub relog_y: u8,
    pub tiles: Vec<Tile>,
    pub chests: Vec<Chest>,
    pub npc_spawns: Vec<NpcSpawn>,
    pub has_timed_spikes: bool,
    pub file_size: usize,
}

/// File name a map id is stored under, zero-padded to five digits.
pub fn map_file_name(id: u16) -> String {
    format!("{:05}.emf", id)
}

fn need<T>(value: Option<T>, id: u16, what: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("map {}: file truncated in {}", id, what))
}

impl MapFile {
    /// Decodes a raw map file. `now_ms` seeds the respawn clock of every
    /// chest spawn rule, so freshly loaded chests fill after one full
    /// interval rather than immediately.
    pub fn decode(id: u16, bytes: &[u8], now_ms: u64) -> Result<Self, String> {
        let mut reader = PacketReader::new(bytes);

        need(reader.seek(OFF_RID), id, "header")?;
        let rid_bytes = need(reader.read_bytes(4), id, "header")?;
        let mut rid = [0u8; 4];
        rid.copy_from_slice(rid_bytes);

        need(reader.seek(OFF_PK), id, "header")?;
        let pk = need(reader.read_char(), id, "header")? == 3;
        let effect = need(reader.read_char(), id, "header")?;

        need(reader.seek(OFF_MUSIC), id, "header")?;
        let music = need(reader.read_char(), id, "header")?;

        need(reader.seek(OFF_SIZE), id, "header")?;
        let width = need(reader.read_char(), id, "header")?.saturating_add(1);
        let height = need(reader.read_char(), id, "header")?.saturating_add(1);

        need(reader.seek(OFF_SCROLL), id, "header")?;
        let scroll = need(reader.read_char(), id, "header")?;
        let relog_x = need(reader.read_char(), id, "header")?;
        let relog_y = need(reader.read_char(), id, "header")?;

        let mut map = Self {
            id,
            rid,
            pk,
            effect,
            music,
            width,
            height,
            scroll,
            relog_x,
            relog_y,
            tiles: vec![Tile::default(); usize::from(width) * usize::from(height)],
            chests: Vec::new(),
            npc_spawns: Vec::new(),
            has_timed_spikes: false,
            file_size: bytes.len(),
        };

        // Pass 1: skip the spawn sections, read tile specs and warps.
        need(reader.seek(OFF_SECTIONS), id, "sections")?;
        let npc_count = need(reader.read_char(), id, "npc section")?;
        need(reader.skip(8 * usize::from(npc_count)), id, "npc section")?;
        let unknown_count = need(reader.read_char(), id, "unknown section")?;
        need(
            reader.skip(4 * usize::from(unknown_count)),
            id,
            "unknown section",
        )?;
        let chest_count = need(reader.read_char(), id, "chest section")?;
        need(
            reader.skip(12 * usize::from(chest_count)),
            id,
            "chest section",
        )?;

        map.read_tile_rows(&mut reader)?;
        map.read_warp_rows(&mut reader)?;

        // Pass 2: back to the spawn sections now that chest tiles exist.
        need(reader.seek(OFF_SECTIONS), id, "sections")?;
        map.read_npc_spawns(&mut reader)?;
        let unknown_count = need(reader.read_char(), id, "unknown section")?;
        need(
            reader.skip(4 * usize::from(unknown_count)),
            id,
            "unknown section",
        )?;
        map.read_chest_spawns(&mut reader, now_ms)?;

        Ok(map)
    }

    pub fn in_bounds(&self, x: u8, y: u8) -> bool {
        x < self.width && y < self.height
    }

    fn tile_index(&self, x: u8, y: u8) -> usize {
        usize::from(y) * usize::from(self.width) + usize::from(x)
    }

    fn read_tile_rows(&mut self, reader: &mut PacketReader) -> Result<(), String> {
        let id = self.id;
        let rows = need(reader.read_char(), id, "tile rows")?;
        for _ in 0..rows {
            let y = need(reader.read_char(), id, "tile rows")?;
            let cols = need(reader.read_char(), id, "tile rows")?;
            for _ in 0..cols {
                let x = need(reader.read_char(), id, "tile rows")?;
                let raw = need(reader.read_char(), id, "tile rows")?;
                if !self.in_bounds(x, y) {
                    continue;
                }
                let spec = TileSpec::from_raw(raw);
                let index = self.tile_index(x, y);
                self.tiles[index].spec = Some(spec);
                if spec == TileSpec::Chest {
                    self.chests.push(Chest::new(x, y));
                }
                if spec == TileSpec::TimedSpikes {
                    self.has_timed_spikes = true;
                }
            }
        }
        Ok(())
    }

    fn read_warp_rows(&mut self, reader: &mut PacketReader) -> Result<(), String> {
        let id = self.id;
        let rows = need(reader.read_char(), id, "warp rows")?;
        for _ in 0..rows {
            let y = need(reader.read_char(), id, "warp rows")?;
            let cols = need(reader.read_char(), id, "warp rows")?;
            for _ in 0..cols {
                let x = need(reader.read_char(), id, "warp rows")?;
                let target_map = need(reader.read_short(), id, "warp rows")?;
                let target_x = need(reader.read_char(), id, "warp rows")?;
                let target_y = need(reader.read_char(), id, "warp rows")?;
                let level_req = need(reader.read_char(), id, "warp rows")?;
                let spec = need(reader.read_short(), id, "warp rows")?;
                if !self.in_bounds(x, y) {
                    continue;
                }
                let index = self.tile_index(x, y);
                self.tiles[index].warp = Some(Warp::new(
                    target_map,
                    target_x,
                    target_y,
                    level_req,
                    WarpSpec::from_raw(spec),
                ));
            }
        }
        Ok(())
    }

    fn read_npc_spawns(&mut self, reader: &mut PacketReader) -> Result<(), String> {
        let id = self.id;
        let count = need(reader.read_char(), id, "npc section")?;
        for _ in 0..count {
            let x = need(reader.read_char(), id, "npc section")?;
            let y = need(reader.read_char(), id, "npc section")?;
            let npc_id = need(reader.read_short(), id, "npc section")?;
            let spawn_type = need(reader.read_char(), id, "npc section")?;
            let respawn_minutes = need(reader.read_short(), id, "npc section")?;
            let amount = need(reader.read_char(), id, "npc section")?;
            if !self.in_bounds(x, y) {
                logging::log_game(&format!(
                    "npc spawn outside map {} at {}x{}",
                    id, x, y
                ));
                continue;
            }
            self.npc_spawns.push(NpcSpawn {
                id: npc_id,
                x,
                y,
                spawn_type,
                respawn_minutes,
                amount,
            });
        }
        Ok(())
    }

    fn read_chest_spawns(&mut self, reader: &mut PacketReader, now_ms: u64) -> Result<(), String> {
        let id = self.id;
        let count = need(reader.read_char(), id, "chest section")?;
        for _ in 0..count {
            let x = need(reader.read_char(), id, "chest section")?;
            let y = need(reader.read_char(), id, "chest section")?;
            need(reader.skip(2), id, "chest section")?;
            let slot = need(reader.read_char(), id, "chest section")?;
            let item_id = need(reader.read_short(), id, "chest section")?;
            let minutes = need(reader.read_short(), id, "chest section")?;
            let amount = need(reader.read_three(), id, "chest section")?;

            // Rules only attach to an actual chest tile.
            let Some(chest) = self
                .chests
                .iter_mut()
                .find(|chest| chest.x == x && chest.y == y)
            else {
                continue;
            };
            let slot = slot.saturating_add(1);
            chest.spawns.push(ChestSpawnRule {
                slot,
                minutes,
                item_id,
                amount,
                last_taken_ms: now_ms,
            });
            chest.slots = chest.slots.max(usize::from(slot));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::packet::encode_number;

    const NOW: u64 = 1_000_000;

    fn c(value: u32) -> u8 {
        encode_number(value, 1)[0]
    }

    fn push_short(data: &mut Vec<u8>, value: u32) {
        data.extend_from_slice(&encode_number(value, 2));
    }

    fn push_three(data: &mut Vec<u8>, value: u32) {
        data.extend_from_slice(&encode_number(value, 3));
    }

    fn header(width: u32, height: u32) -> Vec<u8> {
        let mut data = vec![254u8; OFF_SECTIONS];
        data[0] = b'E';
        data[1] = b'M';
        data[2] = b'F';
        data[OFF_RID..OFF_RID + 4].copy_from_slice(&[10, 20, 30, 40]);
        data[OFF_PK] = c(3);
        data[OFF_PK + 1] = c(2);
        data[OFF_MUSIC] = c(5);
        data[OFF_SIZE] = c(width - 1);
        data[OFF_SIZE + 1] = c(height - 1);
        data[OFF_SCROLL] = c(0);
        data[OFF_SCROLL + 1] = c(4);
        data[OFF_SCROLL + 2] = c(6);
        data
    }

    fn empty_sections(data: &mut Vec<u8>) {
        data.extend_from_slice(&[c(0), c(0), c(0), c(0), c(0)]);
    }

    #[test]
    fn header_fields_decoded() {
        let mut data = header(9, 7);
        empty_sections(&mut data);
        let map = MapFile::decode(42, &data, NOW).expect("decode");
        assert_eq!(map.rid, [10, 20, 30, 40]);
        assert!(map.pk);
        assert_eq!(map.effect, 2);
        assert_eq!(map.music, 5);
        assert_eq!((map.width, map.height), (9, 7));
        assert_eq!((map.scroll, map.relog_x, map.relog_y), (0, 4, 6));
        assert_eq!(map.tiles.len(), 63);
        assert_eq!(map.file_size, data.len());
        assert!(map.chests.is_empty());
        assert!(map.npc_spawns.is_empty());
    }

    #[test]
    fn sections_decoded_across_both_passes() {
        let mut data = header(5, 5);

        // One npc spawn directive.
        data.push(c(1));
        data.push(c(2));
        data.push(c(2));
        push_short(&mut data, 170);
        data.push(c(7));
        push_short(&mut data, 15);
        data.push(c(2));

        // Empty unknown section.
        data.push(c(0));

        // One chest spawn rule targeting the chest tile below.
        data.push(c(1));
        data.push(c(1));
        data.push(c(1));
        data.extend_from_slice(&[254, 254]);
        data.push(c(0));
        push_short(&mut data, 379);
        push_short(&mut data, 30);
        push_three(&mut data, 4);

        // Tile rows: a chest at 1x1 and a wall at 3x1.
        data.push(c(1));
        data.push(c(1));
        data.push(c(2));
        data.push(c(1));
        data.push(c(9));
        data.push(c(3));
        data.push(c(0));

        // Warp rows: a door at 4x0 into map 2.
        data.push(c(1));
        data.push(c(0));
        data.push(c(1));
        data.push(c(4));
        push_short(&mut data, 2);
        data.push(c(6));
        data.push(c(7));
        data.push(c(0));
        push_short(&mut data, 1);

        let map = MapFile::decode(7, &data, NOW).expect("decode");

        let chest_tile = map.tiles[map.tile_index(1, 1)];
        assert_eq!(chest_tile.spec, Some(TileSpec::Chest));
        let wall_tile = map.tiles[map.tile_index(3, 1)];
        assert_eq!(wall_tile.spec, Some(TileSpec::Wall));

        let warp_tile = map.tiles[map.tile_index(4, 0)];
        let warp = warp_tile.warp.expect("warp");
        assert_eq!((warp.map, warp.x, warp.y), (2, 6, 7));
        assert_eq!(warp.spec, WarpSpec::Door);
        assert!(!warp.open);

        assert_eq!(map.npc_spawns.len(), 1);
        let spawn = map.npc_spawns[0];
        assert_eq!((spawn.id, spawn.x, spawn.y), (170, 2, 2));
        assert_eq!((spawn.spawn_type, spawn.respawn_minutes, spawn.amount), (7, 15, 2));

        assert_eq!(map.chests.len(), 1);
        let chest = &map.chests[0];
        assert_eq!((chest.x, chest.y), (1, 1));
        assert_eq!(chest.slots, 1);
        assert_eq!(chest.spawns.len(), 1);
        let rule = chest.spawns[0];
        assert_eq!((rule.slot, rule.minutes), (1, 30));
        assert_eq!((rule.item_id, rule.amount), (379, 4));
        assert_eq!(rule.last_taken_ms, NOW);
        assert!(chest.items.is_empty());
    }

    #[test]
    fn out_of_bounds_npc_spawn_is_dropped() {
        let mut data = header(5, 5);
        data.push(c(1));
        data.push(c(9));
        data.push(c(1));
        push_short(&mut data, 170);
        data.push(c(7));
        push_short(&mut data, 15);
        data.push(c(1));
        data.extend_from_slice(&[c(0), c(0), c(0), c(0)]);

        let map = MapFile::decode(7, &data, NOW).expect("decode");
        assert!(map.npc_spawns.is_empty());
    }

    #[test]
    fn chest_rule_without_chest_tile_is_dropped() {
        let mut data = header(5, 5);
        data.push(c(0));
        data.push(c(0));
        data.push(c(1));
        data.push(c(2));
        data.push(c(2));
        data.extend_from_slice(&[254, 254]);
        data.push(c(0));
        push_short(&mut data, 379);
        push_short(&mut data, 30);
        push_three(&mut data, 1);
        data.extend_from_slice(&[c(0), c(0)]);

        let map = MapFile::decode(7, &data, NOW).expect("decode");
        assert!(map.chests.is_empty());
    }

    #[test]
    fn truncated_file_is_an_error() {
        let data = header(5, 5);
        let err = MapFile::decode(3, &data[..OFF_SECTIONS - 4], NOW).unwrap_err();
        assert!(err.starts_with("map 3:"), "{err}");

        let err = MapFile::decode(3, &data, NOW).unwrap_err();
        assert!(err.contains("npc section"), "{err}");
    }

    #[test]
    fn file_name_is_zero_padded() {
        assert_eq!(map_file_name(5), "00005.emf");
        assert_eq!(map_file_name(12345), "12345.emf");
    }
}
