//! Single-step movement and the area-of-interest delta it produces.
//!
//! A step shifts the mover's diamond-shaped field of view by one tile:
//! one band of coordinates enters the view ahead, the mirrored band
//! leaves it behind. Everyone in between already sees the mover and only
//! needs the lightweight position update.

use crate::entities::character::PlayerId;
use crate::net::packet::{PacketAction, PacketBuilder, PacketFamily, BREAK_BYTE};
use crate::world::map::{appearance_packet, Map, MapItem};
use crate::world::position::{Coords, Direction, SEE_DISTANCE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkResult {
    Fail,
    Ok,
    /// The step landed on an open (or door-less) warp; the session layer
    /// must move the character to the target map after releasing this
    /// map's lock.
    Warped { map: u16, x: u8, y: u8 },
}

/// The coordinate bands entering and leaving the view after a step onto
/// (x, y). The leading edge sits `SEE_DISTANCE - |lateral|` ahead, the
/// trailing edge is its mirror one tile further back.
fn view_bands(x: u8, y: u8, direction: Direction) -> (Vec<(i16, i16)>, Vec<(i16, i16)>) {
    let (cx, cy) = (i16::from(x), i16::from(y));
    let see = SEE_DISTANCE as i16;
    let mut new_band = Vec::with_capacity(2 * SEE_DISTANCE as usize);
    let mut old_band = Vec::with_capacity(2 * SEE_DISTANCE as usize);
    for i in -see..see {
        let a = i.abs();
        let (new, old) = match direction {
            Direction::Up => ((cx + i, cy - see + a), (cx + i, cy + see + 1 - a)),
            Direction::Right => ((cx + see - a, cy + i), (cx - see - 1 + a, cy + i)),
            Direction::Down => ((cx + i, cy + see - a), (cx + i, cy - see - 1 + a)),
            Direction::Left => ((cx - see + a, cy + i), (cx + see + 1 - a, cy + i)),
        };
        new_band.push(new);
        old_band.push(old);
    }
    (new_band, old_band)
}

impl Map {
    /// Moves a character one step. `admin` bypasses the walkability check
    /// but not the bounds check.
    pub fn walk(
        &mut self,
        player: PlayerId,
        direction: Direction,
        admin: bool,
        now_ms: u64,
    ) -> WalkResult {
        let Some(index) = self
            .characters
            .iter()
            .position(|ch| ch.player_id == player)
        else {
            return WalkResult::Fail;
        };
        let (from, level) = {
            let ch = &self.characters[index];
            (Coords::new(ch.x, ch.y), ch.level)
        };

        let Some(target) = from.step(direction) else {
            return WalkResult::Fail;
        };
        if !self.in_bounds(target.x, target.y) {
            return WalkResult::Fail;
        }
        if !admin && !self.walkable(target.x, target.y, false) {
            return WalkResult::Fail;
        }

        if let Some(warp) = self.tile(target.x, target.y).warp {
            if level >= warp.level_req && (!warp.spec.is_door() || warp.open) {
                return WalkResult::Warped {
                    map: warp.map,
                    x: warp.x,
                    y: warp.y,
                };
            }
            // A closed or level-gated warp is an ordinary tile.
        }

        {
            let ch = &mut self.characters[index];
            ch.last_walk_ms = now_ms;
            ch.attacks = 0;
            ch.cancel_spell();
            ch.direction = direction;
            ch.x = target.x;
            ch.y = target.y;
        }

        let (new_band, old_band) = view_bands(target.x, target.y, direction);

        let mut old_chars = Vec::new();
        let mut new_chars = Vec::new();
        for (other_index, other) in self.characters.iter().enumerate() {
            if other_index == index {
                continue;
            }
            let pos = (i16::from(other.x), i16::from(other.y));
            if old_band.contains(&pos) {
                old_chars.push(other_index);
            } else if new_band.contains(&pos) {
                new_chars.push(other_index);
            }
        }

        let mut old_npcs = Vec::new();
        let mut new_npcs = Vec::new();
        for (npc_index, npc) in self.npcs.iter().enumerate() {
            if !npc.alive {
                continue;
            }
            let pos = (i16::from(npc.x), i16::from(npc.y));
            if old_band.contains(&pos) {
                old_npcs.push(npc_index);
            } else if new_band.contains(&pos) {
                new_npcs.push(npc_index);
            }
        }

        let mover = &self.characters[index];
        let visible_items: Vec<MapItem> = self
            .items
            .iter()
            .copied()
            .filter(|item| mover.in_range(item.x, item.y))
            .collect();

        // Departure notices, both directions.
        let mut builder = PacketBuilder::new(PacketFamily::Avatar, PacketAction::Remove);
        builder.add_short(player.0);
        let mover_remove = builder.finish();
        for &other_index in &old_chars {
            let other = &self.characters[other_index];
            let mut builder = PacketBuilder::new(PacketFamily::Avatar, PacketAction::Remove);
            builder.add_short(other.player_id.0);
            other.send(&mover_remove);
            mover.send(&builder.finish());
        }

        // Full appearance for everyone newly in view, both directions.
        let mover_appear = appearance_packet(mover, None);
        for &other_index in &new_chars {
            let other = &self.characters[other_index];
            other.send(&mover_appear);
            mover.send(&appearance_packet(other, None));
        }

        // Position update for everyone who already had the mover in view.
        let mut builder = PacketBuilder::new(PacketFamily::Walk, PacketAction::Player);
        builder.add_short(player.0);
        builder.add_char(direction as u8);
        builder.add_char(mover.x);
        builder.add_char(mover.y);
        let walk_packet = builder.finish();
        for (other_index, other) in self.characters.iter().enumerate() {
            if other_index != index && mover.char_in_range(other) {
                other.send(&walk_packet);
            }
        }

        // The mover's combined view of floor items now in range.
        let mut builder = PacketBuilder::new(PacketFamily::Walk, PacketAction::Reply);
        builder.add_byte(BREAK_BYTE);
        builder.add_byte(BREAK_BYTE);
        for item in &visible_items {
            builder.add_short(item.uid);
            builder.add_short(item.id);
            builder.add_char(item.x);
            builder.add_char(item.y);
            builder.add_three(item.amount);
        }
        mover.send(&builder.finish());

        // NPCs entering the view.
        for &npc_index in &new_npcs {
            let npc = &self.npcs[npc_index];
            let mut builder = PacketBuilder::new(PacketFamily::Appear, PacketAction::Reply);
            builder.add_char(0);
            builder.add_byte(BREAK_BYTE);
            builder.add_char(npc.index);
            builder.add_short(npc.id);
            builder.add_char(npc.x);
            builder.add_char(npc.y);
            builder.add_char(npc.direction as u8);
            mover.send(&builder.finish());
        }

        // NPCs leaving the view forget the mover.
        for npc_index in old_npcs {
            self.npcs[npc_index].drop_tracking(player);
        }

        WalkResult::Ok
    }
}
