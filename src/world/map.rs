//! Live state of one map: grid, chests, floor items, NPCs, and the
//! characters currently on it. Every mutation entry point lives here (or
//! in the movement code) and computes its broadcast list from a single
//! consistent snapshot; callers serialize access per map.

use crate::config::Limits;
use crate::entities::character::{Character, CharacterId, PlayerId, SitState};
use crate::net::packet::{Packet, PacketAction, PacketBuilder, PacketFamily, BREAK_BYTE};
use crate::telemetry::logging;
use crate::world::chest::Chest;
use crate::world::cron::DoorTimers;
use crate::world::map_file::{map_file_name, MapFile};
use crate::world::npc::Npc;
use crate::world::position::{path_length, Coords, Direction};
use crate::world::tile::{KeyTable, Tile, WarpSpec};
use std::path::Path;

/// An item lying on the ground. `uid` is unique per map and reused once
/// freed. A non-zero `slot` ties the item back to the chest rule slot it
/// came from. Drop protection fields are carried but not enforced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapItem {
    pub uid: u16,
    pub id: u16,
    pub amount: u32,
    pub x: u8,
    pub y: u8,
    pub slot: u8,
    pub owner: Option<CharacterId>,
    pub unprotect_ms: Option<u64>,
}

#[derive(Debug)]
pub struct Map {
    pub id: u16,
    pub exists: bool,
    pub rid: [u8; 4],
    pub pk: bool,
    pub effect: u8,
    pub music: u8,
    pub width: u8,
    pub height: u8,
    pub scroll: u8,
    pub relog_x: u8,
    pub relog_y: u8,
    pub has_timed_spikes: bool,
    pub file_size: usize,
    pub tiles: Vec<Tile>,
    pub chests: Vec<Chest>,
    pub items: Vec<MapItem>,
    pub npcs: Vec<Npc>,
    pub characters: Vec<Character>,
    pub(crate) limits: Limits,
    pub(crate) door_timers: DoorTimers,
}

/// Full appearance descriptor for a character, as sent when it enters
/// another player's view. `animation` is appended for map entry only;
/// in-view movement uses the shorter walk notification instead.
pub(crate) fn appearance_packet(character: &Character, animation: Option<u8>) -> Packet {
    let mut builder = PacketBuilder::new(PacketFamily::Players, PacketAction::Agree);
    builder.add_byte(BREAK_BYTE);
    builder.add_break_string(&character.name);
    builder.add_short(character.player_id.0);
    builder.add_short(character.map_id);
    builder.add_short(u16::from(character.x));
    builder.add_short(u16::from(character.y));
    builder.add_char(character.direction as u8);
    builder.add_char(6);
    builder.add_string(&character.padded_guild_tag());
    builder.add_char(character.level);
    builder.add_char(character.gender);
    builder.add_char(character.hair_style);
    builder.add_char(character.hair_color);
    builder.add_char(character.race);
    builder.add_short(character.max_hp);
    builder.add_short(character.hp);
    builder.add_short(character.max_tp);
    builder.add_short(character.tp);
    character.add_paperdoll_data(&mut builder);
    builder.add_char(character.sitting as u8);
    builder.add_char(u8::from(character.hidden));
    if let Some(animation) = animation {
        builder.add_char(animation);
    }
    builder.add_byte(BREAK_BYTE);
    builder.add_char(1); // 0 = NPC, 1 = player
    builder.finish()
}

impl Map {
    /// A map that failed to load or does not exist. Callers must gate all
    /// use on `exists`.
    pub fn empty(id: u16, limits: Limits) -> Self {
        Self {
            id,
            exists: false,
            rid: [0; 4],
            pk: false,
            effect: 0,
            music: 0,
            width: 0,
            height: 0,
            scroll: 0,
            relog_x: 0,
            relog_y: 0,
            has_timed_spikes: false,
            file_size: 0,
            tiles: Vec::new(),
            chests: Vec::new(),
            items: Vec::new(),
            npcs: Vec::new(),
            characters: Vec::new(),
            limits,
            door_timers: DoorTimers::new(),
        }
    }

    pub fn from_file(file: MapFile, limits: Limits) -> Self {
        let mut npcs = Vec::new();
        let mut index: u8 = 0;
        for spawn in &file.npc_spawns {
            for _ in 0..spawn.amount {
                npcs.push(Npc::from_spawn(index, *spawn));
                index = index.wrapping_add(1);
            }
        }
        Self {
            id: file.id,
            exists: true,
            rid: file.rid,
            pk: file.pk,
            effect: file.effect,
            music: file.music,
            width: file.width,
            height: file.height,
            scroll: file.scroll,
            relog_x: file.relog_x,
            relog_y: file.relog_y,
            has_timed_spikes: file.has_timed_spikes,
            file_size: file.file_size,
            tiles: file.tiles,
            chests: file.chests,
            items: Vec::new(),
            npcs,
            characters: Vec::new(),
            limits,
            door_timers: DoorTimers::new(),
        }
    }

    /// Loads a map from the configured directory. Any filesystem or
    /// decode error is logged and yields a non-existing map.
    pub fn load(id: u16, map_dir: &Path, limits: Limits, now_ms: u64) -> Self {
        let path = map_dir.join(map_file_name(id));
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                logging::log_error(&format!("error loading map {}: {}", id, err));
                return Self::empty(id, limits);
            }
        };
        match MapFile::decode(id, &bytes, now_ms) {
            Ok(file) => Self::from_file(file, limits),
            Err(err) => {
                logging::log_error(&format!("error loading map {}: {}", id, err));
                Self::empty(id, limits)
            }
        }
    }

    pub fn in_bounds(&self, x: u8, y: u8) -> bool {
        x < self.width && y < self.height
    }

    /// Direct grid access; callers pre-validate with `in_bounds`.
    pub fn tile(&self, x: u8, y: u8) -> &Tile {
        &self.tiles[usize::from(y) * usize::from(self.width) + usize::from(x)]
    }

    pub fn tile_mut(&mut self, x: u8, y: u8) -> &mut Tile {
        &mut self.tiles[usize::from(y) * usize::from(self.width) + usize::from(x)]
    }

    pub fn walkable(&self, x: u8, y: u8, is_npc: bool) -> bool {
        self.in_bounds(x, y) && self.tile(x, y).walkable(is_npc)
    }

    // ---- character registry -------------------------------------------

    pub fn character_by_name(&self, name: &str) -> Option<&Character> {
        self.characters.iter().find(|ch| ch.name == name)
    }

    pub fn character_by_player_id(&self, player: PlayerId) -> Option<&Character> {
        self.characters.iter().find(|ch| ch.player_id == player)
    }

    pub fn character_by_id(&self, id: CharacterId) -> Option<&Character> {
        self.characters.iter().find(|ch| ch.id == id)
    }

    fn character_index(&self, player: PlayerId) -> Option<usize> {
        self.characters.iter().position(|ch| ch.player_id == player)
    }

    fn send_near_others(&self, actor_index: usize, packet: &Packet) {
        let actor = &self.characters[actor_index];
        for (index, other) in self.characters.iter().enumerate() {
            if index != actor_index && actor.char_in_range(other) {
                other.send(packet);
            }
        }
    }

    /// Registers `character` and announces it to everyone already in
    /// mutual range.
    pub fn enter(&mut self, mut character: Character, animation: u8) {
        character.map_id = self.id;
        character.attacks = 0;
        let packet = appearance_packet(&character, Some(animation));
        for other in &self.characters {
            if character.char_in_range(other) {
                other.send(&packet);
            }
        }
        self.characters.push(character);
    }

    /// Deregisters a character, returning it to the caller for hand-off
    /// (cross-map warp, disconnect). `silent` suppresses the departure
    /// broadcast; a non-zero `animation` is shown to observers otherwise.
    pub fn leave(&mut self, id: CharacterId, animation: u8, silent: bool) -> Option<Character> {
        let index = self.characters.iter().position(|ch| ch.id == id)?;
        if !silent {
            let leaver = &self.characters[index];
            let mut builder = PacketBuilder::new(PacketFamily::Avatar, PacketAction::Remove);
            builder.add_short(leaver.player_id.0);
            if animation != 0 {
                builder.add_char(animation);
            }
            let packet = builder.finish();
            self.send_near_others(index, &packet);
        }
        let mut character = self.characters.remove(index);
        character.map_id = 0;
        Some(character)
    }

    // ---- social and state actions -------------------------------------

    pub fn msg(&mut self, player: PlayerId, message: &str) {
        let Some(index) = self.character_index(player) else {
            return;
        };
        self.characters[index].cancel_spell();
        let actor = &self.characters[index];
        let mut builder = PacketBuilder::new(PacketFamily::Talk, PacketAction::Player);
        builder.add_short(actor.player_id.0);
        builder.add_string(message);
        self.send_near_others(index, &builder.finish());
    }

    pub fn attack(&mut self, player: PlayerId, direction: Direction) {
        let Some(index) = self.character_index(player) else {
            return;
        };
        let actor = &mut self.characters[index];
        actor.direction = direction;
        actor.attacks += 1;
        actor.cancel_spell();
        let mut builder = PacketBuilder::new(PacketFamily::Attack, PacketAction::Player);
        builder.add_short(player.0);
        builder.add_char(direction as u8);
        self.send_near_others(index, &builder.finish());
    }

    pub fn sit(&mut self, player: PlayerId, state: SitState) {
        let Some(index) = self.character_index(player) else {
            return;
        };
        let actor = &mut self.characters[index];
        actor.sitting = state;
        actor.cancel_spell();
        let family = if state == SitState::Chair {
            PacketFamily::Chair
        } else {
            PacketFamily::Sit
        };
        let actor = &self.characters[index];
        let mut builder = PacketBuilder::new(family, PacketAction::Player);
        builder.add_short(player.0);
        builder.add_char(actor.x);
        builder.add_char(actor.y);
        builder.add_char(actor.direction as u8);
        builder.add_char(0);
        self.send_near_others(index, &builder.finish());
    }

    pub fn stand(&mut self, player: PlayerId) {
        let Some(index) = self.character_index(player) else {
            return;
        };
        let actor = &mut self.characters[index];
        actor.sitting = SitState::Stand;
        actor.cancel_spell();
        let actor = &self.characters[index];
        let mut builder = PacketBuilder::new(PacketFamily::Sit, PacketAction::Remove);
        builder.add_short(player.0);
        builder.add_char(actor.x);
        builder.add_char(actor.y);
        self.send_near_others(index, &builder.finish());
    }

    pub fn emote(&mut self, player: PlayerId, emote: u8, echo: bool) {
        let Some(index) = self.character_index(player) else {
            return;
        };
        self.characters[index].cancel_spell();
        let actor = &self.characters[index];
        let mut builder = PacketBuilder::new(PacketFamily::Emote, PacketAction::Player);
        builder.add_short(player.0);
        builder.add_char(emote);
        let packet = builder.finish();
        for (other_index, other) in self.characters.iter().enumerate() {
            if echo || (other_index != index && actor.char_in_range(other)) {
                other.send(&packet);
            }
        }
    }

    pub fn face(&mut self, player: PlayerId, direction: Direction) {
        let Some(index) = self.character_index(player) else {
            return;
        };
        let actor = &mut self.characters[index];
        actor.direction = direction;
        actor.cancel_spell();
        let mut builder = PacketBuilder::new(PacketFamily::Face, PacketAction::Player);
        builder.add_short(player.0);
        builder.add_char(direction as u8);
        self.send_near_others(index, &builder.finish());
    }

    // ---- doors ---------------------------------------------------------

    /// Opens the door at (x, y). `opener` gates the attempt on interaction
    /// range and, for keyed tiers, possession of the required key; a
    /// `None` opener is a system action and skips both checks. On success
    /// everyone in range (the opener included) is notified and an
    /// automatic close is scheduled.
    pub fn open_door(
        &mut self,
        opener: Option<PlayerId>,
        x: u8,
        y: u8,
        keys: &KeyTable,
        now_ms: u64,
    ) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        if let Some(player) = opener {
            let Some(actor) = self.character_by_player_id(player) else {
                return false;
            };
            if !actor.in_range(x, y) {
                return false;
            }
            let Some(warp) = self.tile(x, y).warp else {
                return false;
            };
            if let WarpSpec::Locked { key } = warp.spec {
                let Some(required) = keys.key_for(key) else {
                    return false;
                };
                if actor.has_item(required) == 0 {
                    return false;
                }
            }
        }

        let Some(warp) = self.tile(x, y).warp else {
            return false;
        };
        if !warp.spec.is_door() || warp.open {
            return false;
        }

        if let Some(warp) = self.tile_mut(x, y).warp.as_mut() {
            warp.open = true;
        }

        let mut builder = PacketBuilder::new(PacketFamily::Door, PacketAction::Open);
        builder.add_char(x);
        builder.add_short(u16::from(y));
        let packet = builder.finish();
        for character in &self.characters {
            if character.in_range(x, y) {
                character.send(&packet);
            }
        }

        self.door_timers
            .set(Coords::new(x, y), self.limits.door_close_ms, now_ms);
        true
    }

    /// Closes a door silently and cancels its pending auto-close.
    pub fn close_door(&mut self, x: u8, y: u8) {
        if !self.in_bounds(x, y) {
            return;
        }
        let Some(warp) = self.tile(x, y).warp else {
            return;
        };
        if !warp.spec.is_door() || !warp.open {
            return;
        }
        if let Some(warp) = self.tile_mut(x, y).warp.as_mut() {
            warp.open = false;
        }
        self.door_timers.stop(Coords::new(x, y));
    }

    /// Closes every door whose auto-close deadline has passed.
    pub fn pump_doors(&mut self, now_ms: u64) {
        while let Some(coords) = self.door_timers.pop_ready(now_ms) {
            self.close_door(coords.x, coords.y);
        }
    }

    // ---- floor items ---------------------------------------------------

    pub fn get_item(&self, uid: u16) -> Option<&MapItem> {
        self.items.iter().find(|item| item.uid == uid)
    }

    pub fn update_item(&mut self, item: MapItem) {
        if let Some(stored) = self.items.iter_mut().find(|stored| stored.uid == item.uid) {
            *stored = item;
        }
    }

    /// Smallest positive uid not currently assigned on this map.
    pub fn generate_item_id(&self) -> u16 {
        let mut uid = 1;
        while self.items.iter().any(|item| item.uid == uid) {
            uid += 1;
        }
        uid
    }

    /// Drops an item at (x, y). A drop on behalf of a connected actor is
    /// subject to the per-tile and per-map ceilings; a rejected drop
    /// returns an item with uid 0 and inserts nothing. System drops
    /// (NPC loot, chest overflow) bypass the ceilings.
    pub fn add_item(
        &mut self,
        id: u16,
        amount: u32,
        x: u8,
        y: u8,
        dropper: Option<PlayerId>,
    ) -> MapItem {
        let mut item = MapItem {
            uid: 0,
            id,
            amount,
            x,
            y,
            slot: 0,
            owner: None,
            unprotect_ms: None,
        };

        if dropper.is_some() {
            let on_tile = self
                .items
                .iter()
                .filter(|item| item.x == x && item.y == y)
                .count();
            if on_tile >= self.limits.max_tile || self.items.len() >= self.limits.max_map {
                return item;
            }
        }

        item.uid = self.generate_item_id();

        let mut builder = PacketBuilder::new(PacketFamily::Item, PacketAction::Add);
        builder.add_short(id);
        builder.add_short(item.uid);
        builder.add_three(amount);
        builder.add_char(x);
        builder.add_char(y);
        let packet = builder.finish();
        for character in &self.characters {
            if Some(character.player_id) != dropper && character.in_range(x, y) {
                character.send(&packet);
            }
        }

        self.items.push(item);
        item
    }

    /// Removes a floor item outright. When the item came from a chest
    /// rule slot, the chest anchored at the item's position gets its
    /// respawn clock restarted.
    pub fn del_item(&mut self, uid: u16, remover: Option<PlayerId>, now_ms: u64) {
        let Some(index) = self.items.iter().position(|item| item.uid == uid) else {
            return;
        };
        let item = self.items[index];

        let mut builder = PacketBuilder::new(PacketFamily::Item, PacketAction::Remove);
        builder.add_short(item.uid);
        let packet = builder.finish();
        for character in &self.characters {
            if Some(character.player_id) != remover && character.in_range(item.x, item.y) {
                character.send(&packet);
            }
        }

        self.items.remove(index);
        if item.slot != 0 {
            self.restamp_chest_slot(item.x, item.y, item.slot, now_ms);
        }
    }

    /// Removes part of a floor item. A partial take broadcasts a remove
    /// followed by a re-add with the new amount, so observers re-render
    /// the stack rather than patching it in place.
    pub fn del_some_item(&mut self, uid: u16, amount: u32, remover: Option<PlayerId>, now_ms: u64) {
        if amount == 0 {
            return;
        }
        let Some(index) = self.items.iter().position(|item| item.uid == uid) else {
            return;
        };
        if amount >= self.items[index].amount {
            self.del_item(uid, remover, now_ms);
            return;
        }

        self.items[index].amount -= amount;
        let slot = self.items[index].slot;
        if slot != 0 {
            self.items[index].slot = 0;
            let (x, y) = (self.items[index].x, self.items[index].y);
            self.restamp_chest_slot(x, y, slot, now_ms);
        }
        let item = self.items[index];

        let mut builder = PacketBuilder::new(PacketFamily::Item, PacketAction::Remove);
        builder.add_short(item.uid);
        let remove = builder.finish();
        for character in &self.characters {
            if Some(character.player_id) != remover && character.in_range(item.x, item.y) {
                character.send(&remove);
            }
        }

        let mut builder = PacketBuilder::new(PacketFamily::Item, PacketAction::Add);
        builder.add_short(item.id);
        builder.add_short(item.uid);
        builder.add_three(item.amount);
        builder.add_char(item.x);
        builder.add_char(item.y);
        let re_add = builder.finish();
        for character in &self.characters {
            if character.in_range(item.x, item.y) {
                character.send(&re_add);
            }
        }
    }

    // ---- chests --------------------------------------------------------

    pub fn chest_index_at(&self, x: u8, y: u8) -> Option<usize> {
        self.chests
            .iter()
            .position(|chest| chest.x == x && chest.y == y)
    }

    pub fn chest_at(&self, x: u8, y: u8) -> Option<&Chest> {
        self.chest_index_at(x, y).map(|index| &self.chests[index])
    }

    pub fn chest_at_mut(&mut self, x: u8, y: u8) -> Option<&mut Chest> {
        let index = self.chest_index_at(x, y)?;
        Some(&mut self.chests[index])
    }

    fn restamp_chest_slot(&mut self, x: u8, y: u8, slot: u8, now_ms: u64) {
        if let Some(chest) = self.chest_at_mut(x, y) {
            chest.restamp_slot(slot, now_ms);
        }
    }

    /// Sends the chest's contents to every character standing next to it
    /// (the only positions a chest can be browsed from).
    pub fn broadcast_chest(&self, index: usize, exclude: Option<PlayerId>) {
        let Some(chest) = self.chests.get(index) else {
            return;
        };
        let mut builder = PacketBuilder::new(PacketFamily::Chest, PacketAction::Agree);
        for item in &chest.items {
            builder.add_short(item.id);
            builder.add_three(item.amount);
        }
        let packet = builder.finish();
        for character in &self.characters {
            if Some(character.player_id) != exclude
                && path_length(character.x, character.y, chest.x, chest.y) <= 1
            {
                character.send(&packet);
            }
        }
    }

    /// Refills every chest whose rules are due and pushes the new
    /// contents to adjacent characters.
    pub fn spawn_chests(&mut self, now_ms: u64) {
        let limits = self.limits;
        let mut updated = Vec::new();
        for (index, chest) in self.chests.iter_mut().enumerate() {
            if chest.respawn_due(now_ms, &limits) {
                updated.push(index);
            }
        }
        for index in updated {
            self.broadcast_chest(index, None);
        }
    }
}
