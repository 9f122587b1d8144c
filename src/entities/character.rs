//! Session-side view of a connected character as the map engine needs it:
//! identity, position, appearance fields, inventory lookup, and a
//! fire-and-forget outbox into the connection's send queue.

use crate::net::packet::{Packet, PacketBuilder};
use crate::world::position::{path_length, Direction, SEE_DISTANCE};
use std::sync::mpsc::Sender;

/// Per-connection id, assigned by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerId(pub u16);

/// Persistent character id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacterId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SitState {
    Stand = 0,
    Chair = 1,
    Floor = 2,
}

/// Visible equipment, appended to appearance packets in fixed slot order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Paperdoll {
    pub boots: u16,
    pub armor: u16,
    pub hat: u16,
    pub shield: u16,
    pub weapon: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryItem {
    pub id: u16,
    pub amount: u32,
}

/// A timed ability in progress; canceled by movement and social actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpellCast {
    pub spell_id: u16,
    pub started_ms: u64,
}

#[derive(Debug)]
pub struct Character {
    pub id: CharacterId,
    pub player_id: PlayerId,
    pub name: String,
    pub guild_tag: String,
    pub map_id: u16,
    pub x: u8,
    pub y: u8,
    pub direction: Direction,
    pub level: u8,
    pub gender: u8,
    pub hair_style: u8,
    pub hair_color: u8,
    pub race: u8,
    pub hp: u16,
    pub max_hp: u16,
    pub tp: u16,
    pub max_tp: u16,
    pub paperdoll: Paperdoll,
    pub sitting: SitState,
    pub hidden: bool,
    pub attacks: u32,
    pub last_walk_ms: u64,
    pub spell: Option<SpellCast>,
    pub items: Vec<InventoryItem>,
    outbox: Sender<Packet>,
}

impl Character {
    pub fn new(id: CharacterId, player_id: PlayerId, name: &str, outbox: Sender<Packet>) -> Self {
        Self {
            id,
            player_id,
            name: name.to_string(),
            guild_tag: String::new(),
            map_id: 0,
            x: 0,
            y: 0,
            direction: Direction::Down,
            level: 0,
            gender: 0,
            hair_style: 0,
            hair_color: 0,
            race: 0,
            hp: 10,
            max_hp: 10,
            tp: 10,
            max_tp: 10,
            paperdoll: Paperdoll::default(),
            sitting: SitState::Stand,
            hidden: false,
            attacks: 0,
            last_walk_ms: 0,
            spell: None,
            items: Vec::new(),
            outbox,
        }
    }

    /// Hands the packet to this character's send queue. Never blocks; a
    /// disconnected receiver is silently ignored so a slow or gone peer
    /// cannot stall map mutation.
    pub fn send(&self, packet: &Packet) {
        let _ = self.outbox.send(packet.clone());
    }

    /// Amount of `item_id` held, 0 when absent.
    pub fn has_item(&self, item_id: u16) -> u32 {
        self.items
            .iter()
            .find(|item| item.id == item_id)
            .map(|item| item.amount)
            .unwrap_or(0)
    }

    pub fn cancel_spell(&mut self) {
        self.spell = None;
    }

    pub fn in_range(&self, x: u8, y: u8) -> bool {
        path_length(self.x, self.y, x, y) <= SEE_DISTANCE
    }

    pub fn char_in_range(&self, other: &Character) -> bool {
        self.in_range(other.x, other.y)
    }

    /// Guild tag padded to the fixed three-character wire width.
    pub fn padded_guild_tag(&self) -> String {
        format!("{:<3}", self.guild_tag.chars().take(3).collect::<String>())
    }

    /// Equipment shorts in B000A0HSW slot order.
    pub fn add_paperdoll_data(&self, builder: &mut PacketBuilder) {
        builder.add_short(self.paperdoll.boots);
        builder.add_short(0);
        builder.add_short(0);
        builder.add_short(0);
        builder.add_short(self.paperdoll.armor);
        builder.add_short(0);
        builder.add_short(self.paperdoll.hat);
        builder.add_short(self.paperdoll.shield);
        builder.add_short(self.paperdoll.weapon);
    }
}
