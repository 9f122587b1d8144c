//! Tile classification, walkability, and warp annotations.
//!
//! Tile specs are plain enumerated tags; walkability is a single pure
//! mapping shared by every tile rather than per-tile behavior.

/// Classification of a grid cell as stored in the map file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileSpec {
    Wall,
    ChairDown,
    ChairLeft,
    ChairRight,
    ChairUp,
    ChairDownRight,
    ChairUpLeft,
    ChairAll,
    Chest,
    BankVault,
    NpcBoundary,
    MapEdge,
    Board1,
    Board2,
    Board3,
    Board4,
    Board5,
    Board6,
    Board7,
    Board8,
    Jukebox,
    TimedSpikes,
    Other(u8),
}

impl TileSpec {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => TileSpec::Wall,
            1 => TileSpec::ChairDown,
            2 => TileSpec::ChairLeft,
            3 => TileSpec::ChairRight,
            4 => TileSpec::ChairUp,
            5 => TileSpec::ChairDownRight,
            6 => TileSpec::ChairUpLeft,
            7 => TileSpec::ChairAll,
            9 => TileSpec::Chest,
            16 => TileSpec::BankVault,
            17 => TileSpec::NpcBoundary,
            18 => TileSpec::MapEdge,
            20 => TileSpec::Board1,
            21 => TileSpec::Board2,
            22 => TileSpec::Board3,
            23 => TileSpec::Board4,
            24 => TileSpec::Board5,
            25 => TileSpec::Board6,
            26 => TileSpec::Board7,
            27 => TileSpec::Board8,
            28 => TileSpec::Jukebox,
            34 => TileSpec::TimedSpikes,
            other => TileSpec::Other(other),
        }
    }

    /// Whether an actor may stand on a tile of this spec. The NPC boundary
    /// admits NPCs only; the blocking set blocks everyone.
    pub fn walkable(self, is_npc: bool) -> bool {
        match self {
            TileSpec::Wall
            | TileSpec::ChairDown
            | TileSpec::ChairLeft
            | TileSpec::ChairRight
            | TileSpec::ChairUp
            | TileSpec::ChairDownRight
            | TileSpec::ChairUpLeft
            | TileSpec::ChairAll
            | TileSpec::Chest
            | TileSpec::BankVault
            | TileSpec::MapEdge
            | TileSpec::Board1
            | TileSpec::Board2
            | TileSpec::Board3
            | TileSpec::Board4
            | TileSpec::Board5
            | TileSpec::Board6
            | TileSpec::Board7
            | TileSpec::Board8
            | TileSpec::Jukebox => false,
            TileSpec::NpcBoundary => is_npc,
            _ => true,
        }
    }
}

/// Door state of a warp: always-open door-less warps, manually toggled
/// doors, and keyed door tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarpSpec {
    NoDoor,
    Door,
    /// Keyed door; `key` is the ordinal looked up in the key table.
    Locked { key: u16 },
}

impl WarpSpec {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => WarpSpec::NoDoor,
            1 => WarpSpec::Door,
            key => WarpSpec::Locked { key },
        }
    }

    pub fn is_door(self) -> bool {
        !matches!(self, WarpSpec::NoDoor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Warp {
    pub map: u16,
    pub x: u8,
    pub y: u8,
    pub level_req: u8,
    pub spec: WarpSpec,
    pub open: bool,
}

impl Warp {
    pub fn new(map: u16, x: u8, y: u8, level_req: u8, spec: WarpSpec) -> Self {
        Self {
            map,
            x,
            y,
            level_req,
            spec,
            open: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tile {
    pub spec: Option<TileSpec>,
    pub warp: Option<Warp>,
}

impl Tile {
    pub fn walkable(&self, is_npc: bool) -> bool {
        match self.spec {
            None => true,
            Some(spec) => spec.walkable(is_npc),
        }
    }
}

/// Key items required by keyed door tiers, owned by the static item
/// catalog outside this crate and injected where doors are opened.
#[derive(Debug, Clone, Default)]
pub struct KeyTable {
    keys: Vec<u16>,
}

impl KeyTable {
    pub fn new(keys: Vec<u16>) -> Self {
        Self { keys }
    }

    /// Item id of the `ordinal`th key (1-based), if the catalog has one.
    pub fn key_for(&self, ordinal: u16) -> Option<u16> {
        ordinal
            .checked_sub(1)
            .and_then(|index| self.keys.get(usize::from(index)))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCKING: [TileSpec; 20] = [
        TileSpec::Wall,
        TileSpec::ChairDown,
        TileSpec::ChairLeft,
        TileSpec::ChairRight,
        TileSpec::ChairUp,
        TileSpec::ChairDownRight,
        TileSpec::ChairUpLeft,
        TileSpec::ChairAll,
        TileSpec::Chest,
        TileSpec::BankVault,
        TileSpec::MapEdge,
        TileSpec::Board1,
        TileSpec::Board2,
        TileSpec::Board3,
        TileSpec::Board4,
        TileSpec::Board5,
        TileSpec::Board6,
        TileSpec::Board7,
        TileSpec::Board8,
        TileSpec::Jukebox,
    ];

    #[test]
    fn blocking_set_blocks_everyone() {
        for spec in BLOCKING {
            assert!(!spec.walkable(false), "{spec:?} should block players");
            assert!(!spec.walkable(true), "{spec:?} should block npcs");
        }
    }

    #[test]
    fn npc_boundary_admits_npcs_only() {
        assert!(TileSpec::NpcBoundary.walkable(true));
        assert!(!TileSpec::NpcBoundary.walkable(false));
    }

    #[test]
    fn plain_and_unknown_specs_are_walkable() {
        assert!(TileSpec::TimedSpikes.walkable(false));
        assert!(TileSpec::Other(99).walkable(false));
        assert!(TileSpec::Other(99).walkable(true));
        assert!(Tile::default().walkable(false));
    }

    #[test]
    fn warp_spec_tiers() {
        assert_eq!(WarpSpec::from_raw(0), WarpSpec::NoDoor);
        assert_eq!(WarpSpec::from_raw(1), WarpSpec::Door);
        assert_eq!(WarpSpec::from_raw(2), WarpSpec::Locked { key: 2 });
        assert!(!WarpSpec::NoDoor.is_door());
        assert!(WarpSpec::Door.is_door());
    }

    #[test]
    fn key_table_lookup_is_one_based() {
        let keys = KeyTable::new(vec![144, 145, 146]);
        assert_eq!(keys.key_for(1), Some(144));
        assert_eq!(keys.key_for(3), Some(146));
        assert_eq!(keys.key_for(0), None);
        assert_eq!(keys.key_for(4), None);
    }
}
