/// Radius within which two map positions are mutually visible. Movement,
/// drops, and social broadcasts all share this constant.
pub const SEE_DISTANCE: u16 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coords {
    pub x: u8,
    pub y: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Down = 0,
    Left = 1,
    Up = 2,
    Right = 3,
}

impl Direction {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Direction::Down),
            1 => Some(Direction::Left),
            2 => Some(Direction::Up),
            3 => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn delta(self) -> (i16, i16) {
        match self {
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
        }
    }
}

impl Coords {
    pub fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// One step in `direction`, or None when the step would leave the
    /// coordinate space entirely.
    pub fn step(self, direction: Direction) -> Option<Self> {
        let (dx, dy) = direction.delta();
        let x = i16::from(self.x) + dx;
        let y = i16::from(self.y) + dy;
        if x < 0 || y < 0 || x > i16::from(u8::MAX) || y > i16::from(u8::MAX) {
            return None;
        }
        Some(Self {
            x: x as u8,
            y: y as u8,
        })
    }
}

/// Grid-step path distance between two positions (no diagonal shortcut).
pub fn path_length(ax: u8, ay: u8, bx: u8, by: u8) -> u16 {
    let dx = u16::from(ax.max(bx) - ax.min(bx));
    let dy = u16::from(ay.max(by) - ay.min(by));
    dx + dy
}
