//! Message building and the variable-width integer encoding shared by the
//! wire protocol and the binary map file format.

const MAX1: u32 = 253;
const MAX2: u32 = 64_009;
const MAX3: u32 = 16_194_277;

/// Marker byte used to separate variable-length records inside a packet.
pub const BREAK_BYTE: u8 = 0xFF;

/// Decodes up to four encoded bytes into an integer. Bytes 0 and 254 both
/// denote the zero digit.
pub fn decode_number(bytes: &[u8]) -> u32 {
    let mut value = 0u32;
    for (index, &raw) in bytes.iter().take(4).enumerate() {
        let digit = if raw == 0 || raw == 254 {
            0
        } else {
            u32::from(raw) - 1
        };
        value += match index {
            0 => digit,
            1 => digit * MAX1,
            2 => digit * MAX2,
            _ => digit * MAX3,
        };
    }
    value
}

/// Encodes `value` into exactly `width` bytes (1..=4). Unused high bytes
/// are emitted as 254.
pub fn encode_number(value: u32, width: usize) -> Vec<u8> {
    let width = width.clamp(1, 4);
    let mut out = vec![254u8; width];
    let mut rem = value;
    if width >= 4 && rem >= MAX3 {
        out[3] = (rem / MAX3 + 1) as u8;
        rem %= MAX3;
    }
    if width >= 3 && rem >= MAX2 {
        out[2] = (rem / MAX2 + 1) as u8;
        rem %= MAX2;
    }
    if width >= 2 && rem >= MAX1 {
        out[1] = (rem / MAX1 + 1) as u8;
        rem %= MAX1;
    }
    out[0] = (rem + 1) as u8;
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketFamily {
    Walk = 6,
    Face = 7,
    Chair = 8,
    Emote = 9,
    Attack = 11,
    Item = 14,
    Talk = 18,
    Players = 22,
    Avatar = 23,
    Appear = 29,
    Chest = 33,
    Door = 34,
    Sit = 41,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketAction {
    Reply = 3,
    Remove = 4,
    Agree = 5,
    Add = 7,
    Player = 8,
    Open = 13,
}

/// A finished outbound message: action byte, family byte, then payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    data: Vec<u8>,
}

impl Packet {
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn action(&self) -> u8 {
        self.data.first().copied().unwrap_or(0)
    }

    pub fn family(&self) -> u8 {
        self.data.get(1).copied().unwrap_or(0)
    }

    pub fn is(&self, family: PacketFamily, action: PacketAction) -> bool {
        self.family() == family as u8 && self.action() == action as u8
    }

    pub fn payload(&self) -> &[u8] {
        self.data.get(2..).unwrap_or(&[])
    }
}

/// Builds an outbound message tagged with a family/action pair.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    data: Vec<u8>,
}

impl PacketBuilder {
    pub fn new(family: PacketFamily, action: PacketAction) -> Self {
        Self {
            data: vec![action as u8, family as u8],
        }
    }

    pub fn add_byte(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn add_char(&mut self, value: u8) {
        self.data.extend_from_slice(&encode_number(u32::from(value), 1));
    }

    pub fn add_short(&mut self, value: u16) {
        self.data.extend_from_slice(&encode_number(u32::from(value), 2));
    }

    pub fn add_three(&mut self, value: u32) {
        self.data.extend_from_slice(&encode_number(value, 3));
    }

    pub fn add_string(&mut self, value: &str) {
        self.data.extend_from_slice(value.as_bytes());
    }

    pub fn add_break_string(&mut self, value: &str) {
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(BREAK_BYTE);
    }

    pub fn finish(self) -> Packet {
        Packet { data: self.data }
    }
}

/// Cursor over encoded bytes. Also used by the map file decoder, which
/// shares the wire encoding and needs `seek` for its two-pass section read.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn seek(&mut self, pos: usize) -> Option<()> {
        if pos > self.data.len() {
            return None;
        }
        self.pos = pos;
        Some(())
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        if self.remaining() < 1 {
            return None;
        }
        let value = self.data[self.pos];
        self.pos += 1;
        Some(value)
    }

    pub fn read_char(&mut self) -> Option<u8> {
        let raw = self.read_byte()?;
        Some(decode_number(&[raw]) as u8)
    }

    pub fn read_short(&mut self) -> Option<u16> {
        let bytes = self.read_bytes(2)?;
        Some(decode_number(bytes) as u16)
    }

    pub fn read_three(&mut self) -> Option<u32> {
        let bytes = self.read_bytes(3)?;
        Some(decode_number(bytes))
    }

    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.remaining() < len {
            return None;
        }
        let start = self.pos;
        self.pos += len;
        Some(&self.data[start..start + len])
    }

    pub fn skip(&mut self, len: usize) -> Option<()> {
        if self.remaining() < len {
            return None;
        }
        self.pos += len;
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg_next(state: &mut u64) -> u32 {
        *state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        (*state >> 32) as u32
    }

    #[test]
    fn number_roundtrip_all_widths() {
        let caps: [(usize, u32); 4] = [
            (1, MAX1 - 1),
            (2, MAX2 - 1),
            (3, MAX3 - 1),
            (4, u32::MAX / 2),
        ];
        let mut state = 0x1234_5678_9abc_def0;
        for (width, cap) in caps {
            for _ in 0..256 {
                let value = lcg_next(&mut state) % (cap + 1);
                let encoded = encode_number(value, width);
                assert_eq!(encoded.len(), width);
                assert_eq!(decode_number(&encoded), value);
            }
        }
    }

    #[test]
    fn zero_encodes_as_254_digits() {
        assert_eq!(encode_number(0, 2), vec![1, 254]);
        assert_eq!(decode_number(&[254, 254]), 0);
        assert_eq!(decode_number(&[0, 0]), 0);
    }

    #[test]
    fn builder_tags_action_then_family() {
        let mut builder = PacketBuilder::new(PacketFamily::Door, PacketAction::Open);
        builder.add_char(12);
        builder.add_short(300);
        let packet = builder.finish();
        assert!(packet.is(PacketFamily::Door, PacketAction::Open));
        assert_eq!(packet.as_bytes()[0], PacketAction::Open as u8);
        assert_eq!(packet.as_bytes()[1], PacketFamily::Door as u8);

        let mut reader = PacketReader::new(packet.payload());
        assert_eq!(reader.read_char(), Some(12));
        assert_eq!(reader.read_short(), Some(300));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn break_string_terminated() {
        let mut builder = PacketBuilder::new(PacketFamily::Players, PacketAction::Agree);
        builder.add_break_string("Wren");
        let packet = builder.finish();
        assert_eq!(packet.payload(), b"Wren\xff");
    }

    #[test]
    fn reader_seek_supports_revisiting_offsets() {
        let data = [10u8, 20, 30, 40];
        let mut reader = PacketReader::new(&data);
        assert_eq!(reader.read_byte(), Some(10));
        assert_eq!(reader.skip(2), Some(()));
        assert_eq!(reader.seek(1), Some(()));
        assert_eq!(reader.read_byte(), Some(20));
        assert_eq!(reader.seek(5), None);
        assert_eq!(reader.seek(4), Some(()));
        assert_eq!(reader.read_byte(), None);
    }
}
