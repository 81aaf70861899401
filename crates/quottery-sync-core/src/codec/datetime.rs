use crate::types::QtryDateTime;

use super::layout::DATE_SIZE;
use super::WireLayout;

const PACKED_YEAR_BASE: u16 = 2024;
const LEGACY_YEAR_BASE: u16 = 2000;

/// Unpacks the 32-bit date word:
///
/// ```text
///  31      26 25  22 21   17 16   12 11     6 5      0
/// | year-2024 | month |  day  |  hour | minute | second |
/// ```
pub fn unpack_datetime(word: u32) -> QtryDateTime {
    QtryDateTime {
        year: (word >> 26) as u16 + PACKED_YEAR_BASE,
        month: ((word >> 22) & 0xF) as u8,
        day: ((word >> 17) & 0x1F) as u8,
        hour: ((word >> 12) & 0x1F) as u8,
        minute: ((word >> 6) & 0x3F) as u8,
        second: (word & 0x3F) as u8,
    }
}

/// Inverse of [`unpack_datetime`]. Each field is masked to its bit width;
/// years outside 2024..=2087 do not fit and wrap.
pub fn pack_datetime(dt: &QtryDateTime) -> u32 {
    let year = u32::from(dt.year.wrapping_sub(PACKED_YEAR_BASE)) & 0x3F;
    (year << 26)
        | ((u32::from(dt.month) & 0xF) << 22)
        | ((u32::from(dt.day) & 0x1F) << 17)
        | ((u32::from(dt.hour) & 0x1F) << 12)
        | ((u32::from(dt.minute) & 0x3F) << 6)
        | (u32::from(dt.second) & 0x3F)
}

/// Decodes one 4-byte date slot.
pub fn decode_date(layout: WireLayout, slot: [u8; DATE_SIZE]) -> QtryDateTime {
    match layout {
        WireLayout::Packed => unpack_datetime(u32::from_le_bytes(slot)),
        WireLayout::Legacy => QtryDateTime {
            year: LEGACY_YEAR_BASE + u16::from(slot[0]),
            month: slot[1],
            day: slot[2],
            hour: 0,
            minute: 0,
            second: 0,
        },
    }
}

/// Encodes one 4-byte date slot. The legacy layout drops the time of day.
pub fn encode_date(layout: WireLayout, dt: &QtryDateTime) -> [u8; DATE_SIZE] {
    match layout {
        WireLayout::Packed => pack_datetime(dt).to_le_bytes(),
        WireLayout::Legacy => [
            dt.year.saturating_sub(LEGACY_YEAR_BASE).min(u16::from(u8::MAX)) as u8,
            dt.month,
            dt.day,
            0,
        ],
    }
}
