use byteorder::{ByteOrder, LittleEndian};

/// Largest magnitude representable in one byte
pub const ONE_BYTE_MAX: u64 = 0xFF;

/// Largest magnitude representable in two bytes
pub const TWO_BYTE_MAX: u64 = 0xFFFF;

/// Largest magnitude representable in four bytes
pub const FOUR_BYTE_MAX: u64 = 0xFFFF_FFFF;

/// Smallest of {1, 2, 4, 8} bytes able to hold `max`.
#[inline]
pub fn byte_width(max: u64) -> u8 {
    if max <= ONE_BYTE_MAX {
        1
    } else if max <= TWO_BYTE_MAX {
        2
    } else if max <= FOUR_BYTE_MAX {
        4
    } else {
        8
    }
}

/// True for the widths a run header may carry
#[inline]
pub fn is_valid_width(width: u8) -> bool {
    matches!(width, 1 | 2 | 4 | 8)
}

/// Read a `width`-byte little-endian word from the start of `buf`.
/// `width` must be one of 1, 2, 4, 8 and `buf` at least that long.
#[inline]
pub fn read_word(buf: &[u8], width: u8) -> u64 {
    match width {
        1 => buf[0] as u64,
        2 => LittleEndian::read_u16(buf) as u64,
        4 => LittleEndian::read_u32(buf) as u64,
        8 => LittleEndian::read_u64(buf),
        _ => unreachable!("invalid word width {width}"),
    }
}

/// Write `value` as a `width`-byte little-endian word at the start of `buf`.
/// `value` must fit in `width` bytes.
#[inline]
pub fn write_word(buf: &mut [u8], width: u8, value: u64) {
    debug_assert!(width == 8 || value < (1u64 << (8 * width as u32)));
    match width {
        1 => buf[0] = value as u8,
        2 => LittleEndian::write_u16(buf, value as u16),
        4 => LittleEndian::write_u32(buf, value as u32),
        8 => LittleEndian::write_u64(buf, value),
        _ => unreachable!("invalid word width {width}"),
    }
}
