//! # Style bits
//!
//! Every byte of a `Buffer` has a parallel style byte.  The layout is fixed,
//! it is persisted as raw values, and must not change between versions:
//!
//! bit | meaning
//! ----|--------
//! 0-2 | user style
//! 3   | data (as opposed to code)
//! 4   | differs from a comparison segment
//! 5   | search match
//! 6   | has a comment
//! 7   | selected

pub const USER_MASK: u8 = 0x07;
pub const DATA: u8 = 0x08;
pub const DIFF: u8 = 0x10;
pub const MATCH: u8 = 0x20;
pub const COMMENT: u8 = 0x40;
pub const SELECTED: u8 = 0x80;

/// Bits to OR in for the given user style, which is truncated to 3 bits
pub fn user_bits(user: u8) -> u8 {
    user & USER_MASK
}

/// Mask that clears `bits` when ANDed with a style byte
pub fn mask(bits: u8) -> u8 {
    !bits
}

/// Does the style byte carry every bit in `bits`
pub fn has(style: u8,bits: u8) -> bool {
    style & bits == bits
}
