//! Wire layer: packet framing and the primitive SFTP type codec.
//!
//! Frames are a 4-byte big-endian length followed by that many payload
//! bytes. Inside a payload, the primitive types are fixed-width big-endian
//! integers and `u32`-length-prefixed byte strings.

mod decode;
mod encode;
mod frame;

#[cfg(test)]
mod proptest;

pub use decode::{PacketCursor, WireError};
pub use encode::PacketBuilder;
pub use frame::{read_packet, write_packet};
