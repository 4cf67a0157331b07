//! Property-based tests for the wire codec.
//!
//! These verify:
//! - Encode/decode roundtrip for every primitive
//! - The frame length always equals the bytes written between begin and end
//! - The cursor never panics on arbitrary input

#![cfg(test)]

use bytes::Bytes;
use proptest::prelude::*;

use super::{PacketBuilder, PacketCursor};

proptest! {
    #[test]
    fn integer_roundtrip(a in any::<u8>(), b in any::<u16>(), c in any::<u32>(), d in any::<u64>()) {
        let mut out = PacketBuilder::new();
        out.begin();
        out.u8(a);
        out.u16(b);
        out.u32(c);
        out.u64(d);
        let frame = out.end();

        let mut cursor = PacketCursor::new(Bytes::copy_from_slice(&frame[4..]));
        prop_assert_eq!(cursor.u8().unwrap(), a);
        prop_assert_eq!(cursor.u16().unwrap(), b);
        prop_assert_eq!(cursor.u32().unwrap(), c);
        prop_assert_eq!(cursor.u64().unwrap(), d);
        prop_assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn string_roundtrip(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut out = PacketBuilder::new();
        out.begin();
        out.bytes(&data);
        let frame = out.end();

        let mut cursor = PacketCursor::new(Bytes::copy_from_slice(&frame[4..]));
        let bytes = cursor.bytes().unwrap();
        prop_assert_eq!(bytes.as_ref(), data.as_slice());
    }

    #[test]
    fn frame_length_matches_payload(strings in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..8)) {
        let mut out = PacketBuilder::new();
        out.begin();
        for s in &strings {
            out.bytes(s);
        }
        let frame = out.end();

        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        prop_assert_eq!(len, frame.len() - 4);
    }

    #[test]
    fn sub_block_length_matches_content(inner in prop::collection::vec(any::<u8>(), 0..128)) {
        let mut out = PacketBuilder::new();
        out.begin();
        let sub = out.sub_begin();
        out.raw(&inner);
        out.sub_end(sub);
        let frame = out.end();

        let len = u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]) as usize;
        prop_assert_eq!(len, inner.len());
    }

    #[test]
    fn cursor_never_panics(data in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut cursor = PacketCursor::new(Bytes::from(data));
        let _ = cursor.u8();
        let _ = cursor.u32();
        let _ = cursor.bytes();
        let _ = cursor.u64();
        let _ = cursor.u16();
    }
}
