//! Decoding cursor over a request payload.

use bytes::{Buf, Bytes};

/// A decode failure inside a packet body.
///
/// This is deliberately not a [`crate::Error`]: a malformed body only poisons
/// its own request (the dispatcher answers `SSH_FX_BAD_MESSAGE`), never the
/// stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// A read would run past the end of the payload.
    Truncated,
    /// A field held a value the protocol version does not allow.
    Invalid(&'static str),
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::Truncated => write!(f, "truncated field"),
            WireError::Invalid(what) => write!(f, "invalid field: {what}"),
        }
    }
}

impl std::error::Error for WireError {}

/// Cursor over one request payload.
///
/// The cursor shares the job's packet buffer; string reads are zero-copy
/// slices of it.
#[derive(Debug, Clone)]
pub struct PacketCursor {
    buf: Bytes,
}

impl PacketCursor {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    /// Bytes left to decode.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn u8(&mut self) -> Result<u8, WireError> {
        if self.buf.remaining() < 1 {
            return Err(WireError::Truncated);
        }
        Ok(self.buf.get_u8())
    }

    pub fn u16(&mut self) -> Result<u16, WireError> {
        if self.buf.remaining() < 2 {
            return Err(WireError::Truncated);
        }
        Ok(self.buf.get_u16())
    }

    pub fn u32(&mut self) -> Result<u32, WireError> {
        if self.buf.remaining() < 4 {
            return Err(WireError::Truncated);
        }
        Ok(self.buf.get_u32())
    }

    pub fn u64(&mut self) -> Result<u64, WireError> {
        if self.buf.remaining() < 8 {
            return Err(WireError::Truncated);
        }
        Ok(self.buf.get_u64())
    }

    /// A length-prefixed byte string. Binary-safe, not NUL-terminated.
    pub fn bytes(&mut self) -> Result<Bytes, WireError> {
        let len = self.u32()? as usize;
        if self.buf.remaining() < len {
            return Err(WireError::Truncated);
        }
        Ok(self.buf.copy_to_bytes(len))
    }

    /// A length-prefixed string that must be valid UTF-8.
    pub fn utf8(&mut self) -> Result<String, WireError> {
        let raw = self.bytes()?;
        String::from_utf8(raw.to_vec()).map_err(|_| WireError::Invalid("non-UTF-8 string"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(data: &[u8]) -> PacketCursor {
        PacketCursor::new(Bytes::copy_from_slice(data))
    }

    #[test]
    fn integers_decode_big_endian() {
        let mut c = cursor(&[
            0x01, // u8
            0x02, 0x03, // u16
            0x04, 0x05, 0x06, 0x07, // u32
            0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, // u64
        ]);
        assert_eq!(c.u8().unwrap(), 0x01);
        assert_eq!(c.u16().unwrap(), 0x0203);
        assert_eq!(c.u32().unwrap(), 0x04050607);
        assert_eq!(c.u64().unwrap(), 0x08090A0B0C0D0E0F);
        assert_eq!(c.remaining(), 0);
    }

    #[test]
    fn string_decodes_with_length_prefix() {
        let mut c = cursor(&[0, 0, 0, 3, b'a', b'b', b'c']);
        assert_eq!(c.bytes().unwrap().as_ref(), b"abc");
    }

    #[test]
    fn string_is_binary_safe() {
        let mut c = cursor(&[0, 0, 0, 2, 0x00, 0xFF]);
        assert_eq!(c.bytes().unwrap().as_ref(), &[0x00, 0xFF]);
    }

    #[test]
    fn short_integer_is_truncated() {
        let mut c = cursor(&[0x01, 0x02]);
        assert_eq!(c.u32().unwrap_err(), WireError::Truncated);
    }

    #[test]
    fn string_length_beyond_buffer_is_truncated() {
        let mut c = cursor(&[0, 0, 0, 10, b'x']);
        assert_eq!(c.bytes().unwrap_err(), WireError::Truncated);
    }

    #[test]
    fn empty_buffer_has_nothing() {
        let mut c = cursor(&[]);
        assert_eq!(c.remaining(), 0);
        assert_eq!(c.u8().unwrap_err(), WireError::Truncated);
    }
}
