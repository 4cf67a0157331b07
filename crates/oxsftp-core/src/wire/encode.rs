//! Response construction with deferred length back-patching.

use bytes::{BufMut, Bytes, BytesMut};

/// Builder for outbound packets.
///
/// Each worker owns one builder and reuses its buffer across responses.
/// `begin` reserves the frame length word, `end` back-patches it and hands
/// back the finished frame; `sub_begin`/`sub_end` do the same for nested
/// length-prefixed blocks (the `supported`, `supported2` and `vendor-id`
/// payloads of VERSION).
#[derive(Debug, Default)]
pub struct PacketBuilder {
    buf: BytesMut,
}

impl PacketBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame. Any unfinished previous content is discarded.
    pub fn begin(&mut self) {
        self.buf.clear();
        self.buf.put_u32(0);
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn u16(&mut self, v: u16) {
        self.buf.put_u16(v);
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    pub fn u64(&mut self, v: u64) {
        self.buf.put_u64(v);
    }

    pub fn bytes(&mut self, v: &[u8]) {
        self.buf.put_u32(v.len() as u32);
        self.buf.put_slice(v);
    }

    pub fn str(&mut self, v: &str) {
        self.bytes(v.as_bytes());
    }

    /// Raw append without a length prefix (READ data is already counted).
    pub fn raw(&mut self, v: &[u8]) {
        self.buf.put_slice(v);
    }

    /// Open a nested length-prefixed block; returns the patch offset.
    pub fn sub_begin(&mut self) -> usize {
        let offset = self.buf.len();
        self.buf.put_u32(0);
        offset
    }

    /// Close a nested block, back-patching its length word with the byte
    /// count written since the matching `sub_begin`.
    pub fn sub_end(&mut self, offset: usize) {
        let len = (self.buf.len() - offset - 4) as u32;
        self.buf[offset..offset + 4].copy_from_slice(&len.to_be_bytes());
    }

    /// Finish the frame: back-patch the outer length and take the bytes.
    /// The builder is ready for the next `begin` afterwards.
    pub fn end(&mut self) -> Bytes {
        let len = (self.buf.len() - 4) as u32;
        self.buf[0..4].copy_from_slice(&len.to_be_bytes());
        self.buf.split().freeze()
    }
}
