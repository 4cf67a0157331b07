//! In-flight request state.

use bytes::Bytes;

use crate::serialize::SerialKey;

/// One in-flight request.
///
/// A job owns its packet payload for its whole life; handlers parse through
/// cheap [`Bytes`] views of it. `seq` and `keys` are assigned by the
/// serializer when the job is registered in wire order.
#[derive(Debug)]
pub struct Job {
    /// Registration order, assigned by the serializer.
    pub seq: u64,
    /// The packet payload (everything after the length prefix).
    pub payload: Bytes,
    /// Resources this request contends on.
    pub keys: Vec<SerialKey>,
}

impl Job {
    pub fn new(payload: Bytes) -> Self {
        Self {
            seq: 0,
            payload,
            keys: Vec::new(),
        }
    }
}
