//! oxsftp-core: SFTP v3-v6 server engine.
//!
//! This crate provides:
//! - Length-prefixed packet framing and the primitive wire codec
//! - Per-version protocol descriptors and binary-search dispatch
//! - The request loop with version negotiation (INIT/VERSION)
//! - A deferred-activation worker pool with a bounded queue
//! - Request serialization for operations contending on shared resources
//! - Host-errno to SFTP status mapping with per-version clamping
//! - Attribute and filename-encoding codecs
//!
//! Filesystem semantics live behind the [`RequestHandler`] trait; the
//! engine never touches the filesystem itself.

pub mod attrs;
pub mod charset;
pub mod constants;
pub mod engine;
pub mod error;
pub mod job;
pub mod logging;
pub mod pool;
pub mod proto;
pub mod serialize;
pub mod status;
pub mod wire;

pub use engine::{
    BoxedWriter, Engine, Outcome, Request, RequestHandler, Session, SessionConfig, WorkerContext,
};
pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat};
pub use proto::Command;
