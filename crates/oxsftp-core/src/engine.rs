//! Top-level request loop, dispatch and version negotiation.
//!
//! The engine reads frames from the peer, registers each job with the
//! serializer in wire order, and either processes it inline (before the
//! worker pool exists) or submits it to the pool. Dispatch binary-searches
//! the current protocol descriptor's command table; the INIT handler is the
//! only command the engine implements itself, everything else is delegated
//! to the session's [`RequestHandler`].
//!
//! The pool starts right after a v3/v4/v5 INIT response. After a v6 INIT it
//! is deferred until the first non-INIT request completes, because that
//! request may be `version-select` and must not race any newly sent
//! requests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace, warn};

use crate::attrs::FileAttributes;
use crate::charset::PathCodec;
use crate::constants::*;
use crate::error::Result;
use crate::job::Job;
use crate::pool::WorkerPool;
use crate::proto::{self, Command, ProtocolDescriptor, PRE_INIT};
use crate::serialize::Serializer;
use crate::status::{io_error_to_status, status_to_string};
use crate::wire::{self, PacketBuilder, PacketCursor};

/// Output half of the peer stream.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Refuse mutating operations (enforced by the request handler).
    pub readonly: bool,
    /// Expect v3 SYMLINK arguments in (targetpath, linkpath) order and say
    /// so in the advertised `symlink-order` extension.
    pub reverse_symlink: bool,
    /// Worker pool size.
    pub workers: usize,
    /// Bound on the pending-job queue.
    pub queue_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            readonly: false,
            reverse_symlink: false,
            workers: DEFAULT_WORKERS,
            queue_depth: WORK_QUEUE_DEPTH,
        }
    }
}

/// Result of one handler invocation.
#[derive(Debug)]
pub enum Outcome {
    /// The handler built and sent its own response.
    Responded,
    /// Emit a STATUS response with this code and its canonical message.
    Status(u32),
    /// Emit a STATUS response mapped from a host error.
    Errno(std::io::Error),
}

/// External request handler: everything except INIT.
///
/// The filesystem lives behind this trait; the engine only parses the type
/// and id, enforces ordering, and turns the outcome into a response.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, command: Command, request: &mut Request<'_>) -> Outcome;
}

/// Long-lived resources of one processing slot.
///
/// One context exists per worker (plus one for the inline phase); it is
/// created at worker startup and dropped at worker shutdown.
#[derive(Debug, Default)]
pub struct WorkerContext {
    pub out: PacketBuilder,
    pub paths: PathCodec,
}

impl WorkerContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Connection-wide state shared by the reader and all workers.
pub struct Session {
    protocol: RwLock<&'static ProtocolDescriptor>,
    config: SessionConfig,
    pub(crate) serializer: Serializer,
    output: tokio::sync::Mutex<BoxedWriter>,
    pool_active: AtomicBool,
    handler: Arc<dyn RequestHandler>,
}

impl Session {
    fn new(config: SessionConfig, handler: Arc<dyn RequestHandler>, output: BoxedWriter) -> Self {
        Self {
            protocol: RwLock::new(&PRE_INIT),
            config,
            serializer: Serializer::new(),
            output: tokio::sync::Mutex::new(output),
            pool_active: AtomicBool::new(false),
            handler,
        }
    }

    /// The current protocol descriptor. Starts at the pre-init sentinel and
    /// is swapped exactly once, by the INIT handler, before the pool exists.
    pub fn protocol(&self) -> &'static ProtocolDescriptor {
        *self.protocol.read().expect("protocol lock poisoned")
    }

    fn set_protocol(&self, descriptor: &'static ProtocolDescriptor) {
        *self.protocol.write().expect("protocol lock poisoned") = descriptor;
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether v3 SYMLINK arguments arrive in reversed order. Only v3
    /// clients are affected; the flag is inert for v4+.
    pub fn reverse_symlink(&self) -> bool {
        self.config.reverse_symlink && self.protocol().version == 3
    }

    /// Whether the worker pool has been created (test hook for the
    /// deferred-activation rule).
    pub fn pool_active(&self) -> bool {
        self.pool_active.load(Ordering::SeqCst)
    }

    /// Write one finished frame to the peer.
    pub(crate) async fn send(&self, frame: Bytes) -> Result<()> {
        let mut output = self.output.lock().await;
        wire::write_packet(&mut *output, &frame).await
    }
}

/// One request as a handler sees it: the parsed id, a cursor over the rest
/// of the body, and the worker's resources for building the response.
pub struct Request<'a> {
    pub id: u32,
    pub cursor: PacketCursor,
    pub worker: &'a mut WorkerContext,
    session: &'a Session,
}

impl Request<'_> {
    /// Negotiated protocol version.
    pub fn version(&self) -> u32 {
        self.session.protocol().version
    }

    pub fn readonly(&self) -> bool {
        self.session.config.readonly
    }

    pub fn reverse_symlink(&self) -> bool {
        self.session.reverse_symlink()
    }

    /// The response builder. Callers composing a response by hand should
    /// `begin()` it, write the body, then [`Request::finish`].
    pub fn out(&mut self) -> &mut PacketBuilder {
        &mut self.worker.out
    }

    pub fn paths(&self) -> &PathCodec {
        &self.worker.paths
    }

    /// Send whatever the builder holds and report `Responded`. A send
    /// failure is logged; the reader will notice the dead stream shortly.
    pub async fn finish(&mut self) -> Outcome {
        let frame = self.worker.out.end();
        if let Err(e) = self.session.send(frame).await {
            warn!(error = %e, "failed to send response");
        }
        Outcome::Responded
    }

    /// Respond with a HANDLE packet.
    pub async fn respond_handle(&mut self, handle: &[u8]) -> Outcome {
        let id = self.id;
        let out = self.out();
        out.begin();
        out.u8(SSH_FXP_HANDLE);
        out.u32(id);
        out.bytes(handle);
        self.finish().await
    }

    /// Respond with a DATA packet.
    pub async fn respond_data(&mut self, data: &[u8]) -> Outcome {
        let id = self.id;
        let out = self.out();
        out.begin();
        out.u8(SSH_FXP_DATA);
        out.u32(id);
        out.bytes(data);
        self.finish().await
    }

    /// Respond with an ATTRS packet encoded for the negotiated version.
    pub async fn respond_attrs(&mut self, attrs: &FileAttributes) -> Outcome {
        let id = self.id;
        let version = self.version();
        let out = self.out();
        out.begin();
        out.u8(SSH_FXP_ATTRS);
        out.u32(id);
        attrs.encode(version, out);
        self.finish().await
    }
}

/// The engine: reader loop plus deferred pool management.
pub struct Engine {
    session: Arc<Session>,
    pool: Option<WorkerPool>,
    inline_ctx: WorkerContext,
}

impl Engine {
    pub fn new(
        config: SessionConfig,
        handler: Arc<dyn RequestHandler>,
        output: BoxedWriter,
    ) -> Self {
        Self {
            session: Arc::new(Session::new(config, handler, output)),
            pool: None,
            inline_ctx: WorkerContext::new(),
        }
    }

    /// Shared session state; clone before `run` to observe the connection
    /// from tests or the surrounding server.
    pub fn session(&self) -> Arc<Session> {
        Arc::clone(&self.session)
    }

    /// Serve the connection until clean EOF (`Ok`) or a stream-level error.
    /// Either way the pool is drained and joined before returning.
    pub async fn run<R>(mut self, mut input: R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let result = self.read_loop(&mut input).await;
        if let Some(pool) = self.pool.take() {
            debug!("draining worker pool");
            pool.shutdown().await;
        }
        result
    }

    async fn read_loop<R>(&mut self, input: &mut R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        while let Some(payload) = wire::read_packet(input).await? {
            trace!(
                len = payload.len(),
                preview = %hex_preview(&payload),
                "request packet"
            );
            let mut job = Job::new(payload);
            self.session.serializer.register(&mut job);
            match &self.pool {
                Some(pool) => pool.submit(job).await,
                None => {
                    let type_code = process_job(&self.session, job, &mut self.inline_ctx).await;
                    self.maybe_activate_pool(type_code);
                }
            }
        }
        debug!("peer closed the stream");
        Ok(())
    }

    /// One-shot transition from inline processing to the pool.
    fn maybe_activate_pool(&mut self, type_code: u8) {
        if self.pool.is_some() {
            return;
        }
        let protocol = self.session.protocol();
        if protocol.is_pre_init() {
            return;
        }
        // v3-v5 go parallel right after INIT; v6 waits out one more request
        // in case it is version-select.
        if protocol.version < 6 || type_code != SSH_FXP_INIT {
            debug!(
                workers = self.session.config.workers,
                "activating worker pool"
            );
            self.pool = Some(WorkerPool::start(
                Arc::clone(&self.session),
                self.session.config.workers,
                self.session.config.queue_depth,
            ));
            self.session.pool_active.store(true, Ordering::SeqCst);
        }
    }
}

/// Process one job to completion: parse the header, dispatch, emit any
/// pending STATUS, release the serializer. Returns the request type byte
/// (0 when the payload was empty).
pub(crate) async fn process_job(session: &Session, job: Job, ctx: &mut WorkerContext) -> u8 {
    let type_code = dispatch_job(session, &job, ctx).await;
    session.serializer.release(&job);
    type_code
}

async fn dispatch_job(session: &Session, job: &Job, ctx: &mut WorkerContext) -> u8 {
    let mut cursor = PacketCursor::new(job.payload.clone());

    // Empty messages are never valid.
    let Ok(type_code) = cursor.u8() else {
        send_status(session, ctx, 0, SSH_FX_BAD_MESSAGE, Some("empty request")).await;
        return 0;
    };

    // Everything but INIT carries an id.
    let mut id = 0;
    if type_code != SSH_FXP_INIT {
        match cursor.u32() {
            Ok(value) => id = value,
            Err(_) => {
                send_status(session, ctx, 0, SSH_FX_BAD_MESSAGE, Some("missing ID field")).await;
                return type_code;
            }
        }
    }

    let protocol = session.protocol();
    let Some(command) = protocol.lookup(type_code) else {
        send_status(session, ctx, id, SSH_FX_OP_UNSUPPORTED, None).await;
        return type_code;
    };

    // Wait for conflicting predecessors before the handler may observe
    // shared state.
    session.serializer.acquire(job).await;

    let mut request = Request {
        id,
        cursor,
        worker: &mut *ctx,
        session,
    };
    let outcome = if command == Command::Init {
        init_handler(session, &mut request).await
    } else {
        session.handler.handle(command, &mut request).await
    };

    match outcome {
        Outcome::Responded => {}
        Outcome::Status(status) => send_status(session, ctx, id, status, None).await,
        Outcome::Errno(err) => {
            let (status, message) = io_error_to_status(&err);
            send_status(session, ctx, id, status, Some(&message)).await;
        }
    }
    type_code
}

/// Emit a STATUS response. The message is chosen from the unclamped code;
/// codes above the version's range are then clamped to SSH_FX_FAILURE.
pub(crate) async fn send_status(
    session: &Session,
    ctx: &mut WorkerContext,
    id: u32,
    status: u32,
    message: Option<&str>,
) {
    let text = match message {
        Some(text) => text,
        None => status_to_string(status),
    };
    let status = if status > session.protocol().max_status {
        SSH_FX_FAILURE
    } else {
        status
    };
    let out = &mut ctx.out;
    out.begin();
    out.u8(SSH_FXP_STATUS);
    out.u32(id);
    out.u32(status);
    out.str(text);
    out.str("en");
    let frame = out.end();
    if let Err(e) = session.send(frame).await {
        warn!(error = %e, "failed to send status response");
    }
}

/// The INIT handler: pick the descriptor for the client's version, swap it
/// in, and emit the VERSION response with this server's capability set.
async fn init_handler(session: &Session, request: &mut Request<'_>) -> Outcome {
    // Cannot initialize more than once.
    if !session.protocol().is_pre_init() {
        return Outcome::Status(SSH_FX_FAILURE);
    }
    let client_version = match request.cursor.u32() {
        Ok(value) => value,
        Err(_) => return Outcome::Status(SSH_FX_BAD_MESSAGE),
    };
    let Some(protocol) = proto::select(client_version) else {
        return Outcome::Status(SSH_FX_OP_UNSUPPORTED);
    };
    session.set_protocol(protocol);
    debug!(client_version, negotiated = protocol.version, "initialized");

    let reverse = session.reverse_symlink();
    let out = &mut request.worker.out;
    out.begin();
    out.u8(SSH_FXP_VERSION);
    out.u32(protocol.version);
    if protocol.version >= 4 {
        // From v4 on the client must send "\n", which frees the server from
        // translating text-file line endings.
        out.str("newline");
        out.str("\n");
    }
    if protocol.version == 5 {
        out.str("supported");
        let sub = out.sub_begin();
        out.u32(protocol.attr_bits);
        out.u32(0); // supported-attribute-bits
        out.u32(protocol.open_flags);
        out.u32(protocol.access_mask);
        // A non-zero max-read-size would promise exact-length reads, which
        // pipe-backed files cannot honor; short reads must stay legal.
        out.u32(0);
        for name in protocol.extensions {
            out.str(name);
        }
        out.sub_end(sub);
    }
    if protocol.version >= 6 {
        out.str("supported2");
        let sub = out.sub_begin();
        out.u32(protocol.attr_bits);
        out.u32(0); // supported-attribute-bits
        out.u32(protocol.open_flags);
        out.u32(protocol.access_mask);
        out.u32(0); // max-read-size, as above
        out.u16(0); // supported-open-block-vector
        out.u16(0); // supported-block-vector
        out.u32(0); // attrib-extension-count
        out.u32(protocol.extensions.len() as u32);
        for name in protocol.extensions {
            out.str(name);
        }
        out.sub_end(sub);
        out.str("versions");
        out.str("3,4,5,6");
    }
    out.str("vendor-id");
    let sub = out.sub_begin();
    out.str(VENDOR_NAME);
    out.str(PRODUCT_NAME);
    out.str(env!("CARGO_PKG_VERSION"));
    out.u64(0);
    out.sub_end(sub);
    // Documents the SSH_FXP_SYMLINK argument order this server expects,
    // which v3 clients historically disagree on.
    out.str(EXT_SYMLINK_ORDER);
    out.str(if reverse {
        "targetpath-linkpath"
    } else {
        "linkpath-targetpath"
    });
    if protocol.version >= 6 {
        out.str(EXT_LINK_ORDER);
        out.str("linkpath-targetpath");
    }
    request.finish().await
}

fn hex_preview(bytes: &[u8]) -> String {
    const LIMIT: usize = 32;
    let mut preview = String::with_capacity(2 * LIMIT + 2);
    for byte in bytes.iter().take(LIMIT) {
        preview.push_str(&format!("{byte:02x}"));
    }
    if bytes.len() > LIMIT {
        preview.push_str("..");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_preview_truncates() {
        assert_eq!(hex_preview(&[0x01, 0xAB]), "01ab");
        let long = vec![0u8; 40];
        let preview = hex_preview(&long);
        assert!(preview.ends_with(".."));
        assert_eq!(preview.len(), 66);
    }

    #[test]
    fn default_config_matches_tunables() {
        let config = SessionConfig::default();
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.queue_depth, WORK_QUEUE_DEPTH);
        assert!(!config.readonly);
    }
}
