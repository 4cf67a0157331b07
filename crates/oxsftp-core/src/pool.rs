//! Bounded worker pool.
//!
//! Workers are long-lived tasks sharing one bounded FIFO. Each worker owns
//! its context (output buffer, charset converters) for its whole life and
//! processes many jobs serially. The pool is created only after version
//! negotiation settles; see the engine's deferred-activation rule.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::{process_job, Session, WorkerContext};
use crate::job::Job;

/// A fixed-size pool of worker tasks fed by a bounded queue.
pub struct WorkerPool {
    tx: mpsc::Sender<Job>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` tasks consuming a queue bounded at `queue_depth`.
    pub fn start(session: Arc<Session>, workers: usize, queue_depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let handles = (0..workers.max(1))
            .map(|index| {
                let session = Arc::clone(&session);
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    let mut ctx = WorkerContext::new();
                    debug!(worker = index, "worker started");
                    loop {
                        // Holding the lock while waiting keeps dequeue FIFO
                        // across workers; it is released before processing.
                        let job = { rx.lock().await.recv().await };
                        let Some(job) = job else { break };
                        process_job(&session, job, &mut ctx).await;
                    }
                    debug!(worker = index, "worker stopped");
                })
            })
            .collect();
        Self { tx, handles }
    }

    /// Enqueue a job. Blocks while the queue is full; that stall is the
    /// backpressure path from the worker pool back to the reader.
    pub async fn submit(&self, job: Job) {
        if self.tx.send(job).await.is_err() {
            warn!("worker pool receiver is gone; dropping job");
        }
    }

    /// Close the queue, let submitted jobs finish, and join the workers.
    pub async fn shutdown(self) {
        drop(self.tx);
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker task failed");
            }
        }
    }
}
