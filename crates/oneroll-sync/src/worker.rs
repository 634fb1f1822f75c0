//! Sequential worker and callback dispatchers
//!
//! ## Flow
//!
//! ```text
//! caller ──submit──→ mpsc (FIFO) ──→ SequentialWorker ──→ job ──→ Dispatcher ──→ callback
//! ```
//!
//! A worker runs one job at a time in submission order. Each job runs in its
//! own task, so a panicking job is logged and the worker moves on.
//! Callbacks never run on the worker: the [`Dispatcher`] decides where they
//! execute.

use std::sync::{Mutex, PoisonError};

use futures_util::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// A unit of queued work
pub type Job = BoxFuture<'static, ()>;

/// A completion or progress callback
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

// ============================================================================
// SequentialWorker
// ============================================================================

/// Single-consumer FIFO job runner
///
/// [`shutdown`](Self::shutdown) stops accepting new jobs. Jobs already queued
/// and the one in flight still run to completion.
pub struct SequentialWorker {
    name: String,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SequentialWorker {
    /// Starts the worker task
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(name: impl Into<String>) -> Self {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(Self::run(name.clone(), rx));
        debug!(worker = %name, "Worker started");
        Self {
            name,
            sender: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        }
    }

    async fn run(name: String, mut rx: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = rx.recv().await {
            if let Err(e) = tokio::spawn(job).await {
                if e.is_panic() {
                    error!(worker = %name, "Job panicked, continuing with the next one");
                }
            }
        }
        debug!(worker = %name, "Worker drained");
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues the job built from `ctx`
    ///
    /// `build` runs only if the job is accepted; otherwise `ctx` is handed
    /// back so the caller can report the rejection.
    pub fn submit<C>(&self, ctx: C, build: impl FnOnce(C) -> Job) -> Result<(), C> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) if !tx.is_closed() => {
                if tx.send(build(ctx)).is_err() {
                    error!(worker = %self.name, "Worker stopped while accepting a job");
                }
                Ok(())
            }
            _ => Err(ctx),
        }
    }

    /// Stops accepting new jobs
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_some() {
            debug!(worker = %self.name, "Worker shutting down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Waits for every accepted job to finish
    ///
    /// Returns immediately unless [`shutdown`](Self::shutdown) was called
    /// first, since an open worker never drains.
    pub async fn join(&self) {
        if !self.is_shut_down() {
            return;
        }
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(worker = %self.name, error = %e, "Worker task failed");
            }
        }
    }
}

impl Drop for SequentialWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Dispatchers
// ============================================================================

/// Decides where completion and progress callbacks execute
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, callback: Callback);
}

/// Runs each callback as its own task on a runtime
#[derive(Debug, Clone)]
pub struct RuntimeDispatcher {
    handle: Handle,
}

impl RuntimeDispatcher {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Dispatcher for the runtime the caller is running on
    ///
    /// Must be called from within a Tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Dispatcher for RuntimeDispatcher {
    fn dispatch(&self, callback: Callback) {
        self.handle.spawn(async move { callback() });
    }
}

/// Creates a dispatcher whose callbacks run when the caller drains the queue
pub fn callback_channel() -> (ChannelDispatcher, CallbackQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelDispatcher { tx }, CallbackQueue { rx })
}

/// Queues callbacks for a caller-owned loop to run
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<Callback>,
}

impl Dispatcher for ChannelDispatcher {
    fn dispatch(&self, callback: Callback) {
        if self.tx.send(callback).is_err() {
            debug!("Callback queue dropped, discarding callback");
        }
    }
}

/// Receiving side of a [`ChannelDispatcher`]
pub struct CallbackQueue {
    rx: mpsc::UnboundedReceiver<Callback>,
}

impl CallbackQueue {
    /// Waits for the next callback and runs it
    ///
    /// Returns false once every dispatcher is gone and the queue is empty.
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Runs every callback already queued, without waiting
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(callback) = self.rx.try_recv() {
            callback();
            ran += 1;
        }
        ran
    }
}

impl std::fmt::Debug for CallbackQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackQueue").finish_non_exhaustive()
    }
}
