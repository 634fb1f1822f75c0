//! Queued front end over the [`SyncEngine`]
//!
//! A [`SyncCoordinator`] owns one [`SequentialWorker`]: operations submitted
//! to the same coordinator run strictly in submission order, while separate
//! coordinators (typically one for uploads, one for downloads) run
//! concurrently. Results never propagate as panics or raised errors; every
//! operation completes by invoking its callback through the coordinator's
//! [`Dispatcher`]. An operation that panics completes with
//! [`SyncError::Panicked`] and the next queued operation still runs.
//!
//! Nothing is cancellable once accepted. [`SyncCoordinator::shutdown`] only
//! stops new work from being accepted; work submitted afterwards completes
//! with [`SyncError::ShutDown`].

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::FutureExt;
use oneroll_core::domain::SyncConfig;
use tracing::{debug, warn};

use crate::engine::{DownloadProgress, SyncEngine, SyncReport};
use crate::worker::{Dispatcher, SequentialWorker};
use crate::SyncError;

pub struct SyncCoordinator {
    name: String,
    engine: SyncEngine,
    worker: SequentialWorker,
    dispatcher: Arc<dyn Dispatcher>,
}

impl SyncCoordinator {
    /// Creates a coordinator and starts its worker
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(name: impl Into<String>, engine: SyncEngine, dispatcher: Arc<dyn Dispatcher>) -> Self {
        let name = name.into();
        Self {
            worker: SequentialWorker::spawn(name.clone()),
            name,
            engine,
            dispatcher,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues a download of this device's missing photos
    pub fn sync_own_photos<F>(&self, config: SyncConfig, on_done: F)
    where
        F: FnOnce(Result<SyncReport, SyncError>) + Send + 'static,
    {
        let engine = self.engine.clone();
        self.submit(
            "sync_own_photos",
            async move { engine.sync_own(&config).await },
            on_done,
        );
    }

    /// Queues an occasion-wide download
    ///
    /// `on_progress` is dispatched after every successful download, before
    /// `on_done`.
    pub fn sync_occasion_photos<P, F>(&self, config: SyncConfig, on_progress: P, on_done: F)
    where
        P: Fn(DownloadProgress) + Send + Sync + 'static,
        F: FnOnce(Result<SyncReport, SyncError>) + Send + 'static,
    {
        let engine = self.engine.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        let on_progress = Arc::new(on_progress);
        self.submit(
            "sync_occasion_photos",
            async move {
                let relay = move |progress: DownloadProgress| {
                    let on_progress = Arc::clone(&on_progress);
                    dispatcher.dispatch(Box::new(move || (*on_progress)(progress)));
                };
                engine.sync_occasion(&config, Some(&relay)).await
            },
            on_done,
        );
    }

    /// Queues an upload of one local photo
    pub fn upload_photo<F>(&self, config: SyncConfig, file: PathBuf, on_done: F)
    where
        F: FnOnce(Result<(), SyncError>) + Send + 'static,
    {
        let engine = self.engine.clone();
        self.submit(
            "upload_photo",
            async move { engine.upload(&config, &file).await },
            on_done,
        );
    }

    /// Stops accepting new work; queued and in-flight work still completes
    pub fn shutdown(&self) {
        debug!(coordinator = %self.name, "Coordinator shutting down");
        self.worker.shutdown();
    }

    /// Shuts down and waits for every accepted operation to finish
    ///
    /// Callbacks may still be pending in the dispatcher when this returns.
    pub async fn drain(&self) {
        self.shutdown();
        self.worker.join().await;
    }

    fn submit<T, Fut, F>(&self, operation: &'static str, work: Fut, on_done: F)
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, SyncError>> + Send + 'static,
        F: FnOnce(Result<T, SyncError>) + Send + 'static,
    {
        let dispatcher = Arc::clone(&self.dispatcher);
        let coordinator = self.name.clone();
        let accepted = self.worker.submit(on_done, move |on_done| {
            async move {
                debug!(coordinator = %coordinator, operation, "Operation started");
                let result = match AssertUnwindSafe(work).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => Err(SyncError::Panicked {
                        operation,
                        message: panic_message(payload.as_ref()),
                    }),
                };
                if let Err(e) = &result {
                    warn!(coordinator = %coordinator, operation, error = %e, "Operation failed");
                }
                dispatcher.dispatch(Box::new(move || on_done(result)));
            }
            .boxed()
        });

        if let Err(on_done) = accepted {
            warn!(coordinator = %self.name, operation, "Rejected operation after shutdown");
            self.dispatcher
                .dispatch(Box::new(move || on_done(Err(SyncError::ShutDown))));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
