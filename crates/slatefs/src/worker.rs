//! Serialized task execution and periodic autosave.
//!
//! Every submitted task runs to completion on a single worker before
//! the next one starts, so concurrent front-ends get strict
//! serialization without holding locks across await points. Completion
//! is reported back over a oneshot channel per task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::SlateFs;

/// Dirty snapshots are flushed this often.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

type Job = Box<dyn FnOnce(&SlateFs) + Send>;

/// Handle for submitting tasks to the worker. Cloneable; dropping the
/// last handle lets the worker drain and exit.
#[derive(Clone)]
pub struct TaskWorker {
    tx: mpsc::Sender<Job>,
}

impl TaskWorker {
    /// Spawn the worker loop on the current runtime.
    pub fn spawn(fs: Arc<SlateFs>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Job>(64);
        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job(&fs);
            }
            debug!("task worker drained");
        });
        (Self { tx }, handle)
    }

    /// Run `f` on the worker and wait for its result. Fails only when
    /// the worker has shut down.
    pub async fn submit<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&SlateFs) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::new(move |fs| {
            let _ = done_tx.send(f(fs));
        });
        self.tx.send(job).await.map_err(|_| worker_stopped())?;
        done_rx.await.map_err(|_| worker_stopped())
    }
}

fn worker_stopped() -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionAborted,
        "task worker stopped",
    ))
}

/// Flush the snapshot on a fixed interval whenever the store is dirty.
/// Save failures are logged and retried on the next tick; the loop
/// itself never gives up.
pub fn spawn_autosave(fs: Arc<SlateFs>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if !fs.is_dirty() {
                continue;
            }
            match fs.save() {
                Ok(()) => debug!("autosave flushed snapshot"),
                Err(err) => warn!(error = %err, "autosave failed"),
            }
        }
    })
}
