use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error};
use tokio::sync::mpsc;

use crate::lookup::SystemLookup;
use crate::route::{CancelToken, PlotError, PlottedRoute, RouteEntry, RoutePlotter};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;
const WORKER_THREAD_NAME: &str = "route-plotter";

/// Consumer side of a plot running on its own thread.
///
/// Entries arrive through a bounded channel, so the worker never runs more
/// than the channel capacity ahead of whoever is draining it. Dropping the
/// handle, or calling [`join`](Self::join) before the walk finishes, closes the
/// channel and the worker stops at its next entry.
pub struct RouteHandle {
    entries: mpsc::Receiver<RouteEntry>,
    cancel: CancelToken,
    worker: JoinHandle<Result<PlottedRoute, PlotError>>,
}

/// Starts plotting on a dedicated thread.
///
/// The request was validated when `plotter` was built, so configuration errors
/// never reach the worker.
pub fn spawn_route<L>(
    plotter: RoutePlotter,
    lookup: Arc<L>,
    capacity: usize,
) -> Result<RouteHandle, PlotError>
where
    L: SystemLookup + Send + Sync + ?Sized + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();

    let worker = thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || run_worker(plotter, lookup, tx, worker_cancel))
        .map_err(PlotError::WorkerStart)?;

    Ok(RouteHandle {
        entries: rx,
        cancel,
        worker,
    })
}

fn run_worker<L>(
    plotter: RoutePlotter,
    lookup: Arc<L>,
    tx: mpsc::Sender<RouteEntry>,
    cancel: CancelToken,
) -> Result<PlottedRoute, PlotError>
where
    L: SystemLookup + ?Sized,
{
    // only drives the send/cancel race below, no I/O or timers needed
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(PlotError::WorkerStart)?;

    let result = plotter.route_iterative(&*lookup, &cancel, |entry| {
        let send = tx.send(entry);
        rt.block_on(async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => ControlFlow::Break(()),
                sent = send => match sent {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(_) => {
                        debug!("route consumer went away, stopping");
                        ControlFlow::Break(())
                    }
                },
            }
        })
    });

    if let Err(err) = &result {
        error!("route plotting failed: {err}");
    }
    result
}

impl RouteHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Next entry, or `None` once the worker has finished or stopped.
    pub async fn recv(&mut self) -> Option<RouteEntry> {
        self.entries.recv().await
    }

    /// Blocking variant of [`recv`](Self::recv). Must not be called from
    /// inside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<RouteEntry> {
        self.entries.blocking_recv()
    }

    /// Waits for the worker and returns the systems it resolved.
    pub fn join(self) -> Result<PlottedRoute, PlotError> {
        let RouteHandle {
            entries, worker, ..
        } = self;
        drop(entries);
        worker.join().map_err(|_| PlotError::WorkerPanicked)?
    }
}

impl Iterator for RouteHandle {
    type Item = RouteEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.blocking_recv()
    }
}
