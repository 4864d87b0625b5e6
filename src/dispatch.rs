//! Off-thread execution and result delivery.
//!
//! A [`Worker`] is picked once when the client is built. Jobs never carry a
//! cancellation handle: dropping a [`ResponseFuture`] leaves the execution
//! running to completion.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::warn;

use crate::error::Error;
use crate::response::Response;
use crate::util::panic_message;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs execution jobs away from the caller's thread.
///
/// A worker that cannot run a job must drop it; the pending result then
/// resolves to [`Error::WorkerUnavailable`].
pub trait Worker: Send + Sync {
    fn spawn(&self, job: Job);
}

/// Runs jobs on the blocking pool of a Tokio runtime.
#[derive(Clone, Debug)]
pub struct RuntimeWorker {
    handle: Handle,
}

impl RuntimeWorker {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// The worker for the runtime the caller is running in, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Worker for RuntimeWorker {
    fn spawn(&self, job: Job) {
        drop(self.handle.spawn_blocking(job));
    }
}

/// Starts one named OS thread per job.
#[derive(Debug)]
pub struct ThreadWorker {
    name_prefix: String,
    spawned: AtomicUsize,
}

impl ThreadWorker {
    pub fn new(name_prefix: impl Into<String>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            spawned: AtomicUsize::new(0),
        }
    }
}

impl Default for ThreadWorker {
    fn default() -> Self {
        Self::new("mocha-worker")
    }
}

impl Worker for ThreadWorker {
    fn spawn(&self, job: Job) {
        let index = self.spawned.fetch_add(1, Ordering::Relaxed);
        let spawned = std::thread::Builder::new()
            .name(format!("{}-{index}", self.name_prefix))
            .spawn(job);
        if let Err(error) = spawned {
            warn!(error = %error, "failed to start worker thread");
        }
    }
}

pub(crate) fn default_worker() -> Arc<dyn Worker> {
    match RuntimeWorker::current() {
        Some(worker) => Arc::new(worker),
        None => Arc::new(ThreadWorker::default()),
    }
}

/// Result of an execution running on a worker.
///
/// Await it from async code, or call [`ResponseFuture::wait`] from a plain thread.
#[derive(Debug)]
#[must_use = "the response is lost unless the future is awaited or waited on"]
pub struct ResponseFuture {
    receiver: oneshot::Receiver<crate::Result<Response>>,
}

impl ResponseFuture {
    pub(crate) fn ready(result: crate::Result<Response>) -> Self {
        let (sender, receiver) = oneshot::channel();
        let _ = sender.send(result);
        Self { receiver }
    }

    /// Blocks the current thread until the execution finishes.
    ///
    /// Inside a Tokio runtime, including its blocking pool, this returns
    /// [`Error::WaitInsideRuntime`] without waiting; await the future there.
    pub fn wait(self) -> crate::Result<Response> {
        if Handle::try_current().is_ok() {
            return Err(Error::WaitInsideRuntime);
        }
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(Error::WorkerUnavailable))
    }
}

impl Future for ResponseFuture {
    type Output = crate::Result<Response>;

    fn poll(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        let receiver = &mut self.get_mut().receiver;
        Pin::new(receiver)
            .poll(context)
            .map(|received| received.unwrap_or(Err(Error::WorkerUnavailable)))
    }
}

pub(crate) fn spawn_execution<F>(worker: &dyn Worker, execution: F) -> ResponseFuture
where
    F: FnOnce() -> crate::Result<Response> + Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    worker.spawn(Box::new(move || {
        let _ = sender.send(execution());
    }));
    ResponseFuture { receiver }
}

/// Hands `result` to the callbacks.
///
/// A panicking success handler is reported to `on_error` as
/// [`Error::CallbackPanicked`]; a panicking error handler is logged and swallowed.
pub(crate) fn deliver_to_handlers<S, E>(result: crate::Result<Response>, on_success: S, on_error: E)
where
    S: FnOnce(Response),
    E: FnOnce(Error),
{
    let error = match result {
        Ok(response) => match catch_unwind(AssertUnwindSafe(move || on_success(response))) {
            Ok(()) => return,
            Err(payload) => Error::CallbackPanicked {
                message: panic_message(payload.as_ref()),
            },
        },
        Err(error) => error,
    };

    if let Err(payload) = catch_unwind(AssertUnwindSafe(move || on_error(error))) {
        warn!(
            panic = %panic_message(payload.as_ref()),
            "error handler panicked; failure dropped"
        );
    }
}

pub(crate) fn deliver_to_success<S>(result: crate::Result<Response>, on_success: S)
where
    S: FnOnce(Response),
{
    deliver_to_handlers(result, on_success, |error| {
        warn!(
            code = %error.code(),
            error = %error,
            "async request failed with no error handler"
        );
    });
}
