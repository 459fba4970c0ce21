//! Execution contexts that run injections and subscriber callbacks.
//!
//! The bus never runs a callback on the task that reads a subscription's
//! feed. Every unit of work is handed to a [`DispatchContext`], which decides
//! where it runs: a tokio worker pool ([`TokioContext`]) or a single named
//! thread that executes jobs one at a time ([`SerialContext`], the
//! equivalent of a UI thread).
//!
//! ## Rules
//! - `submit` is eager: the job is queued or spawned before it returns.
//!   Dropping the returned [`Completion`] does not cancel the job.
//! - Panics inside a job are caught and reported as
//!   [`DispatchError::Panicked`].

use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tokio::runtime::{Builder, Handle};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::error::{BusError, BusResult, DispatchError, HandlerError};

/// Outcome of one unit of work.
pub type JobResult = Result<(), HandlerError>;

/// A unit of work: a boxed future run to completion on some context.
pub type Job = BoxFuture<'static, JobResult>;

/// Resolves once a submitted job has finished.
pub type Completion = BoxFuture<'static, Result<(), DispatchError>>;

/// Opaque "run this unit of work on context C" capability.
pub trait DispatchContext: Send + Sync + fmt::Debug {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Hand a job off to this context.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] if the context cannot accept work (no
    /// runtime, or the context was shut down).
    fn submit(&self, job: Job) -> Result<Completion, DispatchError>;
}

/// Background context backed by a tokio runtime.
///
/// Without an explicit handle the runtime is resolved when a job is
/// submitted, so the context can be created outside of any runtime.
#[derive(Debug, Clone)]
pub struct TokioContext {
    name: String,
    handle: Option<Handle>,
}

impl TokioContext {
    /// Name of the default background context.
    pub const DEFAULT_NAME: &'static str = "background";

    /// Context that spawns onto whichever runtime is current at submit time.
    #[must_use]
    pub fn current() -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_owned(),
            handle: None,
        }
    }

    /// Context bound to a specific runtime.
    #[must_use]
    pub fn with_handle(name: impl Into<String>, handle: Handle) -> Self {
        Self {
            name: name.into(),
            handle: Some(handle),
        }
    }

    fn handle(&self) -> Result<Handle, DispatchError> {
        match &self.handle {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current().map_err(|_| DispatchError::NoRuntime {
                context: self.name.clone(),
            }),
        }
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::current()
    }
}

impl DispatchContext for TokioContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn submit(&self, job: Job) -> Result<Completion, DispatchError> {
        let task = self.handle()?.spawn(job);
        Ok(Box::pin(async move {
            match task.await {
                Ok(outcome) => outcome.map_err(DispatchError::Failed),
                Err(err) if err.is_panic() => {
                    Err(DispatchError::Panicked(panic_message(&*err.into_panic())))
                },
                Err(_) => Err(DispatchError::Aborted),
            }
        }))
    }
}

type SerialJob = (Job, oneshot::Sender<Result<(), DispatchError>>);

/// Context that runs every job on one dedicated, named OS thread.
///
/// Jobs execute strictly one after another in submission order, including
/// their `.await` points. The thread exits once every clone of the context
/// has been dropped and the queue is drained.
#[derive(Clone)]
pub struct SerialContext {
    name: String,
    sender: mpsc::UnboundedSender<SerialJob>,
}

impl SerialContext {
    /// Start the context's thread.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ContextInit`] if the runtime or the thread cannot
    /// be created.
    pub fn spawn(name: impl Into<String>) -> BusResult<Self> {
        let name = name.into();
        let init_err = |source| BusError::ContextInit {
            context: name.clone(),
            source,
        };

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(init_err)?;
        let (sender, mut receiver) = mpsc::unbounded_channel::<SerialJob>();

        let thread_name = name.clone();
        std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                runtime.block_on(async move {
                    while let Some((job, done)) = receiver.recv().await {
                        let outcome = match AssertUnwindSafe(job).catch_unwind().await {
                            Ok(result) => result.map_err(DispatchError::Failed),
                            Err(panic) => Err(DispatchError::Panicked(panic_message(&*panic))),
                        };
                        // The submitter may have stopped waiting.
                        let _ = done.send(outcome);
                    }
                });
                trace!(context = %thread_name, "Serial context drained");
            })
            .map_err(init_err)?;

        debug!(context = %name, "Serial context started");
        Ok(Self { name, sender })
    }
}

impl fmt::Debug for SerialContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialContext")
            .field("name", &self.name)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl DispatchContext for SerialContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn submit(&self, job: Job) -> Result<Completion, DispatchError> {
        let (done, finished) = oneshot::channel();
        self.sender
            .send((job, done))
            .map_err(|_| DispatchError::Closed {
                context: self.name.clone(),
            })?;

        let context = self.name.clone();
        Ok(Box::pin(async move {
            finished
                .await
                .unwrap_or(Err(DispatchError::Closed { context }))
        }))
    }
}

/// Best-effort text of a panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_owned()
    }
}
