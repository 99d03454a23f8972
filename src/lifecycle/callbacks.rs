//! Cleanup callbacks run during shutdown.
//!
//! # Responsibilities
//! - Hold caller-supplied cleanup work as opaque async functions
//! - Give each callback its own deadline-bound, cancellable context
//! - Run all callbacks concurrently and wait for each one until it returns or
//!   its deadline passes
//!
//! # Design Decisions
//! - A callback past its deadline is abandoned, never awaited further; its
//!   context is cancelled so a cooperative callback can return promptly
//! - Callback tasks are detached rather than aborted, there is no preemption
//! - A panicking callback is logged and counted, it never aborts the phase

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;

/// Deadline-bound cancellation context handed to a callback.
#[derive(Debug, Clone)]
pub struct CallbackContext {
    token: CancellationToken,
    deadline: Instant,
}

impl CallbackContext {
    /// Context that expires `timeout` from now, or earlier if `parent` is cancelled.
    pub fn new(parent: &CancellationToken, timeout: Duration) -> Self {
        Self {
            token: parent.child_token(),
            deadline: Instant::now() + timeout,
        }
    }

    /// Instant at which the callback is abandoned.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// True once the deadline passed or the context was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.deadline
    }

    /// Resolves when the deadline passes or the context is cancelled.
    pub async fn cancelled(&self) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = sleep_until(self.deadline) => {}
        }
    }

    /// Underlying token, for handing to libraries that take one.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }
}

type CallbackFn = dyn Fn(CallbackContext) -> BoxFuture<'static, ()> + Send + Sync;

/// A named cleanup function run once during shutdown.
#[derive(Clone)]
pub struct ShutdownCallback {
    name: Arc<str>,
    func: Arc<CallbackFn>,
}

impl ShutdownCallback {
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(CallbackContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            func: Arc::new(move |ctx| func(ctx).boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, ctx: CallbackContext) -> BoxFuture<'static, ()> {
        (self.func)(ctx)
    }
}

impl std::fmt::Debug for ShutdownCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCallback")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// How a single callback ended, from the coordinator's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Returned before its deadline.
    Completed,
    /// Still running at its deadline; abandoned.
    DeadlineExceeded,
    /// Panicked.
    Panicked,
}

impl CallbackOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            CallbackOutcome::Completed => "completed",
            CallbackOutcome::DeadlineExceeded => "deadline_exceeded",
            CallbackOutcome::Panicked => "panicked",
        }
    }
}

/// Tally of one callback phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallbackSummary {
    pub completed: usize,
    pub deadline_exceeded: usize,
    pub panicked: usize,
}

impl CallbackSummary {
    fn record(&mut self, outcome: CallbackOutcome) {
        match outcome {
            CallbackOutcome::Completed => self.completed += 1,
            CallbackOutcome::DeadlineExceeded => self.deadline_exceeded += 1,
            CallbackOutcome::Panicked => self.panicked += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.completed + self.deadline_exceeded + self.panicked
    }
}

/// Run every callback concurrently, each bounded by its own `timeout`.
pub async fn run_callbacks(
    callbacks: &[ShutdownCallback],
    timeout: Duration,
    parent: &CancellationToken,
) -> CallbackSummary {
    let mut set = JoinSet::new();
    for callback in callbacks {
        let callback = callback.clone();
        let parent = parent.clone();
        set.spawn(async move {
            let outcome = run_one(&callback, timeout, &parent).await;
            (callback, outcome)
        });
    }

    let mut summary = CallbackSummary::default();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((callback, outcome)) => {
                match outcome {
                    CallbackOutcome::Completed => {
                        tracing::debug!(callback = %callback.name(), "Shutdown callback completed")
                    }
                    CallbackOutcome::DeadlineExceeded => tracing::warn!(
                        callback = %callback.name(),
                        timeout_ms = timeout.as_millis() as u64,
                        "Shutdown callback exceeded its deadline, abandoning it"
                    ),
                    CallbackOutcome::Panicked => {
                        tracing::error!(callback = %callback.name(), "Shutdown callback panicked")
                    }
                }
                metrics::record_callback(outcome.as_str());
                summary.record(outcome);
            }
            Err(e) => {
                tracing::error!(error = %e, "Shutdown callback supervisor failed");
                summary.record(CallbackOutcome::Panicked);
            }
        }
    }
    summary
}

async fn run_one(
    callback: &ShutdownCallback,
    timeout: Duration,
    parent: &CancellationToken,
) -> CallbackOutcome {
    let ctx = CallbackContext::new(parent, timeout);
    let deadline = ctx.deadline();
    let mut task = tokio::spawn(callback.invoke(ctx.clone()));

    tokio::select! {
        joined = &mut task => match joined {
            Ok(()) => CallbackOutcome::Completed,
            Err(_) => CallbackOutcome::Panicked,
        },
        _ = sleep_until(deadline) => {
            ctx.cancel();
            CallbackOutcome::DeadlineExceeded
        }
    }
}
