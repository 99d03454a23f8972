//! Shutdown coordination for the process.
//!
//! # Phases
//! ```text
//! Reject    → every listener refuses new requests
//! Drain     → wait for in-flight requests, at most `wait_time`
//! Stop      → stop every listener concurrently, wait for all
//! Callbacks → run cleanup callbacks concurrently, each with its own deadline
//! Release   → run the release hook once
//! ```
//!
//! The phases run on their own task while the coordinator races three
//! outcomes: the sequence completing, `shutdown_timeout` elapsing, and a
//! force-quit event. The first one decides the [`ExitStatus`].
//!
//! Losing the race does not wait for anything. The shared cancellation token
//! is cancelled (the drain loop and every callback context observe it) and the
//! sequence task is aborted; callbacks that ignore their context keep running
//! until the process exits.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::loader::ConfigError;
use crate::config::schema::ShutdownConfig;
use crate::config::validation::validate_options;
use crate::lifecycle::callbacks::{run_callbacks, ShutdownCallback};
use crate::lifecycle::signals::{Termination, TerminationSource};
use crate::lifecycle::startup::spawn_listeners;
use crate::net::listener::Listener;
use crate::observability::metrics;

/// Timing of the shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownOptions {
    /// Budget for the whole sequence. Default 30s.
    pub shutdown_timeout: Duration,
    /// Grace period for in-flight requests. Default 10s.
    pub wait_time: Duration,
    /// Deadline applied to each callback individually. Default 3s.
    pub callback_timeout: Duration,
    /// How often the drain phase checks in-flight counts. Default 50ms.
    pub drain_poll_interval: Duration,
}

impl Default for ShutdownOptions {
    fn default() -> Self {
        Self::from(&ShutdownConfig::default())
    }
}

impl From<&ShutdownConfig> for ShutdownOptions {
    fn from(config: &ShutdownConfig) -> Self {
        Self {
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
            wait_time: Duration::from_millis(config.wait_time_ms),
            callback_timeout: Duration::from_millis(config.callback_timeout_ms),
            drain_poll_interval: Duration::from_millis(config.drain_poll_interval_ms),
        }
    }
}

/// How the process should exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Sequence completed within `shutdown_timeout`.
    Clean,
    /// `shutdown_timeout` elapsed first.
    TimedOut,
    /// A force-quit event arrived first.
    Forced,
    /// The sequence task itself panicked.
    Aborted,
}

impl ExitStatus {
    /// Process exit code.
    pub const fn code(self) -> i32 {
        match self {
            ExitStatus::Clean => 0,
            ExitStatus::TimedOut => 1,
            ExitStatus::Forced => 2,
            ExitStatus::Aborted => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExitStatus::Clean => "clean",
            ExitStatus::TimedOut => "timed_out",
            ExitStatus::Forced => "forced",
            ExitStatus::Aborted => "aborted",
        }
    }
}

/// Outcome of the drain phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Drained,
    TimedOut { pending: u64 },
}

type ReleaseFn = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Owns the listeners and cleanup work of a process and shuts them down in order.
pub struct Coordinator {
    listeners: Vec<Arc<dyn Listener>>,
    callbacks: Vec<ShutdownCallback>,
    options: ShutdownOptions,
    release: Option<ReleaseFn>,
}

impl Coordinator {
    /// Build a coordinator. Fails if any duration in `options` is zero.
    pub fn new(
        listeners: Vec<Arc<dyn Listener>>,
        options: ShutdownOptions,
    ) -> Result<Self, ConfigError> {
        validate_options(&options).map_err(ConfigError::Validation)?;
        Ok(Self {
            listeners,
            callbacks: Vec::new(),
            options,
            release: None,
        })
    }

    /// Append a cleanup callback.
    pub fn with_callback(mut self, callback: ShutdownCallback) -> Self {
        self.callbacks.push(callback);
        self
    }

    /// Append several cleanup callbacks, keeping their order.
    pub fn with_callbacks(mut self, callbacks: impl IntoIterator<Item = ShutdownCallback>) -> Self {
        self.callbacks.extend(callbacks);
        self
    }

    /// Work run once after every callback, as the last phase.
    pub fn on_release<F, Fut>(mut self, release: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.release = Some(Box::new(move || release().boxed()));
        self
    }

    pub fn options(&self) -> &ShutdownOptions {
        &self.options
    }

    pub fn listeners(&self) -> &[Arc<dyn Listener>] {
        &self.listeners
    }

    /// Start every listener, block until termination is requested, then shut down.
    pub async fn run<S: TerminationSource>(self, mut source: S) -> ExitStatus {
        tracing::info!(
            listeners = self.listeners.len(),
            callbacks = self.callbacks.len(),
            "Starting listeners"
        );
        let _serving = spawn_listeners(&self.listeners);

        match source.recv().await {
            Some(Termination::Graceful) => {
                tracing::info!("Termination requested, starting graceful shutdown")
            }
            Some(Termination::Force) => {
                tracing::warn!("Force quit received before shutdown started, exiting immediately");
                metrics::record_outcome(ExitStatus::Forced.as_str());
                return ExitStatus::Forced;
            }
            None => tracing::warn!("Termination source closed, starting graceful shutdown"),
        }

        self.shutdown(source).await
    }

    /// Run the shutdown sequence now, racing it against the total timeout and
    /// force-quit events from `source`.
    pub async fn shutdown<S: TerminationSource>(self, mut source: S) -> ExitStatus {
        let shutdown_timeout = self.options.shutdown_timeout;
        let token = CancellationToken::new();
        let sequence = Sequence {
            listeners: self.listeners,
            callbacks: self.callbacks,
            options: self.options,
            token: token.clone(),
        };

        let mut task = tokio::spawn(sequence.run(self.release));
        let status = tokio::select! {
            biased;
            _ = wait_for_force(&mut source) => {
                tracing::warn!("Force quit received, exiting immediately");
                ExitStatus::Forced
            }
            joined = &mut task => match joined {
                Ok(()) => {
                    tracing::info!("Graceful shutdown completed");
                    ExitStatus::Clean
                }
                Err(e) => {
                    tracing::error!(error = %e, "Shutdown sequence panicked");
                    ExitStatus::Aborted
                }
            },
            _ = sleep(shutdown_timeout) => {
                tracing::error!(
                    timeout_ms = shutdown_timeout.as_millis() as u64,
                    "Graceful shutdown timed out, exiting immediately"
                );
                ExitStatus::TimedOut
            }
        };

        if status != ExitStatus::Clean {
            token.cancel();
            task.abort();
        }
        metrics::record_outcome(status.as_str());
        status
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.listeners.iter().map(|l| l.name()).collect();
        f.debug_struct("Coordinator")
            .field("listeners", &names)
            .field("callbacks", &self.callbacks)
            .field("options", &self.options)
            .field("release", &self.release.is_some())
            .finish()
    }
}

/// Resolves on the first force-quit event. Repeated graceful requests are ignored.
async fn wait_for_force<S: TerminationSource>(source: &mut S) {
    loop {
        match source.recv().await {
            Some(Termination::Force) => return,
            Some(Termination::Graceful) => {
                tracing::debug!("Shutdown already in progress, ignoring graceful request")
            }
            None => std::future::pending::<()>().await,
        }
    }
}

/// The phases, moved onto their own task.
struct Sequence {
    listeners: Vec<Arc<dyn Listener>>,
    callbacks: Vec<ShutdownCallback>,
    options: ShutdownOptions,
    token: CancellationToken,
}

impl Sequence {
    async fn run(self, release: Option<ReleaseFn>) {
        let started = Instant::now();
        tracing::info!("Shutting down, rejecting new requests");
        self.reject();
        metrics::record_phase("reject", started.elapsed());

        let started = Instant::now();
        tracing::info!(
            wait_ms = self.options.wait_time.as_millis() as u64,
            "Waiting for in-flight requests"
        );
        self.drain().await;
        metrics::record_phase("drain", started.elapsed());

        let started = Instant::now();
        tracing::info!("Stopping listeners");
        self.stop_listeners().await;
        metrics::record_phase("stop", started.elapsed());

        let started = Instant::now();
        tracing::info!(callbacks = self.callbacks.len(), "Running shutdown callbacks");
        let summary = run_callbacks(
            &self.callbacks,
            self.options.callback_timeout,
            &self.token,
        )
        .await;
        tracing::info!(
            completed = summary.completed,
            deadline_exceeded = summary.deadline_exceeded,
            panicked = summary.panicked,
            "Shutdown callbacks finished"
        );
        metrics::record_phase("callbacks", started.elapsed());

        let started = Instant::now();
        tracing::info!("Releasing resources");
        if let Some(release) = release {
            release().await;
        }
        metrics::record_phase("release", started.elapsed());

        tracing::info!("Application closed");
    }

    fn reject(&self) {
        for listener in &self.listeners {
            listener.reject_requests();
        }
    }

    async fn drain(&self) -> DrainOutcome {
        let listeners = self.listeners.clone();
        let poll = self.options.drain_poll_interval;
        let token = self.token.clone();
        let mut worker = tokio::spawn(async move {
            while pending(&listeners) > 0 {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = sleep(poll) => {}
                }
            }
        });

        match timeout(self.options.wait_time, &mut worker).await {
            Ok(_) => {
                tracing::info!("In-flight requests finished");
                DrainOutcome::Drained
            }
            Err(_) => {
                worker.abort();
                let pending = pending(&self.listeners);
                tracing::warn!(
                    pending,
                    wait_ms = self.options.wait_time.as_millis() as u64,
                    "Timed out waiting for in-flight requests"
                );
                DrainOutcome::TimedOut { pending }
            }
        }
    }

    async fn stop_listeners(&self) {
        let mut set = JoinSet::new();
        for listener in &self.listeners {
            let listener = Arc::clone(listener);
            set.spawn(async move {
                let result = listener.stop().await;
                (listener, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((listener, Ok(()))) => {
                    tracing::info!(listener = %listener.name(), "Listener stopped")
                }
                Ok((listener, Err(e))) => tracing::error!(
                    listener = %listener.name(),
                    address = %listener.address(),
                    error = %e,
                    "Failed to stop listener, check its address"
                ),
                Err(e) => tracing::error!(error = %e, "Listener stop task panicked"),
            }
        }
    }
}

fn pending(listeners: &[Arc<dyn Listener>]) -> u64 {
    listeners.iter().map(|l| l.in_flight()).sum()
}
