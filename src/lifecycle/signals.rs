//! Termination event sources.
//!
//! # Responsibilities
//! - Register OS signal handlers (SIGINT, SIGTERM, SIGHUP, SIGQUIT, SIGABRT, SIGSYS)
//! - Translate signals to graceful / force-quit events
//! - Offer an in-process trigger for embedding and tests
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - First signal requests graceful shutdown, every later one forces exit
//! - SIGKILL and SIGSTOP cannot be caught, and Tokio refuses SIGILL along
//!   with the other fault signals, so none of them are listed

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::mpsc;

/// A momentary request to end the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Begin the graceful shutdown sequence.
    Graceful,
    /// Abandon whatever is running and exit now.
    Force,
}

/// Anything that can deliver termination events to the coordinator.
pub trait TerminationSource: Send + 'static {
    /// Next event, or `None` once the source can never fire again.
    fn recv(&mut self) -> BoxFuture<'_, Option<Termination>>;
}

/// Termination driven by OS signals.
pub struct SignalSource {
    seen_signal: bool,
    #[cfg(unix)]
    signals: Vec<(&'static str, tokio::signal::unix::Signal)>,
    #[cfg(windows)]
    ctrl_c: tokio::signal::windows::CtrlC,
    #[cfg(windows)]
    ctrl_break: tokio::signal::windows::CtrlBreak,
}

impl SignalSource {
    /// Install the handlers. Must be called from within a Tokio runtime.
    #[cfg(unix)]
    pub fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let signals = vec![
            ("SIGINT", signal(SignalKind::interrupt())?),
            ("SIGTERM", signal(SignalKind::terminate())?),
            ("SIGHUP", signal(SignalKind::hangup())?),
            ("SIGQUIT", signal(SignalKind::quit())?),
            ("SIGABRT", signal(SignalKind::from_raw(libc::SIGABRT))?),
            ("SIGSYS", signal(SignalKind::from_raw(libc::SIGSYS))?),
        ];
        Ok(Self {
            seen_signal: false,
            signals,
        })
    }

    /// Install the handlers. Must be called from within a Tokio runtime.
    #[cfg(windows)]
    pub fn new() -> std::io::Result<Self> {
        use tokio::signal::windows::{ctrl_break, ctrl_c};

        Ok(Self {
            seen_signal: false,
            ctrl_c: ctrl_c()?,
            ctrl_break: ctrl_break()?,
        })
    }

    #[cfg(unix)]
    async fn next_signal(&mut self) -> &'static str {
        let pending = self.signals.iter_mut().map(|(name, signal)| {
            let name = *name;
            async move {
                signal.recv().await;
                name
            }
            .boxed()
        });
        let (name, _, _) = futures_util::future::select_all(pending).await;
        name
    }

    #[cfg(windows)]
    async fn next_signal(&mut self) -> &'static str {
        tokio::select! {
            _ = self.ctrl_c.recv() => "CTRL_C",
            _ = self.ctrl_break.recv() => "CTRL_BREAK",
        }
    }

    async fn next_event(&mut self) -> Option<Termination> {
        let name = self.next_signal().await;
        if self.seen_signal {
            tracing::warn!(signal = name, "Received another termination signal");
            Some(Termination::Force)
        } else {
            self.seen_signal = true;
            tracing::info!(signal = name, "Received termination signal");
            Some(Termination::Graceful)
        }
    }
}

impl TerminationSource for SignalSource {
    fn recv(&mut self) -> BoxFuture<'_, Option<Termination>> {
        self.next_event().boxed()
    }
}

/// Create an in-process trigger and the source it feeds.
pub fn channel() -> (TerminationHandle, ChannelSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TerminationHandle { tx }, ChannelSource { rx })
}

/// Sends termination events to a [`ChannelSource`].
#[derive(Debug, Clone)]
pub struct TerminationHandle {
    tx: mpsc::UnboundedSender<Termination>,
}

impl TerminationHandle {
    /// Request graceful shutdown.
    pub fn graceful(&self) {
        self.send(Termination::Graceful);
    }

    /// Request immediate exit.
    pub fn force(&self) {
        self.send(Termination::Force);
    }

    pub fn send(&self, event: Termination) {
        if self.tx.send(event).is_err() {
            tracing::debug!(?event, "Termination source already dropped");
        }
    }
}

/// Termination driven by a [`TerminationHandle`].
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Termination>,
}

impl TerminationSource for ChannelSource {
    fn recv(&mut self) -> BoxFuture<'_, Option<Termination>> {
        self.rx.recv().boxed()
    }
}
