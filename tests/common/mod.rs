//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use graceful_shutdown::{Listener, ServerError};
use tokio::sync::watch;
use tokio::time::Instant;

/// Timestamped record of what happened during a test run.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<(String, Instant)>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push((event.into(), Instant::now()));
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.position(event).is_some()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    /// Indexes of every event starting with `prefix`.
    pub fn positions(&self, prefix: &str) -> Vec<usize> {
        self.events()
            .iter()
            .enumerate()
            .filter(|(_, e)| e.starts_with(prefix))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn time_of(&self, event: &str) -> Instant {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|(e, _)| e == event)
            .map(|(_, t)| *t)
            .unwrap_or_else(|| panic!("event {event:?} was never recorded"))
    }

    /// Time between two recorded events.
    pub fn between(&self, from: &str, to: &str) -> Duration {
        self.time_of(to) - self.time_of(from)
    }
}

/// A listener whose behaviour is scripted by the test.
pub struct MockListener {
    name: String,
    log: EventLog,
    stop_delay: Duration,
    hang_on_stop: bool,
    fail_stop: bool,
    in_flight: AtomicU64,
    starts: AtomicUsize,
    stop_tx: watch::Sender<bool>,
}

impl MockListener {
    pub fn new(name: &str, log: &EventLog) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            name: name.to_string(),
            log: log.clone(),
            stop_delay: Duration::ZERO,
            hang_on_stop: false,
            fail_stop: false,
            in_flight: AtomicU64::new(0),
            starts: AtomicUsize::new(0),
            stop_tx,
        }
    }

    pub fn stop_delay(mut self, delay: Duration) -> Self {
        self.stop_delay = delay;
        self
    }

    pub fn hang_on_stop(mut self) -> Self {
        self.hang_on_stop = true;
        self
    }

    pub fn fail_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn with_in_flight(self, count: u64) -> Self {
        self.set_in_flight(count);
        self
    }

    pub fn set_in_flight(&self, count: u64) {
        self.in_flight.store(count, Ordering::SeqCst);
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Listener for MockListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> &str {
        "mock:0"
    }

    fn start(&self) -> BoxFuture<'_, Result<(), ServerError>> {
        async move {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.log.record(format!("start:{}", self.name));
            let mut stop_rx = self.stop_tx.subscribe();
            let _ = stop_rx.wait_for(|stop| *stop).await;
            Ok(())
        }
        .boxed()
    }

    fn reject_requests(&self) {
        self.log.record(format!("reject:{}", self.name));
    }

    fn stop(&self) -> BoxFuture<'_, Result<(), ServerError>> {
        async move {
            self.log.record(format!("stop:begin:{}", self.name));
            if self.hang_on_stop {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(self.stop_delay).await;
            self.stop_tx.send_replace(true);
            self.log.record(format!("stop:end:{}", self.name));
            if self.fail_stop {
                Err(ServerError::NotRunning {
                    name: self.name.clone(),
                })
            } else {
                Ok(())
            }
        }
        .boxed()
    }

    fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Erase a list of mocks into the coordinator's listener type.
pub fn as_listeners(mocks: &[Arc<MockListener>]) -> Vec<Arc<dyn Listener>> {
    mocks
        .iter()
        .map(|mock| Arc::clone(mock) as Arc<dyn Listener>)
        .collect()
}

/// Poll `condition` until it holds or `limit` passes.
pub async fn wait_until<F>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Run `f` after `delay` on a separate task.
pub fn after<F, Fut>(delay: Duration, f: F)
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        f().await;
    });
}
