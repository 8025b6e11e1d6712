//! Debounced cycle scheduling
//!
//! Every inbound message becomes a [`Trigger`]. A trigger cancels whatever
//! cycle is pending or running and schedules a fresh one, so a burst of
//! messages collapses into a single cycle that sees the latest message. Cycle
//! starts are at least `interval` apart, measured from scheduler construction
//! for the first one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// The message that started a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub author: String,
    pub content: String,
}

impl Trigger {
    pub fn new(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            content: content.into(),
        }
    }
}

/// Runs one response cycle; must return promptly once `cancel` fires
#[async_trait]
pub trait CycleHandler: Send + Sync + 'static {
    async fn run(&self, trigger: Trigger, cancel: CancellationToken);
}

struct ActiveCycle {
    id: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Slot {
    last_start: Instant,
    current: Option<ActiveCycle>,
    next_id: u64,
}

pub struct DebounceScheduler {
    handler: Arc<dyn CycleHandler>,
    interval: Duration,
    slot: Arc<Mutex<Slot>>,
}

impl DebounceScheduler {
    pub fn new(handler: Arc<dyn CycleHandler>, interval: Duration) -> Self {
        Self {
            handler,
            interval,
            slot: Arc::new(Mutex::new(Slot {
                last_start: Instant::now(),
                current: None,
                next_id: 0,
            })),
        }
    }

    /// Cancel the current cycle, if any, and schedule a new one for `trigger`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger(&self, trigger: Trigger) {
        let mut slot = self.slot.lock();

        let previous = slot.current.take().map(|active| {
            debug!("Cancelling cycle {} for newer message", active.id);
            active.cancel.cancel();
            active.handle
        });

        let id = slot.next_id;
        slot.next_id += 1;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(drive_cycle(
            self.handler.clone(),
            self.slot.clone(),
            self.interval,
            id,
            trigger,
            previous,
            cancel.clone(),
        ));

        slot.current = Some(ActiveCycle { id, cancel, handle });
    }

    /// True when no cycle is pending or running
    pub fn is_idle(&self) -> bool {
        self.slot.lock().current.is_none()
    }

    /// Cancel the current cycle and wait for it to wind down
    pub async fn shutdown(&self) {
        let active = self.slot.lock().current.take();
        if let Some(active) = active {
            active.cancel.cancel();
            if let Err(e) = active.handle.await {
                warn!("Cycle {} ended abnormally: {}", active.id, e);
            }
        }
    }
}

async fn drive_cycle(
    handler: Arc<dyn CycleHandler>,
    slot: Arc<Mutex<Slot>>,
    interval: Duration,
    id: u64,
    trigger: Trigger,
    previous: Option<JoinHandle<()>>,
    cancel: CancellationToken,
) {
    // Let the cancelled cycle finish an in-progress send first
    if let Some(previous) = previous {
        if let Err(e) = previous.await {
            warn!("Previous cycle ended abnormally: {}", e);
        }
    }

    let wait = interval.saturating_sub(slot.lock().last_start.elapsed());
    if !wait.is_zero() {
        trace!("Cycle {} waiting {:?} before starting", id, wait);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                trace!("Cycle {} cancelled before starting", id);
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }
    }

    {
        let mut slot = slot.lock();
        if cancel.is_cancelled() {
            return;
        }
        slot.last_start = Instant::now();
    }

    debug!("Starting cycle {} for message from {}", id, trigger.author);
    handler.run(trigger, cancel).await;

    let mut slot = slot.lock();
    if slot.current.as_ref().is_some_and(|active| active.id == id) {
        slot.current = None;
    }
}
