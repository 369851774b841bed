//! Activity signals and the feed monitors listen on.
//!
//! The feed stands in for the host's global input stream: the host emits one
//! signal per pointer, key, scroll or touch event (or a synthetic "still here"),
//! and every attached listener receives it stamped with the feed's clock.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum ActivityKind {
    PointerMove,
    PointerDown,
    KeyDown,
    Scroll,
    /// Touch input from embedding hosts; the terminal console never produces it
    TouchStart,
    Click,
    /// Explicit "still here" notification with no input event behind it
    Programmatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivitySignal {
    pub kind: ActivityKind,
    pub at: Duration,
}

type Registry = Mutex<Vec<(u64, Sender<ActivitySignal>)>>;

#[derive(Debug)]
struct FeedInner {
    listeners: Registry,
    next_id: Mutex<u64>,
}

/// Broadcasts activity signals to every attached listener
#[derive(Clone, Debug)]
pub struct ActivityFeed<C: Clock> {
    clock: C,
    inner: Arc<FeedInner>,
}

impl<C: Clock> ActivityFeed<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            inner: Arc::new(FeedInner {
                listeners: Mutex::new(Vec::new()),
                next_id: Mutex::new(0),
            }),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Attach a new listener. It stays registered until detached or dropped.
    pub fn listen(&self) -> ActivityListener {
        let (tx, rx) = mpsc::channel();
        let id = {
            let mut next = self.inner.next_id.lock().unwrap_or_else(|e| e.into_inner());
            *next += 1;
            *next
        };
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, tx));
        tracing::trace!(listener = id, "activity listener attached");

        ActivityListener {
            id,
            rx,
            feed: Arc::downgrade(&self.inner),
        }
    }

    /// Stamp `kind` with the current time and deliver it to all listeners
    pub fn emit(&self, kind: ActivityKind) {
        let signal = ActivitySignal {
            kind,
            at: self.clock.now(),
        };
        let mut listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        listeners.retain(|(_, tx)| tx.send(signal).is_ok());
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

/// One registration on an [`ActivityFeed`]
#[derive(Debug)]
pub struct ActivityListener {
    id: u64,
    rx: Receiver<ActivitySignal>,
    feed: Weak<FeedInner>,
}

impl ActivityListener {
    /// Signals delivered since the last drain, oldest first
    pub fn drain(&self) -> Vec<ActivitySignal> {
        self.rx.try_iter().collect()
    }

    /// Remove this listener from its feed. Safe to call more than once.
    pub fn detach(&mut self) {
        if let Some(feed) = self.feed.upgrade() {
            feed.listeners
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .retain(|(id, _)| *id != self.id);
            tracing::trace!(listener = self.id, "activity listener detached");
        }
        self.feed = Weak::new();
    }
}

impl Drop for ActivityListener {
    fn drop(&mut self) {
        self.detach();
    }
}
