use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent, MouseEvent, MouseEventKind};

use crate::activity::ActivityKind;

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum HostEvent {
    Key(KeyEvent),
    /// Non-key input that only counts as presence
    Activity(ActivityKind),
    Resize,
    Tick,
}

impl HostEvent {
    /// The activity this event stands for, if any
    pub fn activity(&self) -> Option<ActivityKind> {
        match self {
            HostEvent::Key(_) => Some(ActivityKind::KeyDown),
            HostEvent::Activity(kind) => Some(*kind),
            HostEvent::Resize | HostEvent::Tick => None,
        }
    }
}

pub fn mouse_activity(mouse: &MouseEvent) -> ActivityKind {
    match mouse.kind {
        MouseEventKind::Down(_) => ActivityKind::PointerDown,
        MouseEventKind::Up(_) => ActivityKind::Click,
        MouseEventKind::Moved | MouseEventKind::Drag(_) => ActivityKind::PointerMove,
        MouseEventKind::ScrollDown
        | MouseEventKind::ScrollUp
        | MouseEventKind::ScrollLeft
        | MouseEventKind::ScrollRight => ActivityKind::Scroll,
    }
}

/// Source of terminal events (keyboard, mouse, resize)
pub trait HostEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<HostEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<HostEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let evt = match event::read() {
                Ok(CtEvent::Key(key)) => HostEvent::Key(key),
                Ok(CtEvent::Mouse(mouse)) => HostEvent::Activity(mouse_activity(&mouse)),
                Ok(CtEvent::Paste(_)) => HostEvent::Activity(ActivityKind::KeyDown),
                Ok(CtEvent::Resize(_, _)) => HostEvent::Resize,
                Ok(_) => continue,
                Err(err) => {
                    tracing::warn!(%err, "terminal event reader stopped");
                    break;
                }
            };
            if tx.send(evt).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HostEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<HostEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<HostEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<HostEvent>) -> Self {
        Self { rx }
    }
}

impl HostEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<HostEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: HostEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: HostEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Wait time for the next step: the tick interval, shortened when
    /// something is due sooner
    pub fn wait_for(&self, due_in: Option<Duration>) -> Duration {
        match due_in {
            Some(due) => due.min(self.ticker.interval()),
            None => self.ticker.interval(),
        }
    }

    /// Blocks up to `wait_for(due_in)` and returns the next event, or Tick on timeout
    pub fn step(&self, due_in: Option<Duration>) -> HostEvent {
        match self.event_source.recv_timeout(self.wait_for(due_in)) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => HostEvent::Tick,
        }
    }
}
