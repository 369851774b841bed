//! Idle session monitor: warn after a quiet spell, sign out after a longer one.
//!
//! The monitor owns a [`TimerQueue`] and a listener on an [`ActivityFeed`]. It
//! never spawns threads or sleeps; the host calls [`IdleSessionMonitor::poll`]
//! whenever it wakes (an input arrived or [`IdleSessionMonitor::next_deadline`]
//! passed) and every transition happens synchronously inside that call or
//! inside one of the public operations.
//!
//! Countdown ticks are aligned to the instant the warning fires: with a
//! 2000 ms warning delay and a 3000 ms logout delay the countdown reads 1000
//! from 2000 ms up to (but excluding) 3000 ms, reads 0 at 3000 ms, and the
//! session is signed out in that same step.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use crate::activity::{ActivityFeed, ActivityKind, ActivityListener};
use crate::clock::Clock;
use crate::config::IdleSettings;
use crate::error::MonitorError;
use crate::timer::{Timer, TimerKind, TimerQueue};

pub const TICK_INTERVAL: Duration = Duration::from_millis(1000);
const TICK_MS: u64 = 1000;

pub type Hook = Box<dyn FnMut() + Send>;

/// Settings plus the caller's side effects
pub struct SessionMonitorConfig {
    pub settings: IdleSettings,
    on_warning: Option<Hook>,
    on_logout: Option<Hook>,
}

impl SessionMonitorConfig {
    pub fn new(settings: IdleSettings) -> Self {
        Self {
            settings,
            on_warning: None,
            on_logout: None,
        }
    }

    /// Runs once per warning episode, when the warning becomes visible
    pub fn on_warning(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_warning = Some(Box::new(hook));
        self
    }

    /// Runs once per sign-out, automatic or manual
    pub fn on_logout(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_logout = Some(Box::new(hook));
        self
    }
}

impl std::fmt::Debug for SessionMonitorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMonitorConfig")
            .field("settings", &self.settings)
            .field("on_warning", &self.on_warning.is_some())
            .field("on_logout", &self.on_logout.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    /// No warning shown, waiting for the warning delay
    Active,
    /// Warning shown, countdown running
    Warned,
    /// Signed out; needs `restart` for a new episode
    LoggedOut,
    /// Permanently inert after `stop`
    Stopped,
    /// Started with tracking switched off
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorState {
    pub phase: Phase,
    pub warning_visible: bool,
    /// Milliseconds left before sign-out; 0 whenever the warning is hidden
    pub remaining_ms: u64,
    pub last_activity_at: Option<Duration>,
}

impl MonitorState {
    fn initial(phase: Phase) -> Self {
        Self {
            phase,
            warning_visible: false,
            remaining_ms: 0,
            last_activity_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCause {
    Activity(ActivityKind),
    Acknowledged,
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum LogoutReason {
    Timeout,
    Manual,
}

/// State transitions published to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEvent {
    WarningShown { remaining_ms: u64 },
    Countdown { remaining_ms: u64 },
    Reset { cause: ResetCause },
    LoggedOut { reason: LogoutReason },
    Stopped,
}

pub struct IdleSessionMonitor<C: Clock> {
    settings: IdleSettings,
    clock: C,
    listener: Option<ActivityListener>,
    timers: TimerQueue,
    state: MonitorState,
    window_started: Duration,
    on_warning: Option<Hook>,
    on_logout: Option<Hook>,
    subscribers: Vec<Sender<MonitorEvent>>,
}

impl<C: Clock> IdleSessionMonitor<C> {
    /// Validate `config` and begin tracking activity from `feed`.
    ///
    /// A disabled config yields a monitor that never attaches to the feed and
    /// never fires.
    pub fn start(config: SessionMonitorConfig, feed: &ActivityFeed<C>) -> Result<Self, MonitorError> {
        config.settings.validate()?;

        let SessionMonitorConfig {
            settings,
            on_warning,
            on_logout,
        } = config;
        let clock = feed.clock().clone();
        let now = clock.now();

        let mut monitor = Self {
            settings,
            clock,
            listener: None,
            timers: TimerQueue::new(),
            state: MonitorState::initial(Phase::Disabled),
            window_started: now,
            on_warning,
            on_logout,
            subscribers: Vec::new(),
        };

        if settings.enabled {
            monitor.listener = Some(feed.listen());
            monitor.arm(now);
            tracing::info!(
                warning_ms = settings.warning_delay.as_millis() as u64,
                logout_ms = settings.logout_delay.as_millis() as u64,
                "idle monitor started"
            );
        } else {
            tracing::info!("idle monitor started disabled");
        }

        Ok(monitor)
    }

    pub fn settings(&self) -> &IdleSettings {
        &self.settings
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn warning_visible(&self) -> bool {
        self.state.warning_visible
    }

    pub fn remaining_ms(&self) -> u64 {
        self.state.remaining_ms
    }

    /// Whether the monitor is still tracking a live episode
    pub fn is_active(&self) -> bool {
        matches!(self.state.phase, Phase::Active | Phase::Warned)
    }

    /// Time since the current idle window opened; zero when not tracking
    pub fn idle_for(&self) -> Duration {
        if self.is_active() {
            self.clock.now().saturating_sub(self.window_started)
        } else {
            Duration::ZERO
        }
    }

    /// Earliest pending timer, for hosts that sleep until something is due
    pub fn next_deadline(&mut self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Receive every transition from now on. Blocking `recv` is fine.
    pub fn subscribe(&mut self) -> Receiver<MonitorEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Process queued activity and every timer due by now
    pub fn poll(&mut self) -> Option<Duration> {
        let now = self.clock.now();
        self.catch_up(now, true);
        self.next_deadline()
    }

    pub fn notify_activity(&mut self) {
        self.reset_now(ResetCause::Activity(ActivityKind::Programmatic));
    }

    /// The user answered the warning. Valid with or without a raw input event.
    pub fn acknowledge_presence(&mut self) {
        self.reset_now(ResetCause::Acknowledged);
    }

    /// Sign out immediately. Returns `false` when there was no live episode to end.
    pub fn force_logout(&mut self) -> bool {
        let now = self.clock.now();
        self.catch_up(now, false);
        if !self.is_active() {
            return false;
        }
        self.logout(LogoutReason::Manual);
        true
    }

    /// Open a fresh episode after a sign-out, or reset a live one
    pub fn restart(&mut self) -> bool {
        match self.state.phase {
            Phase::Stopped | Phase::Disabled => false,
            Phase::Active | Phase::Warned => {
                self.acknowledge_presence();
                true
            }
            Phase::LoggedOut => {
                if let Some(listener) = &self.listener {
                    listener.drain();
                }
                let now = self.clock.now();
                self.state.last_activity_at = Some(now);
                self.arm(now);
                tracing::info!("idle monitor restarted");
                self.publish(MonitorEvent::Reset {
                    cause: ResetCause::Restart,
                });
                true
            }
        }
    }

    /// Cancel everything and detach from the feed for good
    pub fn stop(&mut self) {
        if self.state.phase == Phase::Stopped {
            return;
        }
        self.timers.cancel_all();
        if let Some(mut listener) = self.listener.take() {
            listener.detach();
        }
        self.state = MonitorState {
            last_activity_at: self.state.last_activity_at,
            ..MonitorState::initial(Phase::Stopped)
        };
        tracing::info!("idle monitor stopped");
        self.publish(MonitorEvent::Stopped);
    }

    fn reset_now(&mut self, cause: ResetCause) {
        let now = self.clock.now();
        self.catch_up(now, false);
        self.handle_reset(cause, now);
    }

    /// Replay queued signals and timers in time order up to `until`.
    ///
    /// A signal stamped `t` wins over a timer due exactly at `t`. With
    /// `inclusive` unset the same holds for whatever call is about to happen
    /// at `until`.
    fn catch_up(&mut self, until: Duration, inclusive: bool) {
        let signals = self
            .listener
            .as_ref()
            .map(|l| l.drain())
            .unwrap_or_default();

        for signal in signals {
            let at = signal.at.min(until);
            self.fire_timers(at, false);
            self.handle_reset(ResetCause::Activity(signal.kind), at);
        }
        self.fire_timers(until, inclusive);
    }

    fn fire_timers(&mut self, until: Duration, inclusive: bool) {
        loop {
            let timer = if inclusive {
                self.timers.pop_due(until)
            } else {
                self.timers.pop_before(until)
            };
            match timer {
                Some(timer) => self.fire(timer),
                None => break,
            }
        }
    }

    fn fire(&mut self, timer: Timer) {
        match (timer.kind, self.state.phase) {
            (TimerKind::Warning, Phase::Active) => {
                let grace = self.settings.grace_period().as_millis() as u64;
                self.state.phase = Phase::Warned;
                self.state.warning_visible = true;
                self.state.remaining_ms = grace;
                self.timers.arm(TimerKind::Tick, timer.deadline.saturating_add(TICK_INTERVAL));
                tracing::info!(remaining_ms = grace, "idle warning raised");
                if let Some(hook) = self.on_warning.as_mut() {
                    hook();
                }
                self.publish(MonitorEvent::WarningShown { remaining_ms: grace });
            }
            (TimerKind::Tick, Phase::Warned) => {
                self.state.remaining_ms = self.state.remaining_ms.saturating_sub(TICK_MS);
                self.publish(MonitorEvent::Countdown {
                    remaining_ms: self.state.remaining_ms,
                });
                if self.state.remaining_ms > 0 {
                    self.timers.arm(TimerKind::Tick, timer.deadline.saturating_add(TICK_INTERVAL));
                }
            }
            (TimerKind::Logout, Phase::Warned) => {
                if self.state.remaining_ms > 0 {
                    self.state.remaining_ms = 0;
                    self.publish(MonitorEvent::Countdown { remaining_ms: 0 });
                }
                self.logout(LogoutReason::Timeout);
            }
            (kind, phase) => {
                tracing::trace!(?kind, %phase, "ignoring timer outside its phase");
            }
        }
    }

    fn handle_reset(&mut self, cause: ResetCause, at: Duration) {
        if !self.is_active() {
            return;
        }
        let at = at.max(self.window_started);
        let was_warned = self.state.phase == Phase::Warned;
        self.state.last_activity_at = Some(at);
        self.arm(at);
        if was_warned {
            tracing::info!(?cause, "idle warning dismissed");
        } else {
            tracing::debug!(?cause, "idle window reset");
        }
        self.publish(MonitorEvent::Reset { cause });
    }

    fn arm(&mut self, at: Duration) {
        self.timers.cancel_all();
        self.timers
            .arm(TimerKind::Warning, at.saturating_add(self.settings.warning_delay));
        self.timers
            .arm(TimerKind::Logout, at.saturating_add(self.settings.logout_delay));
        self.window_started = at;
        self.state.phase = Phase::Active;
        self.state.warning_visible = false;
        self.state.remaining_ms = 0;
    }

    fn logout(&mut self, reason: LogoutReason) {
        self.timers.cancel_all();
        self.state.phase = Phase::LoggedOut;
        self.state.warning_visible = false;
        self.state.remaining_ms = 0;
        tracing::info!(%reason, "session signed out");
        if let Some(hook) = self.on_logout.as_mut() {
            hook();
        }
        self.publish(MonitorEvent::LoggedOut { reason });
    }

    fn publish(&mut self, event: MonitorEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}

impl<C: Clock> Drop for IdleSessionMonitor<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<C: Clock + std::fmt::Debug> std::fmt::Debug for IdleSessionMonitor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleSessionMonitor")
            .field("settings", &self.settings)
            .field("clock", &self.clock)
            .field("state", &self.state)
            .field("window_started", &self.window_started)
            .finish_non_exhaustive()
    }
}
