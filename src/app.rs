use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::activity::{ActivityFeed, ActivityKind};
use crate::clock::Clock;
use crate::config::IdleSettings;
use crate::error::MonitorError;
use crate::monitor::{
    IdleSessionMonitor, LogoutReason, MonitorEvent, Phase, SessionMonitorConfig,
};
use crate::runtime::HostEvent;
use crate::session::{Session, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Session,
    Warning,
    SignedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Continue,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignOut {
    pub operator: String,
    pub at: DateTime<Local>,
    pub reason: LogoutReason,
}

/// Everything the UI needs for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub screen: Screen,
    pub tracking: bool,
    pub session: Option<Session>,
    pub settings: IdleSettings,
    pub idle_for: Duration,
    pub remaining_ms: u64,
    pub last_activity: Option<ActivityKind>,
    pub warnings_shown: u32,
    pub signed_out: Option<SignOut>,
}

pub struct App<C: Clock, S: SessionStore> {
    operator: String,
    clock: C,
    feed: ActivityFeed<C>,
    monitor: IdleSessionMonitor<C>,
    events: Receiver<MonitorEvent>,
    store: S,
    screen: Screen,
    last_activity: Option<ActivityKind>,
    warnings_shown: Arc<AtomicU32>,
    signed_out: Option<SignOut>,
}

impl<C: Clock, S: SessionStore + Clone> App<C, S> {
    pub fn new(
        operator: impl Into<String>,
        settings: IdleSettings,
        clock: C,
        store: S,
    ) -> Result<Self, MonitorError> {
        let operator = operator.into();
        let feed = ActivityFeed::new(clock.clone());
        let warnings_shown = Arc::new(AtomicU32::new(0));

        let on_warning = {
            let warnings_shown = Arc::clone(&warnings_shown);
            move || {
                warnings_shown.fetch_add(1, Ordering::SeqCst);
            }
        };
        let on_logout = {
            let store = store.clone();
            move || {
                store.sign_out();
            }
        };
        let config = SessionMonitorConfig::new(settings)
            .on_warning(on_warning)
            .on_logout(on_logout);

        let mut monitor = IdleSessionMonitor::start(config, &feed)?;
        let events = monitor.subscribe();
        store.sign_in(&operator);

        Ok(Self {
            operator,
            clock,
            feed,
            monitor,
            events,
            store,
            screen: Screen::Session,
            last_activity: None,
            warnings_shown,
            signed_out: None,
        })
    }
}

impl<C: Clock, S: SessionStore> App<C, S> {
    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn monitor(&self) -> &IdleSessionMonitor<C> {
        &self.monitor
    }

    pub fn session(&self) -> Option<Session> {
        self.store.current()
    }

    /// Time until the monitor next needs a poll
    pub fn due_in(&mut self) -> Option<Duration> {
        let now = self.clock.now();
        self.monitor
            .next_deadline()
            .map(|deadline| deadline.saturating_sub(now))
    }

    pub fn handle(&mut self, event: HostEvent) -> Command {
        if let Some(kind) = event.activity() {
            self.last_activity = Some(kind);
            self.feed.emit(kind);
        }

        let command = match event {
            HostEvent::Key(key) => self.on_key(key),
            HostEvent::Activity(_) | HostEvent::Resize | HostEvent::Tick => Command::Continue,
        };

        self.monitor.poll();
        self.sync();
        command
    }

    fn on_key(&mut self, key: KeyEvent) -> Command {
        let ctrl_c =
            key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c');
        if ctrl_c || matches!(key.code, KeyCode::Esc | KeyCode::Char('q')) {
            return Command::Quit;
        }

        match (self.screen, key.code) {
            (Screen::Warning, KeyCode::Char('s') | KeyCode::Enter) => {
                self.monitor.acknowledge_presence();
            }
            (Screen::Warning | Screen::Session, KeyCode::Char('l')) => {
                self.monitor.force_logout();
            }
            (Screen::SignedOut, KeyCode::Enter) => {
                self.store.sign_in(&self.operator);
                self.signed_out = None;
                self.monitor.restart();
            }
            _ => {}
        }
        Command::Continue
    }

    /// Fold monitor transitions into the screen state
    fn sync(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                MonitorEvent::WarningShown { .. } => self.screen = Screen::Warning,
                MonitorEvent::Reset { .. } => self.screen = Screen::Session,
                MonitorEvent::Countdown { .. } | MonitorEvent::Stopped => {}
                MonitorEvent::LoggedOut { reason } => {
                    self.screen = Screen::SignedOut;
                    self.signed_out = Some(SignOut {
                        operator: self.operator.clone(),
                        at: Local::now(),
                        reason,
                    });
                }
            }
        }
    }

    pub fn view(&self) -> SessionView {
        let state = self.monitor.state();
        SessionView {
            screen: self.screen,
            tracking: state.phase != Phase::Disabled,
            session: self.store.current(),
            settings: *self.monitor.settings(),
            idle_for: self.monitor.idle_for(),
            remaining_ms: state.remaining_ms,
            last_activity: self.last_activity,
            warnings_shown: self.warnings_shown.load(Ordering::SeqCst),
            signed_out: self.signed_out.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::session::MemorySessionStore;

    fn key(c: char) -> HostEvent {
        HostEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
    }

    fn app() -> (ManualClock, App<ManualClock, MemorySessionStore>) {
        let clock = ManualClock::new();
        let app = App::new(
            "dana",
            IdleSettings::from_millis(2000, 3000),
            clock.clone(),
            MemorySessionStore::new(),
        )
        .unwrap();
        (clock, app)
    }

    #[test]
    fn warning_then_acknowledge() {
        let (clock, mut app) = app();
        clock.advance_ms(2000);
        app.handle(HostEvent::Tick);
        assert_eq!(app.screen(), Screen::Warning);
        assert_eq!(app.view().remaining_ms, 1000);
        assert_eq!(app.view().warnings_shown, 1);

        app.handle(key('s'));
        assert_eq!(app.screen(), Screen::Session);
        assert!(app.session().is_some());
    }

    #[test]
    fn timeout_signs_out_and_enter_signs_back_in() {
        let (clock, mut app) = app();
        clock.advance_ms(3000);
        app.handle(HostEvent::Tick);

        assert_eq!(app.screen(), Screen::SignedOut);
        assert!(app.session().is_none());
        let view = app.view();
        assert_eq!(view.signed_out.map(|s| s.reason), Some(LogoutReason::Timeout));

        // Ordinary keys do not revive a signed-out session
        app.handle(key('x'));
        assert_eq!(app.screen(), Screen::SignedOut);

        app.handle(HostEvent::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)));
        assert_eq!(app.screen(), Screen::Session);
        assert!(app.session().is_some());
        assert!(app.monitor().is_active());
    }

    #[test]
    fn manual_sign_out() {
        let (_clock, mut app) = app();
        assert_eq!(app.handle(key('l')), Command::Continue);
        assert_eq!(app.screen(), Screen::SignedOut);
        assert_eq!(
            app.view().signed_out.map(|s| s.reason),
            Some(LogoutReason::Manual)
        );
    }

    #[test]
    fn mouse_activity_keeps_session_alive() {
        let (clock, mut app) = app();
        for _ in 0..5 {
            clock.advance_ms(1500);
            app.handle(HostEvent::Activity(ActivityKind::PointerMove));
        }
        assert_eq!(app.screen(), Screen::Session);
        assert_eq!(app.view().last_activity, Some(ActivityKind::PointerMove));
        assert_eq!(app.due_in(), Some(Duration::from_millis(2000)));
    }

    #[test]
    fn quit_keys() {
        let (_clock, mut app) = app();
        assert_eq!(app.handle(key('q')), Command::Quit);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(app.handle(HostEvent::Key(ctrl_c)), Command::Quit);
    }
}
