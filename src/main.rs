use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use idlewarden::{
    app::{App, Command},
    app_dirs::AppDirs,
    clock::{Clock, SystemClock},
    config::{ConfigStore, FileConfigStore, IdleSettings},
    logging,
    runtime::{CrosstermEventSource, FixedTicker, HostEventSource, Runner, Ticker},
    session::{MemorySessionStore, SessionStore},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};

const TICK_RATE_MS: u64 = 250;

/// idle-session watchdog: warns after a quiet spell, signs out after a longer one
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal session console guarded by an idle watchdog. After the warning delay without input a countdown appears; if nobody answers before it runs out, the session is signed out."
)]
pub struct Cli {
    /// seconds of inactivity before the warning appears
    #[clap(short = 'w', long)]
    warning_secs: Option<u64>,

    /// seconds of inactivity before the session is signed out
    #[clap(short = 'o', long)]
    logout_secs: Option<u64>,

    /// run without idle tracking
    #[clap(long)]
    disabled: bool,

    /// operator name shown in the session console
    #[clap(short = 'u', long)]
    operator: Option<String>,

    /// config file to read (and write with --save-config)
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// persist the effective idle settings before starting
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    /// Layer command-line overrides on top of stored settings
    fn to_settings(&self, stored: IdleSettings) -> IdleSettings {
        IdleSettings {
            warning_delay: self
                .warning_secs
                .map(Duration::from_secs)
                .unwrap_or(stored.warning_delay),
            logout_delay: self
                .logout_secs
                .map(Duration::from_secs)
                .unwrap_or(stored.logout_delay),
            enabled: stored.enabled && !self.disabled,
        }
    }

    fn operator(&self) -> String {
        self.operator
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "operator".to_string())
    }

    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(path) = AppDirs::log_path() {
        // Logging is best effort; the console works without it
        let _ = logging::init_file_logging(&path);
    }

    let store = cli.config_store();
    let settings = cli.to_settings(store.load());
    if let Err(err) = settings.validate() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::ValueValidation, err.to_string()).exit();
    }
    if cli.save_config {
        store.save(&settings)?;
        tracing::info!(path = %store.path().display(), "saved idle settings");
    }

    let mut app = App::new(
        cli.operator(),
        settings,
        SystemClock::new(),
        MemorySessionStore::new(),
    )?;

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B, C, S, E, T>(
    terminal: &mut Terminal<B>,
    app: &mut App<C, S>,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>>
where
    B: Backend,
    C: Clock,
    S: SessionStore,
    E: HostEventSource,
    T: Ticker,
{
    loop {
        let view = app.view();
        terminal.draw(|f| f.render_widget(&view, f.area()))?;

        let event = runner.step(app.due_in());
        if app.handle(event) == Command::Quit {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use idlewarden::{clock::ManualClock, runtime::HostEvent, runtime::TestEventSource};
    use ratatui::backend::TestBackend;
    use std::sync::mpsc;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["idlewarden"]);

        assert_eq!(cli.warning_secs, None);
        assert_eq!(cli.logout_secs, None);
        assert!(!cli.disabled);
        assert!(!cli.save_config);
        assert_eq!(cli.to_settings(IdleSettings::default()), IdleSettings::default());
    }

    #[test]
    fn test_cli_overrides_stored_settings() {
        let cli = Cli::parse_from(["idlewarden", "-w", "30", "--logout-secs", "45"]);
        let settings = cli.to_settings(IdleSettings::default());

        assert_eq!(settings.warning_delay, Duration::from_secs(30));
        assert_eq!(settings.logout_delay, Duration::from_secs(45));
        assert!(settings.enabled);
    }

    #[test]
    fn test_cli_disabled_flag_wins() {
        let cli = Cli::parse_from(["idlewarden", "--disabled"]);
        assert!(!cli.to_settings(IdleSettings::default()).enabled);

        let cli = Cli::parse_from(["idlewarden"]);
        assert!(!cli.to_settings(IdleSettings::default().disabled()).enabled);
    }

    #[test]
    fn test_cli_operator_flag() {
        let cli = Cli::parse_from(["idlewarden", "-u", "dana"]);
        assert_eq!(cli.operator(), "dana");
    }

    #[test]
    fn test_cli_config_path() {
        let cli = Cli::parse_from(["idlewarden", "--config", "/tmp/idle.json"]);
        assert_eq!(
            cli.config_store().path(),
            std::path::Path::new("/tmp/idle.json")
        );
    }

    #[test]
    fn test_start_tui_quits_on_q() {
        let (tx, rx) = mpsc::channel();
        tx.send(HostEvent::Key(KeyEvent::new(
            KeyCode::Char('q'),
            KeyModifiers::NONE,
        )))
        .unwrap();
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(5)),
        );
        let mut app = App::new(
            "dana",
            IdleSettings::default(),
            ManualClock::new(),
            MemorySessionStore::new(),
        )
        .unwrap();
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();

        start_tui(&mut terminal, &mut app, &runner).unwrap();

        let rendered = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>();
        assert!(rendered.contains("dana"));
    }
}
