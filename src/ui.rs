use std::time::Duration;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Clear, Gauge, Paragraph, Widget, Wrap},
};

use crate::app::{Screen, SessionView};
use crate::monitor::LogoutReason;

const POPUP_WIDTH: u16 = 48;
const POPUP_HEIGHT: u16 = 8;

/// "2m 05s" / "45s"
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// Whole seconds left on the countdown, rounded up so "0s" only shows at zero
pub fn countdown_secs(remaining_ms: u64) -> u64 {
    remaining_ms.div_ceil(1000)
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

impl Widget for &SessionView {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.screen {
            Screen::Session => render_session(self, area, buf),
            Screen::Warning => {
                render_session(self, area, buf);
                render_warning(self, centered(area, POPUP_WIDTH, POPUP_HEIGHT), buf);
            }
            Screen::SignedOut => render_signed_out(self, area, buf),
        }
    }
}

fn render_session(view: &SessionView, area: Rect, buf: &mut Buffer) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);

    let block = Block::bordered().title(" idlewarden ");
    let inner = block.inner(area);
    block.render(area, buf);

    let [body, footer] = Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(inner);

    let mut lines = Vec::new();
    match &view.session {
        Some(session) => lines.push(Line::from(vec![
            Span::raw("Signed in as "),
            Span::styled(session.operator.clone(), bold.fg(Color::Cyan)),
            Span::styled(
                format!(" since {}", session.signed_in_at.format("%H:%M:%S")),
                dim,
            ),
        ])),
        None => lines.push(Line::styled("No open session", dim)),
    }
    lines.push(Line::default());

    if view.tracking {
        lines.push(Line::from(vec![
            Span::raw("Idle for "),
            Span::styled(format_duration(view.idle_for), bold),
        ]));
        lines.push(Line::styled(
            format!(
                "Warning after {} / sign-out after {}",
                format_duration(view.settings.warning_delay),
                format_duration(view.settings.logout_delay)
            ),
            dim,
        ));
    } else {
        lines.push(Line::styled(
            "Idle tracking disabled",
            Style::default().fg(Color::Yellow),
        ));
    }

    lines.push(Line::raw(match view.last_activity {
        Some(kind) => format!("Last activity: {}", kind),
        None => "Last activity: none yet".to_string(),
    }));
    lines.push(Line::raw(format!("Warnings this shift: {}", view.warnings_shown)));

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(body, buf);

    Paragraph::new(Line::styled("[l] sign out   [q] quit", dim))
        .alignment(Alignment::Center)
        .render(footer, buf);
}

fn render_warning(view: &SessionView, area: Rect, buf: &mut Buffer) {
    Clear.render(area, buf);

    let block = Block::bordered()
        .title(" Still there? ")
        .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(area);
    block.render(area, buf);

    let [message, gauge, footer] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(1),
        Constraint::Min(1),
    ])
    .areas(inner);

    let secs = countdown_secs(view.remaining_ms);
    Paragraph::new(format!("You will be signed out in {}s", secs))
        .alignment(Alignment::Center)
        .style(Style::default().add_modifier(Modifier::BOLD))
        .render(message, buf);

    let grace = view.settings.grace_period().as_millis() as f64;
    let ratio = if grace > 0.0 {
        (view.remaining_ms as f64 / grace).clamp(0.0, 1.0)
    } else {
        0.0
    };
    Gauge::default()
        .gauge_style(Style::default().fg(Color::Yellow))
        .ratio(ratio)
        .label(format_duration(Duration::from_secs(secs)))
        .render(gauge, buf);

    Paragraph::new("[s] stay signed in   [l] sign out")
        .alignment(Alignment::Center)
        .render(footer, buf);
}

fn render_signed_out(view: &SessionView, area: Rect, buf: &mut Buffer) {
    let block = Block::bordered().title(" idlewarden ");
    let inner = block.inner(area);
    block.render(area, buf);

    let mut lines = vec![Line::styled(
        "Signed out",
        Style::default()
            .fg(Color::Red)
            .add_modifier(Modifier::BOLD),
    )];
    if let Some(out) = &view.signed_out {
        let why = match out.reason {
            LogoutReason::Timeout => "after inactivity",
            LogoutReason::Manual => "on request",
        };
        lines.push(Line::raw(format!(
            "{} was signed out {} at {}",
            out.operator,
            why,
            out.at.format("%H:%M:%S")
        )));
    }
    lines.push(Line::default());
    lines.push(Line::styled(
        "[Enter] sign in again   [q] quit",
        Style::default().add_modifier(Modifier::DIM),
    ));

    let [_, middle, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(lines.len() as u16),
        Constraint::Fill(1),
    ])
    .areas(inner);

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(middle, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::SignOut;
    use crate::config::IdleSettings;
    use crate::session::Session;
    use chrono::Local;

    fn view(screen: Screen) -> SessionView {
        SessionView {
            screen,
            tracking: true,
            session: Some(Session {
                operator: "dana".to_string(),
                signed_in_at: Local::now(),
            }),
            settings: IdleSettings::default(),
            idle_for: Duration::from_secs(75),
            remaining_ms: 42_000,
            last_activity: None,
            warnings_shown: 2,
            signed_out: None,
        }
    }

    fn rendered(view: &SessionView) -> String {
        let area = Rect::new(0, 0, 80, 24);
        let mut buffer = Buffer::empty(area);
        view.render(area, &mut buffer);
        buffer
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>()
    }

    #[test]
    fn session_screen_shows_operator_and_idle_time() {
        let out = rendered(&view(Screen::Session));
        assert!(out.contains("dana"));
        assert!(out.contains("Idle for 1m 15s"));
        assert!(out.contains("Warnings this shift: 2"));
    }

    #[test]
    fn disabled_tracking_is_called_out() {
        let mut v = view(Screen::Session);
        v.tracking = false;
        assert!(rendered(&v).contains("Idle tracking disabled"));
    }

    #[test]
    fn warning_popup_shows_countdown() {
        let out = rendered(&view(Screen::Warning));
        assert!(out.contains("Still there?"));
        assert!(out.contains("You will be signed out in 42s"));
        assert!(out.contains("stay signed in"));
    }

    #[test]
    fn signed_out_screen_shows_reason() {
        let mut v = view(Screen::SignedOut);
        v.session = None;
        v.signed_out = Some(SignOut {
            operator: "dana".to_string(),
            at: Local::now(),
            reason: LogoutReason::Timeout,
        });
        let out = rendered(&v);
        assert!(out.contains("dana was signed out after inactivity"));
        assert!(out.contains("sign in again"));
    }

    #[test]
    fn formatting_helpers() {
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 05s");
        assert_eq!(countdown_secs(0), 0);
        assert_eq!(countdown_secs(1), 1);
        assert_eq!(countdown_secs(1000), 1);
        assert_eq!(countdown_secs(1001), 2);
    }

    #[test]
    fn tiny_area_does_not_panic() {
        let area = Rect::new(0, 0, 10, 3);
        let mut buffer = Buffer::empty(area);
        (&view(Screen::Warning)).render(area, &mut buffer);
    }
}
