//! About overlay: what the program does and its keys.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table},
    Frame,
};

const KEYS: [(&str, &str); 7] = [
    ("j/k, Up/Down", "Move"),
    ("g/G", "First / last row"),
    ("Enter", "Select channel / show program"),
    ("Tab", "Switch panel"),
    ("u", "Update now"),
    ("?", "Close this window"),
    ("q, Esc", "Quit"),
];

pub fn render(f: &mut Frame) {
    let overlay = centered_rect(60, 60, f.area());
    if overlay.width < 30 || overlay.height < 12 {
        return;
    }
    f.render_widget(Clear, overlay);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" About (? to close) ");
    let inner = block.inner(overlay);
    f.render_widget(block, overlay);

    let intro = Paragraph::new(vec![
        Line::from(Span::styled(
            concat!("radioinfo ", env!("CARGO_PKG_VERSION")),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from("Channel schedules from Sveriges Radio, refreshed every hour."),
        Line::from("Finished programs are dimmed; the last one to end is highlighted."),
    ]);
    let intro_height = 4;
    f.render_widget(
        intro,
        Rect {
            height: intro_height.min(inner.height),
            ..inner
        },
    );

    let rows: Vec<Row> = KEYS.iter().map(|(key, action)| Row::new(vec![*key, *action])).collect();
    let table = Table::new(rows, [Constraint::Length(14), Constraint::Min(10)]);
    f.render_widget(
        table,
        Rect {
            y: inner.y + intro_height.min(inner.height),
            height: inner.height.saturating_sub(intro_height),
            ..inner
        },
    );
}

/// `percent` of `extent`, computed wide so large terminals cannot overflow.
fn scale(extent: u16, percent: u16) -> u16 {
    let scaled = u32::from(extent) * u32::from(percent.min(100)) / 100;
    u16::try_from(scaled).unwrap_or(extent)
}

/// Create a centered rectangle with the given percentage of the parent area.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let width = scale(area.width, percent_x);
    let height = scale(area.height, percent_y);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
