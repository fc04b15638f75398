use crate::app::{App, Focus};
use crate::util::{strip_control_chars, truncate_to_width};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

/// Label of the row that clears the selection.
pub(super) const NO_CHANNEL: &str = "(none)";

/// Render the channel selector
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let is_focused = app.focus == Focus::Channels;
    let max_width = area.width.saturating_sub(4) as usize;

    let names = std::iter::once(None).chain(app.catalog.iter().map(Some));
    let items: Vec<ListItem> = names
        .enumerate()
        .map(|(row, channel)| {
            let label = match channel {
                Some(c) => strip_control_chars(&c.name).into_owned(),
                None => NO_CHANNEL.to_string(),
            };
            let is_selected = match channel {
                Some(c) => app.selected_channel.as_deref() == Some(c.name.as_str()),
                None => app.selected_channel.is_none(),
            };

            let style = if row == app.channel_cursor {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else if channel.is_none() {
                Style::default().fg(Color::Gray)
            } else {
                Style::default()
            };
            let marker = if is_selected { "● " } else { "  " };

            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Green)),
                Span::styled(truncate_to_width(&label, max_width).into_owned(), style),
            ]))
        })
        .collect();

    let border_style = if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let title_style = if app.is_busy() {
        Style::default().add_modifier(Modifier::DIM)
    } else {
        Style::default()
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(Span::styled(format!("Channels ({})", app.catalog.len()), title_style)),
    );

    let mut state = ListState::default().with_selected(Some(app.channel_cursor));
    f.render_stateful_widget(list, area, &mut state);
}
