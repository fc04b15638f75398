use crate::app::{App, Focus};
use crate::util::{format_local, strip_control_chars};
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

/// Render the program table of the selected channel
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let is_focused = app.focus == Focus::Programs;

    let border_style = if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let title = match (&app.schedule, &app.busy) {
        (_, Some(busy)) => match &busy.channel {
            Some(name) => format!("Programs - updating {}...", name),
            None => "Programs - updating...".to_string(),
        },
        (Some(s), None) => format!("Programs - {}", strip_control_chars(&s.channel_name)),
        (None, None) => "Programs".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);

    let Some(schedule) = app.schedule.as_deref() else {
        let hint = if app.selected_channel.is_some() {
            "No programs"
        } else {
            "Select a channel"
        };
        let table = Table::new(vec![Row::new(vec![Cell::from(hint)])], [Constraint::Min(10)]).block(block);
        f.render_widget(table, area);
        return;
    };

    let rows: Vec<Row> = schedule
        .programs
        .iter()
        .enumerate()
        .map(|(i, program)| {
            let style = if Some(i) == schedule.marked {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if schedule.is_finished(i) {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(format_local(program.start_time)),
                Cell::from(format_local(program.end_time)),
                Cell::from(strip_control_chars(&program.title).into_owned()),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(18),
        Constraint::Length(18),
        Constraint::Min(10),
    ];
    let table = Table::new(rows, widths)
        .block(block)
        .header(
            Row::new(vec!["Start", "End", "Title"])
                .style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED)),
        )
        .row_highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));

    let mut state = TableState::default();
    if !schedule.programs.is_empty() {
        state.select(Some(app.program_cursor));
    }
    f.render_stateful_widget(table, area, &mut state);
}
