use crate::app::{App, Detail};
use crate::util::{format_local, strip_control_chars};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// Lines shown in the detail pane for the current selection.
pub(super) fn detail_lines(app: &App) -> (String, Vec<Line<'static>>) {
    let label = Style::default().fg(Color::Gray);
    let mut lines = Vec::new();

    if let Detail::Program(index) = app.detail {
        if let Some(program) = app.programs().get(index) {
            let title = strip_control_chars(&program.title).into_owned();
            lines.push(Line::from(Span::styled(
                title.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(vec![
                Span::styled("Airs: ", label),
                Span::raw(format!(
                    "{}  to  {}",
                    format_local(program.start_time),
                    format_local(program.end_time)
                )),
            ]));
            lines.push(Line::from(""));
            push_text(&mut lines, program.description.as_deref(), "No description");
            push_image(&mut lines, program.image_url.as_deref(), label);
            return (title, lines);
        }
    }

    match app.selected_summary() {
        Some(channel) => {
            let name = strip_control_chars(&channel.name).into_owned();
            push_text(&mut lines, channel.description.as_deref(), "No description");
            push_image(&mut lines, channel.image_url.as_deref(), label);
            (name, lines)
        }
        None => {
            lines.push(Line::from(Span::styled("No channel selected", label)));
            ("Details".to_string(), lines)
        }
    }
}

fn push_text(lines: &mut Vec<Line<'static>>, text: Option<&str>, fallback: &'static str) {
    match text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => {
            for line in strip_control_chars(text).lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        None => lines.push(Line::from(Span::styled(fallback, Style::default().fg(Color::DarkGray)))),
    }
}

fn push_image(lines: &mut Vec<Line<'static>>, url: Option<&str>, label: Style) {
    if let Some(url) = url {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Image: ", label),
            Span::styled(
                strip_control_chars(url).into_owned(),
                Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
            ),
        ]));
    }
}

/// Render the detail pane
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let (title, lines) = detail_lines(app);
    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}
