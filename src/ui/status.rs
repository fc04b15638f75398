use crate::app::App;
use crate::refresh::CycleKind;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use std::borrow::Cow;

const KEY_HINTS: &str = "[Enter]select [u]pdate [Tab]switch [?]about [q]uit";

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text: Cow<'_, str> = if let Some(busy) = &app.busy {
        let what = match busy.kind {
            CycleKind::Periodic => "Scheduled update",
            CycleKind::Manual => "Updating",
            CycleKind::Selection => "Loading",
        };
        match &busy.channel {
            Some(name) => Cow::Owned(format!("{} {}...", what, name)),
            None => Cow::Owned(format!("{}...", what)),
        }
    } else if let Some((msg, _)) = &app.status_message {
        Cow::Borrowed(msg.as_ref())
    } else {
        Cow::Borrowed(KEY_HINTS)
    };

    let style = Style::default().bg(Color::DarkGray).fg(Color::White);
    f.render_widget(Paragraph::new(text).style(style), area);
}
