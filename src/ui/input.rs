//! Keyboard input handling.
//!
//! Input only updates UI state and reports what the engine should do; the
//! loop runner forwards engine requests without waiting for them.

use crate::app::{App, Focus};
use crossterm::event::{KeyCode, KeyModifiers};

use super::Action;

pub(super) fn handle_input(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> Action {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        return Action::Quit;
    }

    // The about overlay captures all keys while visible
    if app.show_about {
        if matches!(code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') | KeyCode::Enter) {
            app.show_about = false;
            app.needs_redraw = true;
        }
        return Action::Continue;
    }

    match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('?') => {
            app.show_about = true;
            app.needs_redraw = true;
            Action::Continue
        }
        KeyCode::Tab | KeyCode::BackTab => {
            app.toggle_focus();
            Action::Continue
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.move_down();
            Action::Continue
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.move_up();
            Action::Continue
        }
        KeyCode::Char('g') | KeyCode::Home => {
            app.move_to_top();
            Action::Continue
        }
        KeyCode::Char('G') | KeyCode::End => {
            app.move_to_bottom();
            Action::Continue
        }
        KeyCode::Char('u') => {
            if app.is_busy() {
                app.set_status("Update already in progress");
                Action::Continue
            } else {
                Action::ManualUpdate
            }
        }
        KeyCode::Enter => match app.focus {
            Focus::Channels => {
                if app.is_busy() {
                    app.set_status("Busy, try again when the update finishes");
                    Action::Continue
                } else {
                    Action::SelectChannel(app.selection_request())
                }
            }
            Focus::Programs => {
                app.show_program_detail();
                Action::Continue
            }
        },
        _ => Action::Continue,
    }
}
