//! Engine event handling.
//!
//! Applies busy/idle transitions and published schedules to the UI state.

use crate::app::{App, AppEvent, BusyState};
use crate::refresh::CycleKind;
use crate::util::strip_control_chars;

pub(super) fn handle_app_event(app: &mut App, event: AppEvent) {
    app.needs_redraw = true;
    match event {
        AppEvent::Busy { kind, channel } => {
            // Periodic and manual cycles start by clearing every channel
            if kind != CycleKind::Selection {
                app.clear_schedule();
            }
            app.busy = Some(BusyState { kind, channel });
        }
        AppEvent::Idle => {
            app.busy = None;
        }
        AppEvent::SchedulePublished(snapshot) => {
            app.apply_schedule(snapshot);
        }
        AppEvent::SelectionCleared => {
            app.clear_selection();
        }
        AppEvent::SelectionRefused { channel } => {
            let target = if channel.is_empty() { "(none)" } else { channel.as_str() };
            app.set_status(format!("Busy updating, {} not selected", target));
        }
        AppEvent::RefreshFailed { channel, error } => {
            app.clear_schedule();
            app.set_status(format!(
                "Could not update {}: {}",
                channel,
                strip_control_chars(&error)
            ));
        }
        AppEvent::MarkingFailed { channel, error } => {
            app.set_status(format!(
                "{}: finished programs not marked ({})",
                channel,
                strip_control_chars(&error)
            ));
        }
        AppEvent::TaskPanicked { task, error } => {
            tracing::error!(task, error = %error, "Background task panicked");
            app.set_status(format!("Internal error in {}", task));
        }
    }
}
