use crate::refresh::CycleKind;
use crate::schedule::{ChannelSummary, Program, ScheduleSnapshot};
use std::borrow::Cow;
use std::sync::Arc;
use tokio::time::Instant;

/// How long a transient status notice stays visible.
const STATUS_TTL_SECS: u64 = 3;

/// Notifications from the refresh engine to the event loop.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A fetch started. `channel` is `None` for a refresh with nothing selected.
    Busy {
        kind: CycleKind,
        channel: Option<String>,
    },
    /// The engine is idle again; selection and updates are accepted.
    Idle,
    /// A new (or cached) schedule for the selected channel.
    SchedulePublished(Arc<ScheduleSnapshot>),
    /// The empty selection was applied.
    SelectionCleared,
    /// A selection arrived while a fetch was running and was not applied.
    SelectionRefused {
        channel: String,
    },
    RefreshFailed {
        channel: String,
        error: String,
    },
    /// The schedule was published without a marked program.
    MarkingFailed {
        channel: String,
        error: String,
    },
    /// A background task panicked.
    ///
    /// Fields:
    /// - `task`: Name of the task that panicked (e.g., "schedule_fetch")
    /// - `error`: The panic message extracted from the panic payload
    TaskPanicked {
        task: &'static str,
        error: String,
    },
}

/// Which panel receives navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Channels,
    Programs,
}

/// What the detail pane shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detail {
    /// Description and image of the selected channel.
    Channel,
    /// Description and image of the program at this row.
    Program(usize),
}

/// A fetch the engine reported as running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusyState {
    pub kind: CycleKind,
    pub channel: Option<String>,
}

/// Presentation state of the terminal UI.
///
/// Holds only what the engine published; it never mutates schedules itself.
pub struct App {
    pub catalog: Vec<ChannelSummary>,
    pub focus: Focus,
    /// Row in the channel list; row 0 is the "(none)" entry.
    pub channel_cursor: usize,
    /// Name of the channel the engine has selected.
    pub selected_channel: Option<String>,
    pub schedule: Option<Arc<ScheduleSnapshot>>,
    pub program_cursor: usize,
    pub detail: Detail,
    pub busy: Option<BusyState>,
    pub status_message: Option<(Cow<'static, str>, Instant)>,
    pub show_about: bool,
    pub should_quit: bool,
    /// Set whenever visible state changes; the loop redraws and clears it.
    pub needs_redraw: bool,
}

impl App {
    pub fn new(catalog: Vec<ChannelSummary>) -> Self {
        Self {
            catalog,
            focus: Focus::Channels,
            channel_cursor: 0,
            selected_channel: None,
            schedule: None,
            program_cursor: 0,
            detail: Detail::Channel,
            busy: None,
            status_message: None,
            show_about: false,
            should_quit: false,
            needs_redraw: true,
        }
    }

    /// Rows in the channel list, including "(none)".
    pub fn channel_rows(&self) -> usize {
        self.catalog.len() + 1
    }

    /// Channel at the cursor, `None` on the "(none)" row.
    pub fn channel_under_cursor(&self) -> Option<&ChannelSummary> {
        self.channel_cursor
            .checked_sub(1)
            .and_then(|i| self.catalog.get(i))
    }

    /// Name to hand to the engine for the cursor row; empty for "(none)".
    pub fn selection_request(&self) -> String {
        self.channel_under_cursor()
            .map(|c| c.name.clone())
            .unwrap_or_default()
    }

    /// Moves the channel cursor onto `name`, if it is in the catalog.
    pub fn focus_channel(&mut self, name: &str) -> bool {
        match self.catalog.iter().position(|c| c.name == name) {
            Some(i) => {
                self.channel_cursor = i + 1;
                self.needs_redraw = true;
                true
            }
            None => false,
        }
    }

    pub fn programs(&self) -> &[Program] {
        self.schedule
            .as_deref()
            .map(|s| s.programs.as_slice())
            .unwrap_or(&[])
    }

    pub fn selected_program(&self) -> Option<&Program> {
        self.programs().get(self.program_cursor)
    }

    pub fn selected_summary(&self) -> Option<&ChannelSummary> {
        let name = self.selected_channel.as_deref()?;
        self.catalog.iter().find(|c| c.name == name)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_some()
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Channels => Focus::Programs,
            Focus::Programs => Focus::Channels,
        };
        self.needs_redraw = true;
    }

    pub fn move_down(&mut self) {
        match self.focus {
            Focus::Channels => {
                if self.channel_cursor + 1 < self.channel_rows() {
                    self.channel_cursor += 1;
                }
            }
            Focus::Programs => {
                if self.program_cursor + 1 < self.programs().len() {
                    self.program_cursor += 1;
                }
            }
        }
        self.needs_redraw = true;
    }

    pub fn move_up(&mut self) {
        match self.focus {
            Focus::Channels => self.channel_cursor = self.channel_cursor.saturating_sub(1),
            Focus::Programs => self.program_cursor = self.program_cursor.saturating_sub(1),
        }
        self.needs_redraw = true;
    }

    pub fn move_to_top(&mut self) {
        match self.focus {
            Focus::Channels => self.channel_cursor = 0,
            Focus::Programs => self.program_cursor = 0,
        }
        self.needs_redraw = true;
    }

    pub fn move_to_bottom(&mut self) {
        match self.focus {
            Focus::Channels => self.channel_cursor = self.channel_rows().saturating_sub(1),
            Focus::Programs => self.program_cursor = self.programs().len().saturating_sub(1),
        }
        self.needs_redraw = true;
    }

    /// Shows the description of the program under the cursor.
    pub fn show_program_detail(&mut self) {
        if self.selected_program().is_some() {
            self.detail = Detail::Program(self.program_cursor);
            self.needs_redraw = true;
        }
    }

    /// Takes over a published schedule; the cursor lands on the first
    /// program that has not finished yet.
    pub fn apply_schedule(&mut self, snapshot: Arc<ScheduleSnapshot>) {
        let upcoming = snapshot.marked.map_or(0, |m| m + 1);
        self.program_cursor = upcoming.min(snapshot.programs.len().saturating_sub(1));
        self.selected_channel = Some(snapshot.channel_name.clone());
        self.schedule = Some(snapshot);
        self.detail = Detail::Channel;
        self.needs_redraw = true;
    }

    /// Drops the displayed schedule, keeping the selection.
    pub fn clear_schedule(&mut self) {
        self.schedule = None;
        self.program_cursor = 0;
        self.detail = Detail::Channel;
        self.needs_redraw = true;
    }

    /// Empty selection: no channel, no programs, no description.
    pub fn clear_selection(&mut self) {
        self.selected_channel = None;
        self.clear_schedule();
    }

    /// Set status message (will auto-expire after 3 seconds)
    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
        self.needs_redraw = true;
    }

    /// Clear status message if expired (older than 3 seconds)
    /// Returns true if a message was actually cleared
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed().as_secs() >= STATUS_TTL_SECS {
                self.status_message = None;
                self.needs_redraw = true;
                return true;
            }
        }
        false
    }
}
