//! Schedule domain: channels, programs and the algorithms over them.
//!
//! - [`types`] - Channel, Program and the published snapshot
//! - [`window`] - Time window filter and "most recently ended" marking
//! - [`merger`] - Paginated fetch-and-merge against a [`crate::source::RemoteSource`]
//! - [`store`] - In-memory channel table with the current selection

pub mod merger;
pub mod store;
pub mod types;
pub mod window;

pub use merger::{fetch_all_channels, fetch_channel_page_count, fetch_channel_programs, schedule_days, MAX_PAGES};
pub use store::ChannelStore;
pub use types::{
    parse_timestamp, Channel, ChannelSummary, Program, ScheduleSnapshot, TimestampError,
    SOURCE_TIMESTAMP_FORMAT,
};
pub use window::{filter_window, mark_most_recently_ended, MarkingError, WINDOW_HOURS};
