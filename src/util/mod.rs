//! Utility functions for common operations.
//!
//! - **Text processing**: Unicode-aware width, truncation and control-character stripping
//! - **Time display**: Local-time formatting of program start and end times
//! - **Tasks**: Panic capture for spawned background work
//!
//! # Examples
//!
//! ```
//! use radioinfo::util::truncate_to_width;
//!
//! assert_eq!(truncate_to_width("Morgonpasset i P3", 10), "Morgonp...");
//! ```

mod task;
mod text;
mod time;

pub use task::catch_task_panic;
pub use text::{single_line, strip_control_chars, truncate_to_width};
pub use time::{format_in, format_local, DISPLAY_TIME_FORMAT};
