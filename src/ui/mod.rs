//! Terminal User Interface module.
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input handling
//! - `events` - Engine event processing
//! - `render` - Layout and render dispatch
//! - `channels` - Channel selector widget
//! - `programs` - Program table widget
//! - `detail` - Channel/program detail pane
//! - `status` - Status bar widget
//! - `about` - About overlay

mod about;
mod channels;
mod detail;
mod events;
mod input;
mod loop_runner;
mod programs;
mod render;
mod status;

pub use loop_runner::{run, Action};
