//! radioinfo: a terminal viewer for radio channel schedules.
//!
//! - [`source`] - Remote schedule API client and XML page parsing
//! - [`schedule`] - Domain types, page merging, time-window filtering
//! - [`refresh`] - Single-flight refresh engine and hourly timer
//! - [`app`] - Presentation state driven by engine events
//! - [`ui`] - ratatui rendering and input
//! - [`config`] - Optional TOML configuration

pub mod app;
pub mod config;
pub mod refresh;
pub mod schedule;
pub mod source;
pub mod ui;
pub mod util;
