//! Refresh orchestration.
//!
//! A single tokio task owns the [`ChannelStore`](crate::schedule::ChannelStore)
//! and serializes everything that touches it: channel selection, manual
//! updates, the hourly timer and completion of the one fetch allowed in
//! flight. Fetches run on their own task and hand back a finished result;
//! the engine swaps it into the store and tells the presentation layer
//! through [`AppEvent`](crate::app::AppEvent)s.
//!
//! - `state` - Status, outcomes and errors shared with callers
//! - `engine` - The engine task and its handle

mod engine;
mod state;

pub use engine::{spawn, Clock, EngineHandle};
pub use state::{
    CycleKind, EngineClosed, EngineStatus, Posted, RefreshState, SelectOutcome, StartupError,
    UpdateRequest, REFRESH_INTERVAL,
};

use crate::app::AppEvent;
use crate::schedule::{fetch_all_channels, ChannelStore};
use crate::source::RemoteSource;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Loads the channel catalog and starts the engine.
///
/// # Errors
///
/// [`StartupError::Catalog`] if the catalog cannot be fetched; the engine is
/// not started in that case.
pub async fn start<S: RemoteSource>(
    source: S,
    events: mpsc::Sender<AppEvent>,
) -> Result<EngineHandle, StartupError> {
    start_with_clock(Arc::new(source), events, Utc::now).await
}

pub async fn start_with_clock<S: RemoteSource>(
    source: Arc<S>,
    events: mpsc::Sender<AppEvent>,
    clock: Clock,
) -> Result<EngineHandle, StartupError> {
    let channels = fetch_all_channels(source.as_ref())
        .await
        .map_err(StartupError::Catalog)?;
    if channels.is_empty() {
        tracing::warn!("Channel catalog is empty");
    }
    Ok(spawn(source, ChannelStore::new(channels), events, clock))
}
