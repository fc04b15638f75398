use crate::schedule::ScheduleSnapshot;
use crate::source::FetchError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Period of the automatic refresh. Re-armed whenever any refresh starts.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

/// Whether a periodic or manual refresh is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshState {
    #[default]
    Idle,
    Refreshing,
}

/// Engine state visible to the presentation layer.
///
/// `selection_blocked` is set for every in-flight fetch, including the one a
/// channel selection starts; `refresh` only for periodic and manual cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStatus {
    pub refresh: RefreshState,
    pub selection_blocked: bool,
}

impl EngineStatus {
    pub fn is_busy(&self) -> bool {
        self.refresh == RefreshState::Refreshing || self.selection_blocked
    }

    pub(super) fn for_cycle(kind: CycleKind) -> Self {
        Self {
            refresh: match kind {
                CycleKind::Periodic | CycleKind::Manual => RefreshState::Refreshing,
                CycleKind::Selection => RefreshState::Idle,
            },
            selection_blocked: true,
        }
    }
}

/// What started a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// The hourly timer fired.
    Periodic,
    /// The user asked for an update.
    Manual,
    /// A channel without programs was selected.
    Selection,
}

impl std::fmt::Display for CycleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CycleKind::Periodic => "periodic",
            CycleKind::Manual => "manual",
            CycleKind::Selection => "selection",
        };
        f.write_str(label)
    }
}

/// Reply to a channel selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The empty name was selected; no channel is current.
    Cleared,
    /// The channel's schedule was published, from memory or freshly fetched.
    Published {
        snapshot: Arc<ScheduleSnapshot>,
        cached: bool,
    },
    /// The fetch for the newly selected channel failed.
    Failed(String),
    /// No channel has that name.
    UnknownChannel,
    /// A fetch is in flight; selection is blocked until it finishes.
    Busy,
}

/// Reply to a manual update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRequest {
    Started,
    /// Dropped because a fetch is already in flight.
    Ignored,
}

/// Whether a non-blocking request made it into the engine's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posted {
    Queued,
    /// The queue was full; the request was discarded.
    Dropped,
}

/// The channel catalog could not be loaded, so the engine never started.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to load channel catalog: {0}")]
    Catalog(#[source] FetchError),
}

/// The engine task is gone (shut down or crashed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Refresh engine has stopped")]
pub struct EngineClosed;
