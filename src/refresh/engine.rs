use super::state::{
    CycleKind, EngineClosed, EngineStatus, Posted, SelectOutcome, UpdateRequest, REFRESH_INTERVAL,
};
use crate::app::AppEvent;
use crate::schedule::{
    fetch_channel_programs, filter_window, mark_most_recently_ended, schedule_days, ChannelStore,
    ChannelSummary, MarkingError, Program, WINDOW_HOURS,
};
use crate::source::{FetchError, RemoteSource};
use crate::util::catch_task_panic;
use chrono::{DateTime, Local, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Source of "now" for windowing, marking and the day range.
pub type Clock = fn() -> DateTime<Utc>;

const COMMAND_QUEUE: usize = 16;

enum Command {
    Select {
        name: String,
        reply: Option<oneshot::Sender<SelectOutcome>>,
    },
    ManualUpdate {
        reply: Option<oneshot::Sender<UpdateRequest>>,
    },
    Shutdown,
}

/// What a fetch task hands back: the filtered list and its marking.
struct CycleOutput {
    programs: Vec<Program>,
    marked: Result<Option<usize>, MarkingError>,
    fetched_at: DateTime<Utc>,
}

enum CycleResult {
    Done(CycleOutput),
    Failed(FetchError),
    Panicked(String),
}

struct InFlight {
    kind: CycleKind,
    channel: usize,
    task: JoinHandle<Result<Result<CycleOutput, FetchError>, String>>,
    reply: Option<oneshot::Sender<SelectOutcome>>,
}

/// Control surface of a running engine.
///
/// `post_*` methods never wait and are safe to call from the event loop
/// that drains the engine's [`AppEvent`]s. The awaiting variants must not be
/// used from that loop, because the engine may be blocked handing it an event.
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<EngineStatus>,
    catalog: Arc<[ChannelSummary]>,
    task: JoinHandle<()>,
}

impl EngineHandle {
    /// Channels known to the engine, in catalog order.
    pub fn catalog(&self) -> &[ChannelSummary] {
        &self.catalog
    }

    pub fn status(&self) -> EngineStatus {
        *self.status.borrow()
    }

    /// Selects `name` (empty to clear) and waits until the outcome is known.
    ///
    /// For a channel without programs this includes the whole fetch.
    pub async fn select_channel(&self, name: &str) -> Result<SelectOutcome, EngineClosed> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Select {
                name: name.to_string(),
                reply: Some(reply),
            })
            .await
            .map_err(|_| EngineClosed)?;
        rx.await.map_err(|_| EngineClosed)
    }

    /// Queues a selection; its result arrives as [`AppEvent`]s.
    ///
    /// Returns [`Posted::Dropped`] when the command queue is full.
    pub fn post_select_channel(&self, name: &str) -> Result<Posted, EngineClosed> {
        self.post(Command::Select {
            name: name.to_string(),
            reply: None,
        })
    }

    pub async fn request_manual_update(&self) -> Result<UpdateRequest, EngineClosed> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::ManualUpdate { reply: Some(reply) })
            .await
            .map_err(|_| EngineClosed)?;
        rx.await.map_err(|_| EngineClosed)
    }

    pub fn post_manual_update(&self) -> Result<Posted, EngineClosed> {
        self.post(Command::ManualUpdate { reply: None })
    }

    fn post(&self, command: Command) -> Result<Posted, EngineClosed> {
        match self.commands.try_send(command) {
            Ok(()) => Ok(Posted::Queued),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Engine command queue full, dropping request");
                Ok(Posted::Dropped)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(EngineClosed),
        }
    }

    /// Stops the engine and waits for its task. An in-flight fetch is aborted.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown).await;
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Refresh engine task ended abnormally");
        }
    }
}

/// Spawns the engine task over an already loaded store.
pub fn spawn<S: RemoteSource>(
    source: Arc<S>,
    store: ChannelStore,
    events: mpsc::Sender<AppEvent>,
    clock: Clock,
) -> EngineHandle {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
    let (status_tx, status_rx) = watch::channel(EngineStatus::default());
    let catalog: Arc<[ChannelSummary]> = store.summaries().into();

    let engine = Engine {
        source,
        store,
        events,
        status: status_tx,
        clock,
        next_tick: Instant::now() + REFRESH_INTERVAL,
        in_flight: None,
    };
    let task = tokio::spawn(engine.run(command_rx));

    EngineHandle {
        commands: command_tx,
        status: status_rx,
        catalog,
        task,
    }
}

struct Engine<S> {
    source: Arc<S>,
    store: ChannelStore,
    events: mpsc::Sender<AppEvent>,
    status: watch::Sender<EngineStatus>,
    clock: Clock,
    next_tick: Instant,
    in_flight: Option<InFlight>,
}

impl<S: RemoteSource> Engine<S> {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        tracing::debug!(channels = self.store.len(), "Refresh engine started");

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Select { name, reply }) => self.select(name, reply).await,
                    Some(Command::ManualUpdate { reply }) => {
                        let outcome = self.begin_refresh(CycleKind::Manual).await;
                        send_reply(reply, outcome);
                    }
                    Some(Command::Shutdown) | None => break,
                },

                result = join_in_flight(&mut self.in_flight) => self.finish_cycle(result).await,

                _ = tokio::time::sleep_until(self.next_tick) => {
                    if self.in_flight.is_some() {
                        // Dropped, not deferred: the next one is a full interval away
                        self.next_tick = Instant::now() + REFRESH_INTERVAL;
                        tracing::debug!("Periodic refresh skipped, fetch in flight");
                    } else {
                        self.begin_refresh(CycleKind::Periodic).await;
                    }
                }
            }
        }

        if let Some(flight) = self.in_flight.take() {
            flight.task.abort();
            tracing::debug!(kind = %flight.kind, "Aborted in-flight fetch on shutdown");
        }
        tracing::debug!("Refresh engine stopped");
    }

    async fn emit(&self, event: AppEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }

    async fn select(&mut self, name: String, reply: Option<oneshot::Sender<SelectOutcome>>) {
        if self.in_flight.is_some() {
            tracing::debug!(channel = %name, "Selection refused, fetch in flight");
            self.emit(AppEvent::SelectionRefused { channel: name }).await;
            send_reply(reply, SelectOutcome::Busy);
            return;
        }

        if name.is_empty() {
            self.store.set_selected(None);
            tracing::debug!("Selection cleared");
            self.emit(AppEvent::SelectionCleared).await;
            send_reply(reply, SelectOutcome::Cleared);
            return;
        }

        let Some(index) = self.store.index_of(&name) else {
            tracing::warn!(channel = %name, "Unknown channel selected");
            send_reply(reply, SelectOutcome::UnknownChannel);
            return;
        };
        self.store.set_selected(Some(index));

        let cached = self
            .store
            .get(index)
            .and_then(|c| c.schedule())
            .filter(|s| !s.programs.is_empty())
            .cloned();
        match cached {
            Some(snapshot) => {
                tracing::debug!(channel = %name, "Publishing cached schedule");
                self.emit(AppEvent::SchedulePublished(Arc::clone(&snapshot))).await;
                send_reply(reply, SelectOutcome::Published { snapshot, cached: true });
            }
            None => self.spawn_fetch(CycleKind::Selection, index, reply).await,
        }
    }

    /// Starts a periodic or manual cycle unless a fetch is already running.
    async fn begin_refresh(&mut self, kind: CycleKind) -> UpdateRequest {
        if let Some(flight) = &self.in_flight {
            tracing::debug!(kind = %kind, running = %flight.kind, "Refresh ignored, fetch in flight");
            return UpdateRequest::Ignored;
        }

        self.next_tick = Instant::now() + REFRESH_INTERVAL;
        self.store.clear_all_programs();

        match self.store.selected_index() {
            Some(index) => self.spawn_fetch(kind, index, None).await,
            None => {
                tracing::debug!(kind = %kind, "Refresh with no channel selected");
                self.emit(AppEvent::Busy { kind, channel: None }).await;
                self.emit(AppEvent::Idle).await;
            }
        }
        UpdateRequest::Started
    }

    async fn spawn_fetch(
        &mut self,
        kind: CycleKind,
        index: usize,
        reply: Option<oneshot::Sender<SelectOutcome>>,
    ) {
        let Some(channel) = self.store.get(index) else {
            send_reply(reply, SelectOutcome::UnknownChannel);
            return;
        };
        let channel_id = channel.id.clone();
        let channel_name = channel.name.clone();

        self.status.send_replace(EngineStatus::for_cycle(kind));
        tracing::info!(kind = %kind, channel = %channel_name, "Refreshing schedule");
        self.emit(AppEvent::Busy {
            kind,
            channel: Some(channel_name),
        })
        .await;

        let source = Arc::clone(&self.source);
        let clock = self.clock;
        let task = tokio::spawn(async move {
            catch_task_panic(fetch_schedule(source, channel_id, clock)).await
        });

        self.in_flight = Some(InFlight {
            kind,
            channel: index,
            task,
            reply,
        });
    }

    async fn finish_cycle(&mut self, result: CycleResult) {
        let Some(flight) = self.in_flight.take() else {
            return;
        };
        let channel_name = self
            .store
            .get(flight.channel)
            .map(|c| c.name.clone())
            .unwrap_or_default();

        let outcome = match result {
            CycleResult::Done(output) => {
                let marked = match output.marked {
                    Ok(marked) => marked,
                    Err(e) => {
                        tracing::warn!(channel = %channel_name, error = %e, "Failed to mark finished programs");
                        self.emit(AppEvent::MarkingFailed {
                            channel: channel_name.clone(),
                            error: e.to_string(),
                        })
                        .await;
                        None
                    }
                };

                match self
                    .store
                    .replace_schedule(flight.channel, output.programs, marked, output.fetched_at)
                {
                    Some(snapshot) => {
                        tracing::info!(
                            kind = %flight.kind,
                            channel = %channel_name,
                            programs = snapshot.programs.len(),
                            marked = ?snapshot.marked,
                            "Schedule published"
                        );
                        self.emit(AppEvent::SchedulePublished(Arc::clone(&snapshot))).await;
                        SelectOutcome::Published {
                            snapshot,
                            cached: false,
                        }
                    }
                    None => SelectOutcome::UnknownChannel,
                }
            }
            CycleResult::Failed(e) => {
                tracing::warn!(kind = %flight.kind, channel = %channel_name, error = %e, "Schedule refresh failed");
                self.emit(AppEvent::RefreshFailed {
                    channel: channel_name,
                    error: e.to_string(),
                })
                .await;
                SelectOutcome::Failed(e.to_string())
            }
            CycleResult::Panicked(msg) => {
                tracing::error!(kind = %flight.kind, channel = %channel_name, error = %msg, "Schedule fetch task panicked");
                self.emit(AppEvent::TaskPanicked {
                    task: "schedule_fetch",
                    error: msg.clone(),
                })
                .await;
                SelectOutcome::Failed(msg)
            }
        };

        send_reply(flight.reply, outcome);
        self.status.send_replace(EngineStatus::default());
        self.emit(AppEvent::Idle).await;
    }
}

fn send_reply<T>(reply: Option<oneshot::Sender<T>>, value: T) {
    if let Some(tx) = reply {
        // The caller may have stopped waiting
        let _ = tx.send(value);
    }
}

/// Resolves when the in-flight fetch finishes; pending forever when idle.
async fn join_in_flight(in_flight: &mut Option<InFlight>) -> CycleResult {
    let Some(flight) = in_flight.as_mut() else {
        return std::future::pending().await;
    };
    match (&mut flight.task).await {
        Ok(Ok(Ok(output))) => CycleResult::Done(output),
        Ok(Ok(Err(e))) => CycleResult::Failed(e),
        Ok(Err(panic_msg)) => CycleResult::Panicked(panic_msg),
        Err(join_error) => CycleResult::Panicked(join_error.to_string()),
    }
}

/// Merge, filter and mark one channel. Runs off the engine task.
async fn fetch_schedule<S: RemoteSource>(
    source: Arc<S>,
    channel_id: String,
    clock: Clock,
) -> Result<CycleOutput, FetchError> {
    let started = clock();
    let days = schedule_days(started.with_timezone(&Local).date_naive());
    let programs = fetch_channel_programs(source.as_ref(), &channel_id, &days).await?;

    let now = clock();
    let programs = filter_window(programs, WINDOW_HOURS, now);
    let marked = mark_most_recently_ended(&programs, now);
    Ok(CycleOutput {
        programs,
        marked,
        fetched_at: now,
    })
}
