use chrono::{DateTime, NaiveDateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Wire format of every timestamp the schedule source hands out.
pub const SOURCE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

// ============================================================================
// Error Types
// ============================================================================

/// A timestamp string that does not follow `YYYY-MM-DDTHH:MM:SSZ`.
#[derive(Debug, Error)]
#[error("Invalid timestamp '{value}': {source}")]
pub struct TimestampError {
    pub value: String,
    #[source]
    pub source: chrono::ParseError,
}

/// Parses a source timestamp (`2017-12-10T05:00:00Z`) into UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    NaiveDateTime::parse_from_str(value.trim(), SOURCE_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|source| TimestampError {
            value: value.to_string(),
            source,
        })
}

// ============================================================================
// Program
// ============================================================================

/// A single scheduled broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Program {
    pub fn new(title: impl Into<String>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            description: None,
            image_url: None,
            start_time,
            end_time,
        }
    }

    /// Builds a program from the raw start/end strings of a schedule entry.
    ///
    /// An end time that is not after the start time is accepted but logged,
    /// since the source does not guarantee it.
    pub fn from_source(title: impl Into<String>, start: &str, end: &str) -> Result<Self, TimestampError> {
        let program = Self::new(title, parse_timestamp(start)?, parse_timestamp(end)?);
        if !program.has_valid_span() {
            tracing::warn!(
                title = %program.title,
                start = %program.start_time,
                end = %program.end_time,
                "Program ends before it starts"
            );
        }
        Ok(program)
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }

    pub fn has_valid_span(&self) -> bool {
        self.end_time > self.start_time
    }
}

// ============================================================================
// Published Schedule
// ============================================================================

/// Immutable result of one refresh of one channel.
///
/// Handed to the presentation layer behind an `Arc`. A refresh never edits a
/// published snapshot; it swaps in a new one, so a reader always sees either
/// the previous list or the complete new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSnapshot {
    pub channel_id: String,
    pub channel_name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub programs: Vec<Program>,
    /// Index into `programs` of the most recently ended program.
    pub marked: Option<usize>,
    pub fetched_at: DateTime<Utc>,
}

impl ScheduleSnapshot {
    /// Whether the row at `index` has already finished, given the marking.
    pub fn is_finished(&self, index: usize) -> bool {
        self.marked.is_some_and(|marked| index <= marked)
    }
}

// ============================================================================
// Channel
// ============================================================================

/// A broadcast channel and its current schedule.
///
/// `schedule` is `None` until the channel is fetched and again after every
/// refresh clears the store.
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    schedule: Option<Arc<ScheduleSnapshot>>,
}

impl Channel {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            image_url: None,
            schedule: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }

    pub fn schedule(&self) -> Option<&Arc<ScheduleSnapshot>> {
        self.schedule.as_ref()
    }

    pub fn programs(&self) -> &[Program] {
        self.schedule
            .as_deref()
            .map(|s| s.programs.as_slice())
            .unwrap_or(&[])
    }

    pub fn marked(&self) -> Option<usize> {
        self.schedule.as_deref().and_then(|s| s.marked)
    }

    pub fn has_programs(&self) -> bool {
        !self.programs().is_empty()
    }

    pub fn clear_programs(&mut self) {
        self.schedule = None;
    }

    /// Replaces the whole program list in one swap and returns the new snapshot.
    pub fn replace_programs(
        &mut self,
        programs: Vec<Program>,
        marked: Option<usize>,
        fetched_at: DateTime<Utc>,
    ) -> Arc<ScheduleSnapshot> {
        let snapshot = Arc::new(ScheduleSnapshot {
            channel_id: self.id.clone(),
            channel_name: self.name.clone(),
            description: self.description.clone(),
            image_url: self.image_url.clone(),
            programs,
            marked,
            fetched_at,
        });
        self.schedule = Some(Arc::clone(&snapshot));
        snapshot
    }

    pub fn summary(&self) -> ChannelSummary {
        ChannelSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            image_url: self.image_url.clone(),
        }
    }
}

/// Catalog entry handed to the presentation layer for the channel selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}
