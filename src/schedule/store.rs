use super::types::{Channel, ChannelSummary, Program, ScheduleSnapshot};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// In-memory table of channels, keyed by position.
///
/// Channels are created once from the catalog and never removed. Names and
/// ids are unique: later duplicates from the source are dropped.
#[derive(Debug, Default)]
pub struct ChannelStore {
    channels: Vec<Channel>,
    selected: Option<usize>,
}

impl ChannelStore {
    pub fn new(channels: Vec<Channel>) -> Self {
        let mut seen_ids = HashSet::new();
        let mut seen_names = HashSet::new();
        let mut unique = Vec::with_capacity(channels.len());

        for channel in channels {
            if !seen_ids.insert(channel.id.clone()) || !seen_names.insert(channel.name.clone()) {
                tracing::warn!(
                    id = %channel.id,
                    name = %channel.name,
                    "Duplicate channel in catalog, keeping the first"
                );
                continue;
            }
            unique.push(channel);
        }

        Self {
            channels: unique,
            selected: None,
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn get(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.name == name)
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    /// Points the selection at `index`, or clears it with `None`.
    ///
    /// Out-of-range indices clear the selection.
    pub fn set_selected(&mut self, index: Option<usize>) {
        self.selected = index.filter(|i| *i < self.channels.len());
    }

    /// Drops every channel's published schedule.
    pub fn clear_all_programs(&mut self) {
        for channel in &mut self.channels {
            channel.clear_programs();
        }
    }

    /// Swaps in a new schedule for the channel at `index`.
    ///
    /// Returns `None` if the index is out of range.
    pub fn replace_schedule(
        &mut self,
        index: usize,
        programs: Vec<Program>,
        marked: Option<usize>,
        fetched_at: DateTime<Utc>,
    ) -> Option<Arc<ScheduleSnapshot>> {
        let channel = self.channels.get_mut(index)?;
        Some(channel.replace_programs(programs, marked, fetched_at))
    }

    pub fn summaries(&self) -> Vec<ChannelSummary> {
        self.channels.iter().map(Channel::summary).collect()
    }
}
