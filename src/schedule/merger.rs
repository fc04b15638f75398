//! Paginated fetch-and-merge.
//!
//! A channel's schedule is fetched as three consecutive days (yesterday,
//! today, tomorrow), each split into pages. Pages are requested strictly
//! in order and appended without deduplication; any failure aborts the
//! whole merge so a partial schedule is never published.

use super::types::{Channel, Program};
use crate::source::{FetchError, Page, RemoteSource};
use chrono::{NaiveDate, TimeDelta};
use std::future::Future;

/// Upper bound on pages read from a single listing.
pub const MAX_PAGES: u32 = 100;

/// The days a schedule refresh covers, in fetch order.
pub fn schedule_days(today: NaiveDate) -> [NaiveDate; 3] {
    let yesterday = today.checked_sub_signed(TimeDelta::days(1)).unwrap_or(today);
    let tomorrow = today.checked_add_signed(TimeDelta::days(1)).unwrap_or(today);
    [yesterday, today, tomorrow]
}

fn clamp_total(total_pages: u32, listing: &str) -> u32 {
    if total_pages > MAX_PAGES {
        tracing::warn!(
            listing,
            reported = total_pages,
            max = MAX_PAGES,
            "Source reports more pages than allowed, truncating"
        );
        MAX_PAGES
    } else {
        total_pages.max(1)
    }
}

/// Reads every page of one listing, starting at page 1.
///
/// The first page decides how many pages follow; later pages reporting a
/// different total are logged and ignored.
async fn collect_pages<T, F, Fut>(listing: &str, mut fetch_page: F) -> Result<Vec<T>, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, FetchError>>,
{
    let first = fetch_page(1).await?;
    let total = clamp_total(first.total_pages, listing);
    let mut items = first.items;

    for page in 2..=total {
        let next = fetch_page(page).await?;
        if next.total_pages != first.total_pages {
            tracing::debug!(
                listing,
                page,
                first_total = first.total_pages,
                reported = next.total_pages,
                "Page count changed while paging"
            );
        }
        items.extend(next.items);
    }

    Ok(items)
}

/// Fetches and concatenates a channel's programs for `days`, in day then page order.
pub async fn fetch_channel_programs<S>(
    source: &S,
    channel_id: &str,
    days: &[NaiveDate],
) -> Result<Vec<Program>, FetchError>
where
    S: RemoteSource,
{
    let mut programs = Vec::new();
    for &date in days {
        let listing = format!("schedule {} {}", channel_id, date);
        let day = collect_pages(&listing, |page| source.fetch_schedule_page(channel_id, date, page)).await?;
        tracing::debug!(channel_id, %date, programs = day.len(), "Merged schedule day");
        programs.extend(day);
    }
    Ok(programs)
}

/// Number of pages in the channel catalog, clamped to [`MAX_PAGES`].
pub async fn fetch_channel_page_count<S>(source: &S) -> Result<u32, FetchError>
where
    S: RemoteSource,
{
    let first = source.fetch_channel_page(1).await?;
    Ok(clamp_total(first.total_pages, "channels"))
}

/// Fetches the whole channel catalog in source order.
pub async fn fetch_all_channels<S>(source: &S) -> Result<Vec<Channel>, FetchError>
where
    S: RemoteSource,
{
    let channels = collect_pages("channels", |page| source.fetch_channel_page(page)).await?;
    tracing::info!(channels = channels.len(), "Fetched channel catalog");
    Ok(channels)
}
