//! Remote schedule source.
//!
//! The engine only sees the [`RemoteSource`] trait: two paginated endpoints,
//! one for the channel catalog and one for a channel's schedule on a given
//! day. [`HttpSource`] implements it against the Sveriges Radio open API.
//!
//! - `http` - HTTP fetching with retry, size limits and timeouts
//! - `xml` - Mapping of the API's XML documents onto channels and programs

mod http;
mod xml;

use crate::schedule::{Channel, Program};
use chrono::NaiveDate;
use std::future::Future;
use thiserror::Error;

pub use http::{HttpSource, DEFAULT_API_BASE_URL};
pub use xml::{parse_channel_page, parse_schedule_page, XmlError};

/// Errors that can occur while reading from the remote source.
///
/// Every failure is reported as an error, never as an empty page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Document could not be mapped onto channels or programs
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// The configured API address is not usable
    #[error("Invalid API address: {0}")]
    InvalidUrl(String),
}

impl From<XmlError> for FetchError {
    fn from(e: XmlError) -> Self {
        FetchError::Parse(e.to_string())
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based number of this page.
    pub page: u32,
    /// Total page count as reported by the source (at least 1).
    pub total_pages: u32,
}

pub type ChannelPage = Page<Channel>;
pub type ProgramPage = Page<Program>;

/// A paginated provider of channels and per-day schedules.
///
/// Page numbers start at 1. Implementations apply their own timeouts; the
/// engine does not add one on top.
pub trait RemoteSource: Send + Sync + 'static {
    /// Fetches one page of the channel catalog.
    fn fetch_channel_page(
        &self,
        page: u32,
    ) -> impl Future<Output = Result<ChannelPage, FetchError>> + Send;

    /// Fetches one page of `channel_id`'s schedule for `date`.
    fn fetch_schedule_page(
        &self,
        channel_id: &str,
        date: NaiveDate,
        page: u32,
    ) -> impl Future<Output = Result<ProgramPage, FetchError>> + Send;
}
