use super::xml::{parse_channel_page, parse_schedule_page};
use super::{ChannelPage, FetchError, ProgramPage, RemoteSource};
use crate::config::Config;
use chrono::NaiveDate;
use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use url::Url;

/// Sveriges Radio open API, version 2.
pub const DEFAULT_API_BASE_URL: &str = "https://api.sr.se/api/v2";

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Create a custom redirect policy with loop detection and limited hops.
///
/// - Limits redirects to 3 hops maximum
/// - Detects redirect loops (same URL appearing twice in chain)
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// [`RemoteSource`] backed by the Sveriges Radio XML API.
///
/// Each page is one GET request:
///
/// - `{base}/channels?page=N`
/// - `{base}/scheduledepisodes?channelid=ID&date=YYYY-MM-DD&page=N`
///
/// Page 1 is requested without a `page` parameter. Server errors (5xx),
/// rate limiting (429) and truncated bodies are retried with exponential
/// backoff; client errors (4xx) fail immediately.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: Url,
    max_retries: u32,
    retry_base_delay: Duration,
    request_timeout: Duration,
}

impl HttpSource {
    /// Creates a source for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// [`FetchError::InvalidUrl`] if `base_url` is not an absolute http(s) URL,
    /// [`FetchError::Network`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .redirect(create_redirect_policy())
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .user_agent(concat!("radioinfo/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Ok(Self::new(&config.api_base_url)?
            .with_max_retries(config.max_retries)
            .with_request_timeout(Duration::from_secs(config.request_timeout_secs)))
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before the first retry; doubled on every further attempt.
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, resource: &str, page: u32) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(resource);
        if page > 1 {
            url.query_pairs_mut().append_pair("page", &page.to_string());
        }
        Ok(url)
    }

    pub fn channels_url(&self, page: u32) -> Result<Url, FetchError> {
        self.endpoint("channels", page)
    }

    pub fn schedule_url(&self, channel_id: &str, date: NaiveDate, page: u32) -> Result<Url, FetchError> {
        let mut url = self.endpoint("scheduledepisodes", 1)?;
        url.query_pairs_mut()
            .append_pair("channelid", channel_id)
            .append_pair("date", &date.format("%Y-%m-%d").to_string());
        if page > 1 {
            url.query_pairs_mut().append_pair("page", &page.to_string());
        }
        Ok(url)
    }

    fn backoff(&self, retry_count: u32) -> Duration {
        self.retry_base_delay.saturating_mul(2u32.saturating_pow(retry_count))
    }

    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let mut retry_count = 0;

        loop {
            tracing::debug!(url = %url, attempt = retry_count + 1, "Requesting page");
            let response = tokio::time::timeout(self.request_timeout, self.client.get(url.clone()).send())
                .await
                .map_err(|_| FetchError::Timeout)?
                .map_err(FetchError::Network)?;

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if retry_count >= self.max_retries {
                    return Err(FetchError::RateLimited(self.max_retries));
                }
                let delay = self.backoff(retry_count);
                tracing::warn!(
                    url = %url,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if status.is_server_error() {
                if retry_count >= self.max_retries {
                    return Err(FetchError::HttpStatus(status.as_u16()));
                }
                let delay = self.backoff(retry_count);
                tracing::warn!(
                    url = %url,
                    status = %status,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Server error, retrying after delay"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            // 4xx and other non-success statuses are not worth retrying
            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            let body = tokio::time::timeout(self.request_timeout, read_limited_bytes(response, MAX_RESPONSE_SIZE))
                .await
                .map_err(|_| FetchError::Timeout)?;
            match body {
                Ok(bytes) => return Ok(bytes),
                Err(FetchError::IncompleteResponse { expected, received }) => {
                    if retry_count >= self.max_retries {
                        return Err(FetchError::IncompleteResponse { expected, received });
                    }
                    let delay = self.backoff(retry_count);
                    tracing::debug!(
                        url = %url,
                        expected,
                        received,
                        attempt = retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying incomplete download"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl RemoteSource for HttpSource {
    async fn fetch_channel_page(&self, page: u32) -> Result<ChannelPage, FetchError> {
        let url = self.channels_url(page)?;
        let bytes = self.get_bytes(&url).await?;
        let parsed = parse_channel_page(&bytes, page)?;
        tracing::debug!(
            page,
            total_pages = parsed.total_pages,
            channels = parsed.items.len(),
            "Fetched channel page"
        );
        Ok(parsed)
    }

    async fn fetch_schedule_page(
        &self,
        channel_id: &str,
        date: NaiveDate,
        page: u32,
    ) -> Result<ProgramPage, FetchError> {
        let url = self.schedule_url(channel_id, date, page)?;
        let bytes = self.get_bytes(&url).await?;
        let parsed = parse_schedule_page(&bytes, page)?;
        tracing::debug!(
            channel_id,
            %date,
            page,
            total_pages = parsed.total_pages,
            programs = parsed.items.len(),
            "Fetched schedule page"
        );
        Ok(parsed)
    }
}

async fn read_limited_bytes(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // A connection dropped mid-body shows up as fewer bytes than announced
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_channels_url() {
        let source = HttpSource::new("https://api.sr.se/api/v2").unwrap();
        assert_eq!(source.channels_url(1).unwrap().as_str(), "https://api.sr.se/api/v2/channels");
        assert_eq!(
            source.channels_url(3).unwrap().as_str(),
            "https://api.sr.se/api/v2/channels?page=3"
        );
    }

    #[test]
    fn test_schedule_url() {
        let source = HttpSource::new("https://api.sr.se/api/v2/").unwrap();
        let date = NaiveDate::from_ymd_opt(2017, 12, 10).unwrap();
        assert_eq!(
            source.schedule_url("164", date, 1).unwrap().as_str(),
            "https://api.sr.se/api/v2/scheduledepisodes?channelid=164&date=2017-12-10"
        );
        assert_eq!(
            source.schedule_url("164", date, 2).unwrap().as_str(),
            "https://api.sr.se/api/v2/scheduledepisodes?channelid=164&date=2017-12-10&page=2"
        );
    }

    #[test]
    fn test_channel_id_is_query_encoded() {
        let source = HttpSource::new("https://api.sr.se/api/v2").unwrap();
        let date = NaiveDate::from_ymd_opt(2017, 12, 10).unwrap();
        let url = source.schedule_url("a&b", date, 1).unwrap();
        assert!(url.as_str().contains("channelid=a%26b"));
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        assert!(matches!(HttpSource::new("not a url"), Err(FetchError::InvalidUrl(_))));
        assert!(matches!(HttpSource::new("ftp://api.sr.se/"), Err(FetchError::InvalidUrl(_))));
        assert!(matches!(HttpSource::new("mailto:radio@sr.se"), Err(FetchError::InvalidUrl(_))));
    }

    #[test]
    fn test_backoff_doubles() {
        let source = HttpSource::new(DEFAULT_API_BASE_URL)
            .unwrap()
            .with_retry_base_delay(Duration::from_millis(10));
        assert_eq!(source.backoff(0), Duration::from_millis(10));
        assert_eq!(source.backoff(1), Duration::from_millis(20));
        assert_eq!(source.backoff(3), Duration::from_millis(80));
    }

    #[test]
    fn test_from_config() {
        let config = Config {
            api_base_url: "http://localhost:8080/v2".to_string(),
            request_timeout_secs: 5,
            max_retries: 1,
            ..Config::default()
        };
        let source = HttpSource::from_config(&config).unwrap();
        assert_eq!(source.base_url().as_str(), "http://localhost:8080/v2");
        assert_eq!(source.max_retries, 1);
        assert_eq!(source.request_timeout, Duration::from_secs(5));
    }
}
