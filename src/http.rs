//! HTTP fetcher for the track archive and high resolution tracks.
//!
//! Site paths such as `/tracks/0001_highres.gpx` are resolved against a
//! base URL. Connection errors and `429`/`503` responses are retried with
//! exponential backoff; any other non-success status fails the fetch.

use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt};
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};

use crate::surface::Fetch;
use crate::{MapError, Result};

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// [`Fetch`] implementation over a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: String,
}

impl HttpFetcher {
    /// Create a fetcher resolving paths against `base_url`, e.g. `https://example.org`.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn fetch_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.url_for(path);
        let start = Instant::now();
        let mut retries = 0;

        loop {
            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(e) => {
                    retries += 1;
                    if retries > MAX_RETRIES {
                        return Err(e.into());
                    }
                    let wait = backoff(retries);
                    warn!("[HttpFetcher] {}: {}, retry {} after {:?}", url, e, retries, wait);
                    tokio::time::sleep(wait).await;
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
                retries += 1;
                if retries > MAX_RETRIES {
                    return Err(MapError::Fetch(format!("{}: HTTP {} after {} retries", url, status, MAX_RETRIES)));
                }
                let wait = backoff(retries);
                warn!("[HttpFetcher] {}: HTTP {}, retry {} after {:?}", url, status, retries, wait);
                tokio::time::sleep(wait).await;
                continue;
            }
            if !status.is_success() {
                return Err(MapError::Fetch(format!("{}: HTTP {}", url, status)));
            }

            let headers_elapsed = start.elapsed();
            let bytes = response.bytes().await?;
            info!(
                "[HttpFetcher] {} headers={:?} total={:?} ({:.1}KB)",
                url,
                headers_elapsed,
                start.elapsed(),
                bytes.len() as f64 / 1024.0
            );
            return Ok(bytes.to_vec());
        }
    }
}

/// 400ms, 800ms, 1.6s
fn backoff(retry: u32) -> Duration {
    Duration::from_millis(200 * (1 << retry.min(4)))
}

impl Fetch for HttpFetcher {
    fn fetch<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        debug!("[HttpFetcher] GET {}", path);
        self.fetch_bytes(path).boxed()
    }
}
