// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Retrieval of raw sample bytes from HTTP or the local filesystem.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("unable to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request for {location} failed: {source}")]
    Http {
        location: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{location} returned status {status}")]
    Status {
        location: String,
        status: reqwest::StatusCode,
    },

    #[error("unable to read {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
}

/// Produces the raw bytes stored at a location.
pub trait Fetch: Send + Sync + 'static {
    fn fetch(&self, location: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Fetches over HTTP(S). Non-success statuses are failures.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<HttpFetcher, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(HttpFetcher { client })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        let http_error = |source| FetchError::Http {
            location: location.to_string(),
            source,
        };

        let response = self.client.get(location).send().await.map_err(http_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                location: location.to_string(),
                status,
            });
        }

        let bytes = response.bytes().await.map_err(http_error)?;
        debug!(location, bytes = bytes.len(), "Fetched sample");
        Ok(bytes.to_vec())
    }
}

/// Reads from the local filesystem. A `file://` prefix is accepted.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileFetcher;

impl Fetch for FileFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        let path = location.strip_prefix("file://").unwrap_or(location);
        let bytes = tokio::fs::read(path).await.map_err(|source| FetchError::Io {
            location: location.to_string(),
            source,
        })?;
        debug!(location, bytes = bytes.len(), "Read sample");
        Ok(bytes)
    }
}

/// The fetcher matching a location template.
#[derive(Clone, Debug)]
pub enum Fetcher {
    Http(HttpFetcher),
    File(FileFetcher),
}

impl Fetcher {
    /// HTTP for `http://` and `https://` templates, the filesystem otherwise.
    pub fn for_template(template: &str, timeout: Duration) -> Result<Fetcher, FetchError> {
        if template.starts_with("http://") || template.starts_with("https://") {
            Ok(Fetcher::Http(HttpFetcher::new(timeout)?))
        } else {
            Ok(Fetcher::File(FileFetcher))
        }
    }
}

impl Fetch for Fetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        match self {
            Fetcher::Http(fetcher) => fetcher.fetch(location).await,
            Fetcher::File(fetcher) => fetcher.fetch(location).await,
        }
    }
}
