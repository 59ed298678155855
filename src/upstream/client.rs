//! HTTP client for the closed set of upstream JSON endpoints (spec.md §4.1).
//!
//! Built on a shared `reqwest::Client` for connection pooling, the way the
//! teacher's `DomeRestClient::new` configures keep-alive and idle-per-host
//! limits. Read-only: the only verb is `GET`. Retry/backoff, the per-host
//! circuit breaker and the per-host token bucket are orthogonal concerns
//! composed here rather than duplicated per call site.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ErrorKind, ToolError};

use super::circuit_breaker::{Admission, CircuitBreaker};
use super::rate_limit::TokenBucket;

/// How failures are classified (spec.md §4.1 Failure classification).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    Permanent,
    RateLimited,
    Parse,
    Network,
}

struct HostState {
    breaker: CircuitBreaker,
    bucket: TokenBucket,
}

pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    hosts: RwLock<HashMap<String, Arc<HostState>>>,
}

fn host_key(base_url: &str) -> String {
    base_url
        .split("://")
        .nth(1)
        .unwrap_or(base_url)
        .split('/')
        .next()
        .unwrap_or(base_url)
        .to_string()
}

impl UpstreamClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent_contact.clone())
            .pool_max_idle_per_host(4)
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(crate::config::DEFAULT_UPSTREAM_TIMEOUT)
            .build()
            .expect("building the upstream reqwest client");

        Self {
            http,
            base_url: config.upstream_base_url.clone(),
            hosts: RwLock::new(HashMap::new()),
        }
    }

    fn host_state(&self) -> Arc<HostState> {
        let key = host_key(&self.base_url);
        if let Some(state) = self.hosts.read().get(&key) {
            return state.clone();
        }
        let mut hosts = self.hosts.write();
        hosts
            .entry(key)
            .or_insert_with(|| {
                Arc::new(HostState {
                    breaker: CircuitBreaker::new(),
                    bucket: TokenBucket::new(),
                })
            })
            .clone()
    }

    /// Issue one `GET`, with retry/backoff, circuit breaking and rate
    /// limiting applied. `timeout` overrides the per-call deadline
    /// (spec.md §5: 10s default, 30s for galaxy-wide bulk endpoints).
    pub async fn get(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Vec<u8>, ToolError> {
        self.get_with_headers(endpoint, query, timeout)
            .await
            .map(|(bytes, _headers)| bytes)
    }

    /// Same retry/backoff/circuit-breaker/rate-limit machinery as [`Self::get`],
    /// but also hands back the response headers so `get_paginated`'s cursor
    /// discovery doesn't need a second request just to inspect them.
    async fn get_with_headers(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<(Vec<u8>, HeaderMap), ToolError> {
        let host = self.host_state();
        let host_key = host_key(&self.base_url);

        let admission = host.breaker.admit();
        if admission == Admission::Reject {
            return Err(ToolError::source_unavailable(&host_key));
        }

        let url = format!("{}{}", self.base_url, endpoint);
        let mut retries_used = 0u32;
        let mut transient_retries = 0u32;
        let mut backoff = Duration::from_secs(1);
        const RETRY_BUDGET: u32 = 3;
        const MAX_TRANSIENT_RETRIES: u32 = 2;

        loop {
            let wait = host.bucket.acquire_wait();
            if wait > Duration::ZERO {
                tokio::time::sleep(wait).await;
            }

            let request = self.http.get(&url).query(query);
            let attempt = tokio::time::timeout(timeout, request.send()).await;

            let outcome: Result<(Vec<u8>, HeaderMap), (FailureKind, Option<StatusCode>)> = match attempt {
                Err(_elapsed) => Err((FailureKind::Network, None)),
                Ok(Err(e)) => Err((FailureKind::Network, e.status())),
                Ok(Ok(response)) => {
                    let status = response.status();
                    if status.is_success() {
                        let headers = response.headers().clone();
                        match response.bytes().await {
                            Ok(bytes) => Ok((bytes.to_vec(), headers)),
                            Err(_) => Err((FailureKind::Parse, Some(status))),
                        }
                    } else if status == StatusCode::TOO_MANY_REQUESTS {
                        Err((FailureKind::RateLimited, Some(status)))
                    } else if status.is_server_error() {
                        Err((FailureKind::Transient, Some(status)))
                    } else {
                        Err((FailureKind::Permanent, Some(status)))
                    }
                }
            };

            match outcome {
                Ok((bytes, headers)) => {
                    host.breaker.record_success();
                    return Ok((bytes, headers));
                }
                Err((FailureKind::RateLimited, status)) => {
                    if retries_used >= RETRY_BUDGET {
                        return Err(ToolError::rate_limited(backoff.as_secs()));
                    }
                    debug!(host = %host_key, status = ?status, "upstream rate-limited, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    retries_used += 1;
                    continue;
                }
                Err((FailureKind::Permanent, status)) => {
                    return Err(ToolError::new(
                        ErrorKind::SourceUnavailable,
                        format!("upstream returned a non-retryable error ({status:?})"),
                    ));
                }
                Err((FailureKind::Parse, _)) => {
                    return Err(ToolError::internal("failed to read upstream response body"));
                }
                Err((kind @ (FailureKind::Transient | FailureKind::Network), status)) => {
                    if admission == Admission::Probe {
                        host.breaker.record_failure();
                        return Err(ToolError::source_unavailable(&host_key));
                    }
                    if retries_used >= RETRY_BUDGET
                        || (kind == FailureKind::Transient && transient_retries >= MAX_TRANSIENT_RETRIES)
                    {
                        host.breaker.record_failure();
                        warn!(host = %host_key, status = ?status, "upstream call exhausted retries");
                        return Err(ToolError::source_unavailable(&host_key));
                    }
                    let jitter = if kind == FailureKind::Network {
                        Duration::from_millis(fastrand_jitter_ms())
                    } else {
                        Duration::ZERO
                    };
                    tokio::time::sleep(backoff + jitter).await;
                    backoff *= 2;
                    retries_used += 1;
                    if kind == FailureKind::Transient {
                        transient_retries += 1;
                    }
                    continue;
                }
            }
        }
    }

    /// Fetch every page of a paginated endpoint. Pagination discovery tries
    /// a cursor header first, falling back to 1-based page numbers if no
    /// cursor is present on the first response (spec.md §6).
    pub async fn get_paginated(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Vec<Vec<u8>>, ToolError> {
        let mut pages = Vec::new();
        let (first_bytes, first_headers) = self.get_with_headers(endpoint, query, timeout).await?;
        let mut cursor = next_cursor(&first_headers);
        pages.push(first_bytes);

        if cursor.is_some() {
            while let Some(token) = cursor.take() {
                if pages.len() > 500 {
                    break;
                }
                let mut q: Vec<(&str, &str)> = query.to_vec();
                q.push((CURSOR_PARAM, &token));
                match self.get_with_headers(endpoint, &q, timeout).await {
                    Ok((bytes, headers)) if bytes.as_slice() != b"[]" && !bytes.is_empty() => {
                        cursor = next_cursor(&headers);
                        pages.push(bytes);
                    }
                    _ => break,
                }
            }
            return Ok(pages);
        }

        // No cursor on the first response: the upstream contract falls back
        // to a 1-based page-number walk (spec.md §6), keeping pages while the
        // body is non-empty and distinct from an explicit empty-page
        // sentinel (`[]`), capped defensively against a misbehaving upstream.
        let mut page = 2u32;
        loop {
            if page > 500 {
                break;
            }
            let mut q: Vec<(&str, &str)> = query.to_vec();
            let page_str = page.to_string();
            q.push(("page", &page_str));
            match self.get(endpoint, &q, timeout).await {
                Ok(bytes) if bytes.as_slice() != b"[]" && !bytes.is_empty() => {
                    pages.push(bytes);
                    page += 1;
                }
                _ => break,
            }
        }
        Ok(pages)
    }
}

const CURSOR_HEADER: &str = "x-pagination-cursor";
const CURSOR_PARAM: &str = "cursor";

fn next_cursor(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CURSOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn fastrand_jitter_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 250) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_key_strips_scheme_and_path() {
        assert_eq!(host_key("https://esi.example.com/v1"), "esi.example.com");
        assert_eq!(host_key("http://localhost:8080"), "localhost:8080");
    }
}
