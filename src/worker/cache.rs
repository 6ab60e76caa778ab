use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::Mutex;

/// A stored response, keyed by request path under a version tag
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Versioned key-value response cache. Each worker version owns one tag;
/// activating a new version purges every other tag.
#[derive(Default)]
pub struct VersionedCache {
    inner: Mutex<HashMap<String, HashMap<String, CachedResponse>>>,
}

impl VersionedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, version: &str, key: &str, response: CachedResponse) {
        self.inner
            .lock()
            .await
            .entry(version.to_string())
            .or_default()
            .insert(key.to_string(), response);
    }

    pub async fn get(&self, version: &str, key: &str) -> Option<CachedResponse> {
        self.inner
            .lock()
            .await
            .get(version)
            .and_then(|entries| entries.get(key))
            .cloned()
    }

    pub async fn versions(&self) -> Vec<String> {
        self.inner.lock().await.keys().cloned().collect()
    }

    pub async fn entry_count(&self, version: &str) -> usize {
        self.inner
            .lock()
            .await
            .get(version)
            .map_or(0, HashMap::len)
    }

    /// Deletes every cached version except `keep`; returns the purged tags
    pub async fn purge_except(&self, keep: &str) -> Vec<String> {
        let mut inner = self.inner.lock().await;
        let stale: Vec<String> = inner.keys().filter(|v| *v != keep).cloned().collect();
        for tag in &stale {
            inner.remove(tag);
        }
        stale
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable and no cached response: {0}")]
    Offline(String),

    #[error("request failed: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Network,
    Cache,
}

#[derive(Debug)]
pub struct FetchResult {
    pub source: FetchSource,
    pub response: CachedResponse,
}

/// True when the request must always go to the network: non-read
/// methods and API paths are never served from or written to the cache.
pub fn bypasses_cache(method: &str, path: &str) -> bool {
    let is_read = method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("HEAD");
    !is_read || path.starts_with("/api/")
}

/// Network-first fetcher for navigable pages: live responses are cloned
/// into the versioned cache; on network failure the cached copy, if any,
/// is served instead.
pub struct PageFetcher {
    client: reqwest::Client,
    origin: String,
    version: String,
}

impl PageFetcher {
    pub fn new(origin: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            origin: origin.into(),
            version: version.into(),
        }
    }

    pub async fn fetch(
        &self,
        cache: &VersionedCache,
        method: &str,
        path: &str,
    ) -> Result<FetchResult, FetchError> {
        let url = format!("{}{}", self.origin, path);

        if bypasses_cache(method, path) {
            let method = reqwest::Method::from_bytes(method.as_bytes())
                .map_err(|_| FetchError::Network(format!("invalid method: {method}")))?;
            let response = self
                .client
                .request(method, &url)
                .send()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;
            return Ok(FetchResult {
                source: FetchSource::Network,
                response: into_cached(response).await?,
            });
        }

        match self.client.get(&url).send().await {
            Ok(response) => {
                let cached = into_cached(response).await?;
                // Successful responses are cloned into the cache for
                // offline fallback; errors are not worth replaying.
                if cached.status < 400 {
                    cache.put(&self.version, path, cached.clone()).await;
                }
                Ok(FetchResult {
                    source: FetchSource::Network,
                    response: cached,
                })
            }
            Err(e) => match cache.get(&self.version, path).await {
                Some(response) => {
                    tracing::debug!(path, "Network fetch failed, serving cached response");
                    Ok(FetchResult {
                        source: FetchSource::Cache,
                        response,
                    })
                }
                None => Err(FetchError::Offline(e.to_string())),
            },
        }
    }

    /// Fetches an asset and stores it under this fetcher's version tag.
    /// Used during install to pre-populate the cache.
    pub async fn precache(&self, cache: &VersionedCache, path: &str) -> Result<(), FetchError> {
        let url = format!("{}{}", self.origin, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let cached = into_cached(response).await?;
        if cached.status >= 400 {
            return Err(FetchError::Network(format!(
                "precache of {path} answered {}",
                cached.status
            )));
        }
        cache.put(&self.version, path, cached).await;
        Ok(())
    }
}

async fn into_cached(response: reqwest::Response) -> Result<CachedResponse, FetchError> {
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?
        .to_vec();

    Ok(CachedResponse {
        status,
        content_type,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(body: &str) -> CachedResponse {
        CachedResponse {
            status: 200,
            content_type: Some("text/html".to_string()),
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn purge_keeps_only_current_version() {
        let cache = VersionedCache::new();
        cache.put("v1", "/", resp("old")).await;
        cache.put("v1", "/about", resp("old-about")).await;
        cache.put("v2", "/", resp("new")).await;

        let mut purged = cache.purge_except("v2").await;
        purged.sort();
        assert_eq!(purged, vec!["v1".to_string()]);

        assert_eq!(cache.get("v1", "/").await, None);
        assert_eq!(cache.get("v2", "/").await, Some(resp("new")));
        assert_eq!(cache.versions().await, vec!["v2".to_string()]);
    }

    #[test]
    fn bypass_rules() {
        assert!(!bypasses_cache("GET", "/"));
        assert!(!bypasses_cache("HEAD", "/about"));
        assert!(bypasses_cache("POST", "/"));
        assert!(bypasses_cache("GET", "/api/rentals/reserve"));
        assert!(bypasses_cache("DELETE", "/api/rentals/1"));
    }
}
