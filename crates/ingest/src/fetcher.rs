use std::time::Duration;

use kb_core::config::FetchConfig;
use kb_core::error::FetchError;
use reqwest::{redirect::Policy, Client, StatusCode};
use tracing::warn;

const REDIRECT_STATUSES: &[StatusCode] = &[
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::SEE_OTHER,
    StatusCode::TEMPORARY_REDIRECT,
    StatusCode::PERMANENT_REDIRECT,
];
const MAX_REDIRECTS: usize = 10;

/// The result of fetching one URL.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub final_url: String,
    pub redirected: bool,
    pub size_bytes: u64,
}

pub struct Fetcher {
    client: Client,
    max_bytes: u64,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Self {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(Policy::none())
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            max_bytes: config.max_bytes,
        }
    }

    /// Fetch `url`, resolving redirects via an explicit HEAD probe so the
    /// caller learns whether the source was served directly.
    pub async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        let (final_url, redirected) = self.resolve_redirects(url).await?;

        let response = self.client.get(&final_url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: final_url.clone() }
            } else {
                FetchError::Unreachable {
                    url: final_url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: final_url,
                status: status.as_u16(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(FetchError::Oversized {
                    url: final_url,
                    size_bytes: len,
                    cap_bytes: self.max_bytes,
                });
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response.bytes().await.map_err(|e| FetchError::Unreachable {
            url: final_url.clone(),
            reason: e.to_string(),
        })?;

        if bytes.len() as u64 > self.max_bytes {
            return Err(FetchError::Oversized {
                url: final_url,
                size_bytes: bytes.len() as u64,
                cap_bytes: self.max_bytes,
            });
        }

        Ok(FetchedDocument {
            size_bytes: bytes.len() as u64,
            bytes: bytes.to_vec(),
            content_type,
            final_url,
            redirected,
        })
    }

    async fn resolve_redirects(&self, url: &str) -> Result<(String, bool), FetchError> {
        let mut current = url.to_string();
        let mut redirected = false;
        for _ in 0..MAX_REDIRECTS {
            let response = self.client.head(&current).send().await.map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout { url: current.clone() }
                } else {
                    FetchError::Unreachable {
                        url: current.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;
            let status = response.status();
            if REDIRECT_STATUSES.contains(&status) {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_string());
                match location {
                    Some(next) => {
                        redirected = true;
                        current = resolve_location(&current, &next);
                        continue;
                    }
                    None => {
                        warn!(url = %current, "redirect status with no Location header");
                        return Ok((current, redirected));
                    }
                }
            }
            return Ok((current, redirected));
        }
        Err(FetchError::Unreachable {
            url: current,
            reason: "too many redirects".to_string(),
        })
    }
}

fn resolve_location(base: &str, location: &str) -> String {
    reqwest::Url::parse(base)
        .and_then(|b| b.join(location))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| location.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_location_resolves_against_base() {
        let resolved = resolve_location("https://example.com/a/b.html", "/c.html");
        assert_eq!(resolved, "https://example.com/c.html");
    }

    #[test]
    fn absolute_location_is_used_as_is() {
        let resolved = resolve_location("https://example.com/a.html", "https://other.com/x.html");
        assert_eq!(resolved, "https://other.com/x.html");
    }
}
