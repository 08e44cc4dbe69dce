use crate::governor::{RateBudget, RateCheck};
use crate::types::{ForgeIssue, ForgeLabel, RateLimitResponse};
use chrono::Utc;
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// Labels page size. One page suffices in practice; paging is still honoured.
const LABELS_PER_PAGE: u32 = 1000;

/// Errors surfaced by the forge client.
#[derive(Debug)]
pub enum ForgeError {
    /// Network or transport failure.
    Transport(String),
    /// The forge returned a non-success status.
    Api { status: u16, message: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// Token resolution failed.
    Config(String),
    /// The rate budget could not be satisfied inside the operator ceiling.
    Budget(String),
}

impl ForgeError {
    /// Rate-limit hits, the abuse heuristic, and server errors are worth a
    /// bounded retry; everything else is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, ForgeError::Api { status, .. } if *status == 403 || *status == 429 || *status >= 500)
    }

    /// The issue vanished from the forge (deleted or transferred).
    pub fn is_not_found(&self) -> bool {
        matches!(self, ForgeError::Api { status: 404, .. })
    }
}

impl fmt::Display for ForgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForgeError::Transport(msg) => write!(f, "transport error: {msg}"),
            ForgeError::Api { status, message } => {
                write!(f, "forge api error status={status}: {message}")
            }
            ForgeError::Decode(msg) => write!(f, "decode error: {msg}"),
            ForgeError::Config(msg) => write!(f, "config error: {msg}"),
            ForgeError::Budget(msg) => write!(f, "rate budget error: {msg}"),
        }
    }
}

impl std::error::Error for ForgeError {}

/// Resolve the configured OAuth value into an optional bearer token.
///
/// The literal `-` selects anonymous access; a value containing `/` is a
/// filesystem path holding the token; anything else is the token itself.
pub fn resolve_token(raw: &str) -> Result<Option<String>, ForgeError> {
    if raw == "-" {
        return Ok(None);
    }
    if raw.contains('/') {
        let contents = std::fs::read_to_string(raw)
            .map_err(|e| ForgeError::Config(format!("token file {raw}: {e}")))?;
        let token = contents.trim().to_string();
        if token.is_empty() {
            return Err(ForgeError::Config(format!("token file {raw} is empty")));
        }
        return Ok(Some(token));
    }
    Ok(Some(raw.to_string()))
}

/// Authenticated or anonymous client for the forge's HTTP API.
///
/// Internally safe for concurrent use; the fetch stage shares one instance
/// across all tasks. Deliberately not `Debug`: the token must never reach a
/// log line.
#[derive(Clone)]
pub struct ForgeClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl ForgeClient {
    pub fn new(base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base.trim_end_matches('/'), path)
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, "fmr-reconciler")
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, ForgeError> {
        let resp = self
            .request(url)
            .send()
            .await
            .map_err(|e| ForgeError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or_else(|| status.to_string());
            return Err(ForgeError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }

    /// Fetch one issue's authoritative record.
    pub async fn get_issue(
        &self,
        owner: &str,
        repo: &str,
        number: i32,
    ) -> Result<ForgeIssue, ForgeError> {
        let url = self.url(&format!("/repos/{owner}/{repo}/issues/{number}"));
        let resp = self.send(&url).await?;
        resp.json::<ForgeIssue>()
            .await
            .map_err(|e| ForgeError::Decode(e.to_string()))
    }

    /// Fetch one page of an issue's labels. Returns the labels and the next
    /// page number when the forge reports one.
    pub async fn list_labels(
        &self,
        owner: &str,
        repo: &str,
        number: i32,
        page: u32,
    ) -> Result<(Vec<ForgeLabel>, Option<u32>), ForgeError> {
        let url = self.url(&format!(
            "/repos/{owner}/{repo}/issues/{number}/labels?per_page={LABELS_PER_PAGE}&page={page}"
        ));
        let resp = self.send(&url).await?;
        let next = resp
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_page);
        let labels = resp
            .json::<Vec<ForgeLabel>>()
            .await
            .map_err(|e| ForgeError::Decode(e.to_string()))?;
        Ok((labels, next))
    }

    /// Probe the declared core-API budget.
    pub async fn rate_limit(&self) -> Result<RateCheck, ForgeError> {
        let url = self.url("/rate_limit");
        let resp = self.send(&url).await?;
        let body = resp
            .json::<RateLimitResponse>()
            .await
            .map_err(|e| ForgeError::Decode(e.to_string()))?;
        let until_reset = (body.resources.core.reset - Utc::now().timestamp()).max(0) as u64;
        Ok(RateCheck {
            remaining: body.resources.core.remaining,
            // One extra second of safety margin past the declared reset.
            wait: Duration::from_secs(until_reset + 1),
        })
    }
}

#[async_trait::async_trait]
impl RateBudget for ForgeClient {
    async fn check(&self) -> RateCheck {
        match self.rate_limit().await {
            Ok(check) => check,
            Err(err) => {
                // A failed probe is itself usually a transient; degrade to a
                // short pause and let the governor loop re-probe.
                warn!("rate-limit probe failed: {err}");
                RateCheck {
                    remaining: -1,
                    wait: Duration::from_secs(5),
                }
            }
        }
    }
}

/// Extract the `page` number of the `rel="next"` target from an RFC-5988
/// `Link` header.
fn parse_next_page(link: &str) -> Option<u32> {
    for part in link.split(',') {
        let part = part.trim();
        if !part.contains("rel=\"next\"") {
            continue;
        }
        let url = part.strip_prefix('<')?.split('>').next()?;
        for pair in url.split('?').nth(1)?.split('&') {
            if let Some(page) = pair.strip_prefix("page=") {
                return page.parse().ok();
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_next_page_reads_the_next_relation() {
        let link = "<https://api.github.com/repos/a/b/issues/1/labels?per_page=1000&page=2>; rel=\"next\", <https://api.github.com/repos/a/b/issues/1/labels?per_page=1000&page=4>; rel=\"last\"";
        assert_eq!(parse_next_page(link), Some(2));
    }

    #[test]
    fn parse_next_page_without_next_is_none() {
        let link = "<https://api.github.com/x?page=4>; rel=\"last\"";
        assert_eq!(parse_next_page(link), None);
        assert_eq!(parse_next_page(""), None);
    }

    #[test]
    fn transient_classification_matches_the_abuse_heuristic() {
        let abuse = ForgeError::Api {
            status: 403,
            message: "abuse detection mechanism".to_string(),
        };
        assert!(abuse.is_transient());
        let server = ForgeError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert!(server.is_transient());
        let missing = ForgeError::Api {
            status: 404,
            message: "not found".to_string(),
        };
        assert!(!missing.is_transient());
        assert!(!ForgeError::Decode("x".to_string()).is_transient());
    }
}
