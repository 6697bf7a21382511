// src/checker/http.rs
// =============================================================================
// Checks whether a single URL is alive by making an HTTP request.
//
// Key functionality:
// - Makes an HTTP HEAD request first (lightweight, no body download)
// - Falls back to GET when the server refuses HEAD (405 / 501)
// - Sorts failures into kinds (404, timeout, TLS, DNS, redirect loop...)
//
// Concurrency is not handled here: the Links plugin's task queue decides how
// many of these run at once.
//
// Rust concepts:
// - Enums with data: Redirect carries the Location header
// - serde attributes: control how the result looks as JSON
// =============================================================================

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// How many redirects we follow before calling it a loop
const MAX_REDIRECTS: usize = 5;

// Represents the status of a link after checking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LinkStatus {
    /// Link is working (2xx)
    Ok,
    /// Link answered with a redirect we didn't follow
    Redirect { location: String },
    /// Link is gone (404, 410)
    Broken,
    /// Request timed out
    Timeout,
    /// SSL/TLS certificate error
    SslError,
    /// Too many redirects (redirect loop)
    TooManyRedirects,
    /// Could not resolve hostname
    DnsError,
    /// Anything else (5xx, connection refused...)
    Error,
}

// The result of checking one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCheckResult {
    pub url: String,
    #[serde(flatten)]
    pub status: LinkStatus,
    /// Human-readable detail ("HTTP 404", "Request timed out"...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LinkCheckResult {
    /// Ok and Redirect both count as a working link
    pub fn is_ok(&self) -> bool {
        matches!(self.status, LinkStatus::Ok | LinkStatus::Redirect { .. })
    }
}

// Builds the HTTP client shared by every link check.
//
// The client is cheap to clone (it's a reference-counted handle), so one
// client serves the whole crawl and keeps connections pooled.
pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
}

// Checks a single link
//
// Parameters:
//   client: shared reqwest client (borrowed)
//   url: the URL to check
pub async fn check_link(client: &Client, url: &Url) -> LinkCheckResult {
    let head = client.head(url.clone()).send().await;

    let result = match head {
        // Some servers don't implement HEAD; ask again with GET
        Ok(response)
            if matches!(
                response.status(),
                StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
            ) =>
        {
            client.get(url.clone()).send().await
        }
        other => other,
    };

    match result {
        Ok(response) => analyze_response(url, response),
        Err(e) => categorize_error(url, e),
    }
}

// Turns an HTTP response into a LinkCheckResult
//
// HTTP status codes:
// - 200-299: Success
// - 300-399: Redirect (only seen when the redirect wasn't followed)
// - 404/410: Broken
// - everything else: Error
fn analyze_response(url: &Url, response: reqwest::Response) -> LinkCheckResult {
    let status_code = response.status();
    let message = Some(format!("HTTP {}", status_code.as_u16()));

    let status = if status_code.is_success() {
        LinkStatus::Ok
    } else if status_code.is_redirection() {
        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        LinkStatus::Redirect { location }
    } else if matches!(status_code, StatusCode::NOT_FOUND | StatusCode::GONE) {
        LinkStatus::Broken
    } else {
        LinkStatus::Error
    };

    LinkCheckResult {
        url: url.to_string(),
        status,
        message,
    }
}

// Sorts a reqwest error into a LinkStatus
fn categorize_error(url: &Url, error: reqwest::Error) -> LinkCheckResult {
    let error_string = error.to_string().to_lowercase();

    let (status, message) = if error.is_timeout() {
        (LinkStatus::Timeout, "Request timed out".to_string())
    } else if error.is_redirect() {
        (LinkStatus::TooManyRedirects, "Too many redirects".to_string())
    } else if error_string.contains("certificate") || error_string.contains("ssl") {
        (LinkStatus::SslError, "SSL certificate error".to_string())
    } else if error.is_connect() && error_string.contains("dns") {
        (LinkStatus::DnsError, "Could not resolve hostname".to_string())
    } else if error.is_connect() {
        (LinkStatus::Error, "Connection failed".to_string())
    } else {
        (LinkStatus::Error, error.to_string())
    };

    LinkCheckResult {
        url: url.to_string(),
        status,
        message: Some(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: LinkStatus) -> LinkCheckResult {
        LinkCheckResult {
            url: "https://example.com".to_string(),
            status,
            message: None,
        }
    }

    #[test]
    fn test_link_result_is_ok() {
        assert!(result(LinkStatus::Ok).is_ok());
        assert!(result(LinkStatus::Redirect {
            location: "https://example.org".to_string()
        }).is_ok());
        assert!(!result(LinkStatus::Broken).is_ok());
        assert!(!result(LinkStatus::Timeout).is_ok());
    }

    #[test]
    fn test_result_json_is_flat() {
        let json = serde_json::to_value(result(LinkStatus::Broken)).unwrap();
        assert_eq!(json["status"], "broken");
        assert_eq!(json["url"], "https://example.com");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_client_builds() {
        assert!(build_client(Duration::from_secs(1)).is_ok());
    }
}
