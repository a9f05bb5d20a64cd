//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester:
//! - Building the shared client (timeout, proxy, user agent)
//! - GET requests for pages and images
//! - Separating bad status codes from transport failures

use crate::config::HttpConfig;
use reqwest::{Client, Proxy};

/// Result of a request that reached the server
///
/// Transport failures (DNS, refused connection, timeout, broken body) are
/// returned as `Err(reqwest::Error)` by [`fetch_url`] instead.
#[derive(Debug)]
pub enum FetchResult {
    /// 2xx response with its body
    Success {
        /// Raw response body
        body: Vec<u8>,
    },

    /// Any non-2xx response
    HttpError {
        /// HTTP status code
        status_code: u16,
    },
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - Timeout, optional proxy and optional user agent
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::config::HttpConfig;
/// use sumi_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(config.timeout())
        .gzip(true)
        .brotli(true);

    if let Some(user_agent) = &config.user_agent {
        builder = builder.user_agent(user_agent.as_str());
    }

    if let Some(proxy) = &config.proxy {
        // The proxy only applies to traffic of its own scheme
        let proxy = match proxy.scheme.as_str() {
            "https" => Proxy::https(proxy.url())?,
            _ => Proxy::http(proxy.url())?,
        };
        builder = builder.proxy(proxy);
    }

    builder.build()
}

/// Fetches a URL and reads the body of successful responses
pub async fn fetch_url(client: &Client, url: &str) -> Result<FetchResult, reqwest::Error> {
    let response = client.get(url).send().await?;
    let status = response.status();

    if !status.is_success() {
        return Ok(FetchResult::HttpError {
            status_code: status.as_u16(),
        });
    }

    let body = response.bytes().await?;
    Ok(FetchResult::Success { body: body.to_vec() })
}
