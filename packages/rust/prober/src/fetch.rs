//! HTTP plumbing for probes: client construction, SSRF protection and
//! size-capped response reads.

use std::net::IpAddr;
use std::time::Duration;

use dossier_registry::HttpMethod;
use dossier_shared::{DossierError, Result};
use reqwest::Client;
use tracing::debug;
use url::Url;

/// User-Agent string for probe requests.
const USER_AGENT: &str = concat!("Dossier/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client. Timeouts are applied per probe.
pub(crate) fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| DossierError::Network(format!("failed to build HTTP client: {e}")))
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
pub(crate) fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

/// The parts of a response the classifier needs.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub status: u16,
    pub retry_after: Option<Duration>,
    pub body: Option<String>,
}

#[derive(Debug)]
pub(crate) enum FetchError {
    /// Connect or request failure; worth one retry.
    Network(String),
    Timeout,
}

/// Issue one request and read at most `max_body` bytes of the body.
///
/// Bodies are read for GET only and only for statuses the classifier can
/// use (2xx, 404, 410).
pub(crate) async fn fetch(
    client: &Client,
    method: HttpMethod,
    url: &Url,
    max_body: usize,
    timeout: Duration,
) -> std::result::Result<RawResponse, FetchError> {
    let request = match method {
        HttpMethod::Get => client.get(url.as_str()),
        HttpMethod::Head => client.head(url.as_str()),
    };

    let work = async {
        let mut response = request.send().await.map_err(map_error)?;
        let status = response.status().as_u16();
        let retry_after = parse_retry_after(&response);

        let wants_body = method == HttpMethod::Get
            && (response.status().is_success() || matches!(status, 404 | 410));
        let body = if wants_body {
            let mut buf: Vec<u8> = Vec::new();
            while let Some(chunk) = response.chunk().await.map_err(map_error)? {
                let room = max_body.saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
                if buf.len() >= max_body {
                    debug!(%url, max_body, "body truncated");
                    break;
                }
            }
            Some(String::from_utf8_lossy(&buf).into_owned())
        } else {
            None
        };

        Ok::<_, FetchError>(RawResponse {
            status,
            retry_after,
            body,
        })
    };

    match tokio::time::timeout(timeout, work).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout),
    }
}

fn map_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e.to_string())
    }
}

/// Parse the `Retry-After` header as seconds.
fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn ssrf_blocks_private_and_local() {
        for url in [
            "http://127.0.0.1/x",
            "http://10.0.0.5/x",
            "http://192.168.1.1/x",
            "http://169.254.169.254/latest/meta-data",
            "http://[::1]/x",
            "http://localhost:8080/x",
            "http://printer.local/x",
            "file:///etc/passwd",
        ] {
            assert!(is_ssrf_target(&Url::parse(url).unwrap()), "{url} not blocked");
        }
    }

    #[test]
    fn ssrf_allows_public() {
        assert!(!is_ssrf_target(&Url::parse("https://www.instagram.com/jsmith/").unwrap()));
        assert!(!is_ssrf_target(&Url::parse("https://8.8.8.8/").unwrap()));
    }

    #[tokio::test]
    async fn fetch_reads_capped_body_and_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(10_000)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let base = Url::parse(&server.uri()).unwrap();

        let big = fetch(&client, HttpMethod::Get, &base.join("/big").unwrap(), 1024, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(big.status, 200);
        assert_eq!(big.body.unwrap().len(), 1024);

        let limited = fetch(&client, HttpMethod::Get, &base.join("/limited").unwrap(), 1024, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(limited.status, 429);
        assert_eq!(limited.retry_after, Some(Duration::from_secs(7)));
        assert!(limited.body.is_none());
    }

    #[tokio::test]
    async fn fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let result = fetch(&client, HttpMethod::Get, &url, 1024, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(FetchError::Timeout)));
    }

    #[tokio::test]
    async fn connection_refused_is_network_error() {
        let client = build_client().unwrap();
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        let result = fetch(&client, HttpMethod::Get, &url, 1024, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(FetchError::Network(_))));
    }
}
