//! Webpage fetcher with SSRF protection
//!
//! Single GET per call: fixed timeout, bounded redirect chain, capped body,
//! and blocking of private/internal destinations unless explicitly allowed.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use reqwest::redirect::Policy;
use reqwest::{Client, Url};

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::{Error, Result};

/// `<meta charset=...>` or `<meta http-equiv content="...; charset=...">`
static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([a-z0-9_\-:.]+)"#).expect("valid regex")
});

/// Bytes inspected when sniffing a `<meta>` charset
const META_SNIFF_BYTES: usize = 1024;

/// A fetched webpage
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP status code
    pub status: u16,
    /// Final URL after any redirects
    pub url: String,
    /// `Content-Type` header value (empty if absent)
    pub content_type: String,
    /// Raw body bytes, at most `max_body_bytes`
    pub body: Vec<u8>,
    /// Whether the body was cut at the size cap
    pub body_truncated: bool,
}

impl FetchedPage {
    /// Decode the body to text, never failing on bad bytes
    #[must_use]
    pub fn text(&self) -> String {
        decode_body(&self.body, &self.content_type)
    }

    /// Whether the body should go through HTML extraction
    #[must_use]
    pub fn is_html(&self) -> bool {
        let ct = self.content_type.to_ascii_lowercase();
        if ct.is_empty() {
            return true;
        }
        ct.contains("text/html") || ct.contains("application/xhtml")
    }

    /// Whether the status is 2xx
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Webpage fetcher
///
/// Holds one pooled client for the process; every call is an independent GET.
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a fetcher with the given limits
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(redirect_policy(config.max_redirects, config.allow_private_addresses))
            .user_agent(concat!("Mozilla/5.0 (compatible; search-gateway/", env!("CARGO_PKG_VERSION"), ")"))
            .build()
            .map_err(|e| Error::Config(format!("failed to build fetch client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Fetch a URL
    ///
    /// Validates the scheme and, unless private addresses are allowed,
    /// resolves the host and rejects private/internal targets before any
    /// request is sent.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - URL is not absolute or its scheme is not http/https
    /// - Hostname resolves to a blocked IP address
    /// - The request exceeds the timeout or the redirect limit
    /// - Any other transport failure occurs
    pub async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, FetchError> {
        // One deadline covers resolution, request and body
        tokio::time::timeout(self.config.timeout, self.fetch_inner(url))
            .await
            .map_err(|_| FetchError::Timeout)?
    }

    async fn fetch_inner(&self, url: &str) -> std::result::Result<FetchedPage, FetchError> {
        let parsed = validate_url(url)?;

        if !self.config.allow_private_addresses {
            check_ssrf(&parsed).await?;
        }

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| self.map_error(&e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let limit = self.config.max_body_bytes;
        let mut body = Vec::new();
        let mut body_truncated = false;
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_error(&e))? {
            let remaining = limit.saturating_sub(body.len());
            if chunk.len() > remaining {
                body.extend_from_slice(&chunk[..remaining]);
                body_truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }

        if body_truncated {
            tracing::debug!(url = %final_url, limit, "response body cut at size limit");
        }

        Ok(FetchedPage {
            status,
            url: final_url,
            content_type,
            body,
            body_truncated,
        })
    }

    fn map_error(&self, e: &reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_redirect() {
            FetchError::TooManyRedirects(self.config.max_redirects)
        } else {
            FetchError::Network(e.to_string())
        }
    }

    /// Check if an IP address is private or otherwise blocked
    ///
    /// Blocks the following ranges:
    /// - IPv4: 127.0.0.0/8 (loopback), 10.0.0.0/8, 172.16.0.0/12,
    ///   192.168.0.0/16 (private), 169.254.0.0/16 (link-local),
    ///   100.64.0.0/10 (carrier-grade NAT), 0.0.0.0/8 (current network)
    /// - IPv6: `::1` (loopback), `::` (unspecified), `fc00::/7` (unique local),
    ///   `fe80::/10` (link-local), IPv4-mapped forms of the above
    #[must_use]
    pub fn is_blocked_ip(ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(ipv4) => is_blocked_ipv4(ipv4),
            IpAddr::V6(ipv6) => is_blocked_ipv6(ipv6),
        }
    }
}

/// Parse and validate a fetch target
fn validate_url(url: &str) -> std::result::Result<Url, FetchError> {
    let parsed = Url::parse(url.trim()).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(FetchError::InvalidScheme(scheme.to_string()));
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(FetchError::InvalidUrl(format!("{url}: URL has no host")));
    }

    Ok(parsed)
}

/// Redirect policy: hop limit, scheme check, no redirects to literal private IPs
fn redirect_policy(max_redirects: usize, allow_private: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max_redirects {
            return attempt.error(FetchError::TooManyRedirects(max_redirects));
        }

        let next = attempt.url();
        if next.scheme() != "http" && next.scheme() != "https" {
            tracing::warn!(url = %next, "refusing redirect to non-http scheme");
            return attempt.stop();
        }

        if !allow_private
            && let Some(ip) = literal_ip(next)
            && HttpFetcher::is_blocked_ip(ip)
        {
            tracing::warn!(url = %next, "refusing redirect to private address");
            return attempt.stop();
        }

        attempt.follow()
    })
}

fn literal_ip(url: &Url) -> Option<IpAddr> {
    match url.host()? {
        url::Host::Ipv4(v4) => Some(IpAddr::V4(v4)),
        url::Host::Ipv6(v6) => Some(IpAddr::V6(v6)),
        url::Host::Domain(d) if d.eq_ignore_ascii_case("localhost") => {
            Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
        }
        url::Host::Domain(_) => None,
    }
}

/// Resolve the host and fail if any address is blocked
async fn check_ssrf(url: &Url) -> std::result::Result<(), FetchError> {
    let host = url.host_str().unwrap_or_default().to_string();

    if let Some(ip) = literal_ip(url) {
        return if HttpFetcher::is_blocked_ip(ip) {
            Err(FetchError::Blocked { host, ip })
        } else {
            Ok(())
        };
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let addrs: Vec<_> = tokio::net::lookup_host((host.as_str(), port))
        .await
        .map_err(|e| FetchError::Network(format!("failed to resolve hostname {host}: {e}")))?
        .collect();

    if let Some(addr) = addrs.iter().find(|a| HttpFetcher::is_blocked_ip(a.ip())) {
        return Err(FetchError::Blocked { host, ip: addr.ip() });
    }

    Ok(())
}

fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();

    // 0.0.0.0/8 - current network
    if octets[0] == 0 {
        return true;
    }

    // 127.0.0.0/8 - loopback
    if octets[0] == 127 {
        return true;
    }

    // 10.0.0.0/8 - private
    if octets[0] == 10 {
        return true;
    }

    // 172.16.0.0/12 - private (172.16.x.x - 172.31.x.x)
    if octets[0] == 172 && (16..=31).contains(&octets[1]) {
        return true;
    }

    // 192.168.0.0/16 - private
    if octets[0] == 192 && octets[1] == 168 {
        return true;
    }

    // 169.254.0.0/16 - link-local
    if octets[0] == 169 && octets[1] == 254 {
        return true;
    }

    // 100.64.0.0/10 - carrier-grade NAT
    if octets[0] == 100 && (64..=127).contains(&octets[1]) {
        return true;
    }

    false
}

fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }

    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_blocked_ipv4(v4);
    }

    let segments = ip.segments();

    // fc00::/7 - unique local addresses (fc00:: - fdff::)
    let first_byte = (segments[0] >> 8) as u8;
    if first_byte == 0xfc || first_byte == 0xfd {
        return true;
    }

    // fe80::/10 - link-local addresses
    segments[0] & 0xffc0 == 0xfe80
}

/// Decode a body using the declared or sniffed charset, UTF-8 otherwise
///
/// Invalid sequences become U+FFFD.
#[must_use]
pub fn decode_body(body: &[u8], content_type: &str) -> String {
    let encoding = charset_from_content_type(content_type)
        .or_else(|| sniff_meta_charset(body))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);

    let (text, used, had_errors) = encoding.decode(body);
    if had_errors {
        tracing::debug!(encoding = used.name(), "replaced invalid byte sequences while decoding");
    }
    text.into_owned()
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']).to_string())
            .filter(|v| !v.is_empty())
    })
}

fn sniff_meta_charset(body: &[u8]) -> Option<String> {
    let head = &body[..body.len().min(META_SNIFF_BYTES)];
    let head = String::from_utf8_lossy(head);
    META_CHARSET
        .captures(&head)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
