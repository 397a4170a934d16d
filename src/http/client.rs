//! HTTP client with scope enforcement and explicit per-request cookies

use crate::core::config::ScanConfig;
use crate::core::error::{ScanError, ScanResult};
use crate::core::scope::Scope;
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use reqwest::{header, redirect::Policy, Client, Proxy};
use std::collections::HashMap;
use std::time::Instant;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const MAX_REDIRECTS: usize = 5;

/// Shared by every probe task. The underlying client has no cookie store:
/// base cookies and injected cookies are rendered into the `Cookie` header
/// of each request, so concurrent cookie probes never share mutable state.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    scope: Scope,
    default_headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
}

impl HttpClient {
    pub fn new(config: &ScanConfig) -> ScanResult<Self> {
        let scope = Scope::new(&config.target)?;
        let redirect_scope = scope.clone();

        let mut builder = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(config.timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .redirect(Policy::custom(move |attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS
                    || !redirect_scope.is_in_scope(attempt.url())
                {
                    attempt.stop()
                } else {
                    attempt.follow()
                }
            }));

        if let Some(ref proxy) = config.proxy {
            let proxy = Proxy::all(proxy.as_str())
                .map_err(|e| ScanError::Config(format!("invalid proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ScanError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            scope,
            default_headers: config.headers.clone(),
            cookies: config.cookies.clone(),
        })
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn base_cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    /// Base cookies overlaid with the request's own, rendered as one header.
    fn cookie_header(&self, req: &HttpRequest) -> Option<String> {
        let mut merged: Vec<(&str, &str)> = self
            .cookies
            .iter()
            .filter(|(name, _)| !req.cookies.iter().any(|(n, _)| n == name))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        merged.extend(req.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        if merged.is_empty() {
            return None;
        }

        Some(
            merged
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub async fn execute(&self, req: HttpRequest) -> ScanResult<HttpResponse> {
        if !self.scope.is_in_scope(&req.url) {
            return Err(ScanError::OutOfScope(req.url.to_string()));
        }

        let start = Instant::now();

        let mut request = self.client.request(req.method.clone(), req.url.clone());

        for (key, value) in &self.default_headers {
            if let (Ok(name), Ok(value)) = (
                header::HeaderName::from_bytes(key.as_bytes()),
                header::HeaderValue::from_str(value),
            ) {
                request = request.header(name, value);
            }
        }

        // Injected headers win over defaults
        request = request.headers(req.headers.clone());

        if let Some(cookie) = self.cookie_header(&req) {
            let value = header::HeaderValue::from_bytes(cookie.as_bytes())
                .map_err(|_| ScanError::MalformedRequest("cookie value not encodable".to_string()))?;
            request = request.header(header::COOKIE, value);
        }

        if let Some(body) = req.body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();

        let mut headers: HashMap<String, String> = HashMap::new();
        let mut set_cookies = Vec::new();
        for (k, v) in response.headers().iter() {
            let value = String::from_utf8_lossy(v.as_bytes()).to_string();
            if *k == header::SET_COOKIE {
                set_cookies.push(value.clone());
            }
            headers
                .entry(k.as_str().to_ascii_lowercase())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        let body = response.bytes().await?;

        let mut resp = HttpResponse::new(status, headers, body.to_vec());
        resp.set_cookies = set_cookies;
        resp.elapsed_ms = start.elapsed().as_millis();
        Ok(resp)
    }
}
