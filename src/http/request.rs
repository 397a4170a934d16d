use crate::core::error::{ScanError, ScanResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    /// Per-request cookies, merged over the client's base cookies.
    pub cookies: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn set_body(&mut self, body: String) {
        self.body = Some(body.into_bytes());
    }

    pub fn set_body_bytes(&mut self, body: Vec<u8>) {
        self.body = Some(body);
    }

    /// Set a header. Payload text can contain bytes a header cannot carry
    /// (CR, LF, NUL); those are rejected rather than silently dropped.
    pub fn set_header(&mut self, name: &str, value: &str) -> ScanResult<()> {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ScanError::MalformedRequest(format!("invalid header name '{}'", name)))?;
        let header_value = HeaderValue::from_bytes(value.as_bytes())
            .map_err(|_| ScanError::MalformedRequest(format!("invalid value for header '{}'", name)))?;
        self.headers.insert(header_name, header_value);
        Ok(())
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.cookies.retain(|(k, _)| k != name);
        self.cookies.push((name.to_string(), value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_rejects_crlf() {
        let mut req = HttpRequest::get(Url::parse("http://example.com/").unwrap());
        assert!(req.set_header("X-Test", "a\r\nb").is_err());
        assert!(req.set_header("X-Test", "<svg onload=alert(1)>").is_ok());
        assert_eq!(req.headers.get("x-test").unwrap(), "<svg onload=alert(1)>");
    }

    #[test]
    fn test_set_cookie_replaces() {
        let mut req = HttpRequest::get(Url::parse("http://example.com/").unwrap());
        req.set_cookie("id", "1");
        req.set_cookie("id", "2");
        assert_eq!(req.cookies, vec![("id".to_string(), "2".to_string())]);
    }
}
