use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Lowercased header names; repeated headers joined with ", ".
    pub headers: HashMap<String, String>,
    /// Raw `Set-Cookie` values, kept apart because they cannot be joined.
    pub set_cookies: Vec<String>,
    pub body_len: usize,
    pub body_hash: String,
    pub body: Vec<u8>,
    pub elapsed_ms: u128,
}

impl HttpResponse {
    /// Build a response from parts (used by fixtures and the client).
    pub fn new(status: u16, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(&body);

        Self {
            status,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
            set_cookies: Vec::new(),
            body_len: body.len(),
            body_hash: format!("{:x}", hasher.finalize()),
            body,
            elapsed_ms: 0,
        }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Names of the cookies this response sets.
    pub fn cookie_names(&self) -> Vec<String> {
        self.set_cookies
            .iter()
            .filter_map(|c| c.split(';').next())
            .filter_map(|pair| pair.split_once('='))
            .map(|(name, _)| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Media types that can never carry an HTML/JS reflection.
    pub fn is_binary(&self) -> bool {
        let Some(ct) = self.header("content-type") else {
            return false;
        };
        let ct = ct.to_ascii_lowercase();
        ct.starts_with("image/")
            || ct.starts_with("audio/")
            || ct.starts_with("video/")
            || ct.starts_with("font/")
            || ct.starts_with("application/octet-stream")
            || ct.starts_with("application/pdf")
            || ct.starts_with("application/zip")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_names() {
        let mut resp = HttpResponse::new(200, HashMap::new(), Vec::new());
        resp.set_cookies = vec![
            "session=abc; Path=/; HttpOnly".to_string(),
            "__cflb=0H28v; SameSite=None".to_string(),
        ];
        assert_eq!(resp.cookie_names(), vec!["session", "__cflb"]);
    }

    #[test]
    fn test_binary_content_type() {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "image/png".to_string());
        let resp = HttpResponse::new(200, headers, vec![0x89, 0x50]);
        assert!(resp.is_binary());
        assert_eq!(resp.header("content-type"), Some("image/png"));
    }

    #[test]
    fn test_lossy_body() {
        let resp = HttpResponse::new(200, HashMap::new(), vec![b'o', 0xff, b'k']);
        assert_eq!(resp.body_text(), "o\u{fffd}k");
    }
}
