use crate::core::error::{ScanError, ScanResult};
use url::Url;

/// Host allow-list. Every probe, crawl and fingerprint request stays on the
/// target host.
#[derive(Debug, Clone)]
pub struct Scope {
    allowed_hosts: Vec<String>,
}

impl Scope {
    pub fn new(target: &Url) -> ScanResult<Self> {
        let host = target
            .host_str()
            .ok_or_else(|| ScanError::InvalidTarget(format!("no host in {}", target)))?;

        Ok(Self {
            allowed_hosts: vec![host.to_ascii_lowercase()],
        })
    }

    pub fn is_in_scope(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => self.allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(host)),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_host_only() {
        let scope = Scope::new(&Url::parse("http://Shop.example.com/search?q=1").unwrap()).unwrap();
        assert!(scope.is_in_scope(&Url::parse("http://shop.example.com/other").unwrap()));
        assert!(!scope.is_in_scope(&Url::parse("http://evil.example.com/").unwrap()));
    }

    #[test]
    fn test_hostless_target_rejected() {
        let url = Url::parse("data:text/plain,hi").unwrap();
        assert!(Scope::new(&url).is_err());
    }
}
