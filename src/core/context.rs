//! Shared state handed to every probe of one scan

use crate::core::config::ScanConfig;
use crate::core::error::ScanResult;
use crate::core::stats::ScanStats;
use crate::http::client::HttpClient;
use crate::xss::payloads::PayloadCatalog;
use crate::xss::waf::WafProfile;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Cheap to clone; every field is reference counted or read-only.
#[derive(Clone)]
pub struct ScanContext {
    pub config: Arc<ScanConfig>,
    pub client: HttpClient,
    pub catalog: Arc<PayloadCatalog>,
    /// Fixed once by the fingerprint pass, read-only afterwards.
    pub waf: Arc<WafProfile>,
    pub stats: Arc<ScanStats>,
    /// Payload texts already seen blocked on some parameter.
    filtered: Arc<Mutex<HashSet<String>>>,
    pub cancel: CancellationToken,
}

impl ScanContext {
    pub fn new(config: ScanConfig) -> ScanResult<Self> {
        let client = HttpClient::new(&config)?;
        let catalog = PayloadCatalog::new(config.callback.clone());
        Ok(Self {
            config: Arc::new(config),
            client,
            catalog: Arc::new(catalog),
            waf: Arc::new(WafProfile::none()),
            stats: Arc::new(ScanStats::new()),
            filtered: Arc::new(Mutex::new(HashSet::new())),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_waf(mut self, waf: WafProfile) -> Self {
        self.waf = Arc::new(waf);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_filtered(&self, payload: &str) -> bool {
        match self.filtered.lock() {
            Ok(set) => set.contains(payload),
            Err(poisoned) => poisoned.into_inner().contains(payload),
        }
    }

    /// Remember a payload that a blocking layer rejected outright.
    pub fn mark_filtered(&self, payload: &str) {
        let mut set = match self.filtered.lock() {
            Ok(set) => set,
            Err(poisoned) => poisoned.into_inner(),
        };
        set.insert(payload.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_filtered_set_is_shared_between_clones() {
        let config = ScanConfig::new(Url::parse("http://example.com/").unwrap());
        let ctx = ScanContext::new(config).unwrap();
        let other = ctx.clone();
        ctx.mark_filtered("<script>alert(1)</script>");
        assert!(other.is_filtered("<script>alert(1)</script>"));
        assert!(!other.is_filtered("<b>"));
    }
}
