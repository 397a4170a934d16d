//! Scan-wide counters shared by every probe.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct ScanStats {
    requests_sent: AtomicU64,
    parameters_tested: AtomicU64,
    vulnerabilities_found: AtomicU64,
    waf_blocks: AtomicU64,
    filtered_payloads: AtomicU64,
    started: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub requests_sent: u64,
    pub parameters_tested: u64,
    pub vulnerabilities_found: u64,
    pub waf_blocks: u64,
    pub filtered_payloads: u64,
    pub elapsed_seconds: f64,
}

impl Default for ScanStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanStats {
    pub fn new() -> Self {
        Self {
            requests_sent: AtomicU64::new(0),
            parameters_tested: AtomicU64::new(0),
            vulnerabilities_found: AtomicU64::new(0),
            waf_blocks: AtomicU64::new(0),
            filtered_payloads: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parameter(&self) {
        self.parameters_tested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_vulnerability(&self) {
        self.vulnerabilities_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_block(&self) {
        self.waf_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filtered(&self) {
        self.filtered_payloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            parameters_tested: self.parameters_tested.load(Ordering::Relaxed),
            vulnerabilities_found: self.vulnerabilities_found.load(Ordering::Relaxed),
            waf_blocks: self.waf_blocks.load(Ordering::Relaxed),
            filtered_payloads: self.filtered_payloads.load(Ordering::Relaxed),
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters() {
        let stats = ScanStats::new();
        stats.record_request();
        stats.record_request();
        stats.record_block();
        stats.record_filtered();
        stats.record_parameter();

        let snap = stats.snapshot();
        assert_eq!(snap.requests_sent, 2);
        assert_eq!(snap.waf_blocks, 1);
        assert_eq!(snap.filtered_payloads, 1);
        assert_eq!(snap.parameters_tested, 1);
        assert_eq!(snap.vulnerabilities_found, 0);
    }

    #[tokio::test]
    async fn test_counts_across_tasks() {
        let stats = Arc::new(ScanStats::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let stats = Arc::clone(&stats);
            handles.push(tokio::spawn(async move {
                for _ in 0..10 {
                    stats.record_request();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(stats.snapshot().requests_sent, 80);
    }
}
