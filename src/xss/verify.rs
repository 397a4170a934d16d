// Verification Pass
// Re-probes a candidate with independent markers and enforces a quorum

use crate::core::stats::ScanStats;
use crate::xss::probe::PayloadSender;
use crate::xss::reflect::find_reflections;
use crate::xss::validate::is_exploitable;
use crate::xss::waf::BlockGuard;
use std::sync::Arc;

pub const VERIFICATION_MARKER: &str = "XSS_VERIFIED";

/// One payload per execution primitive.
pub const BATTERY: &[(&str, &str)] = &[
    ("image-error", r#"<img src=x onerror=console.log("XSS_VERIFIED")>"#),
    ("script-tag", r#"<script>console.log("XSS_VERIFIED")</script>"#),
    ("autofocus-handler", r#"" onfocus=console.log("XSS_VERIFIED") autofocus"#),
    ("scheme", r#"javascript:console.log("XSS_VERIFIED")"#),
    ("svg-onload", r#"<svg onload=console.log("XSS_VERIFIED")>"#),
    ("template-literal", r#"`${console.log("XSS_VERIFIED")}`"#),
];

pub const DEFAULT_QUORUM: usize = 2;

/// Battery entries usable against a candidate found with `discovering`.
pub fn battery_for(discovering: &str) -> Vec<&'static str> {
    BATTERY
        .iter()
        .map(|(_, p)| *p)
        .filter(|p| *p != discovering)
        .collect()
}

/// Whether `payload` comes back in `body` somewhere it would execute.
pub fn reproduces(payload: &str, body: &str) -> bool {
    find_reflections(payload, body)
        .iter()
        .any(|m| is_exploitable(m, payload, body))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub reproduced: usize,
    pub attempted: usize,
    pub quorum: usize,
}

impl Verification {
    pub fn confirmed(&self) -> bool {
        self.reproduced >= self.quorum
    }
}

#[derive(Debug, Clone)]
pub struct VerificationPass {
    quorum: usize,
    /// `None` when block handling is disabled for the scan.
    guard: Option<BlockGuard>,
    stats: Option<Arc<ScanStats>>,
}

impl Default for VerificationPass {
    fn default() -> Self {
        Self::new(DEFAULT_QUORUM)
    }
}

impl VerificationPass {
    pub fn new(quorum: usize) -> Self {
        Self {
            quorum: quorum.max(DEFAULT_QUORUM),
            guard: Some(BlockGuard::new()),
            stats: None,
        }
    }

    pub fn with_block_handling(mut self, enabled: bool) -> Self {
        self.guard = enabled.then(BlockGuard::new);
        self
    }

    pub fn with_stats(mut self, stats: Arc<ScanStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Send the battery through `sender` and count exploitable reproductions.
    /// Blocked or failed sends count as not reproduced.
    pub async fn verify<S: PayloadSender>(&self, sender: &mut S, discovering: &str) -> Verification {
        let battery = battery_for(discovering);
        let mut reproduced = 0;

        for payload in &battery {
            let response = match sender.send(payload).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!("      Verification request failed: {}", e);
                    continue;
                }
            };

            if let Some(guard) = &self.guard {
                if guard.is_blocked(&response) {
                    if let Some(stats) = &self.stats {
                        stats.record_block();
                    }
                    continue;
                }
            }

            if response.is_binary() {
                continue;
            }

            if reproduces(payload, &response.body_text()) {
                reproduced += 1;
            }
        }

        Verification {
            reproduced,
            attempted: battery.len(),
            quorum: self.quorum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ScanError, ScanResult};
    use crate::http::response::HttpResponse;
    use std::collections::HashMap;

    /// Echoes only the payloads it is told to, escapes everything else.
    struct FakeSender {
        echo: Vec<&'static str>,
        status: u16,
        sent: Vec<String>,
    }

    impl PayloadSender for FakeSender {
        async fn send(&mut self, payload: &str) -> ScanResult<HttpResponse> {
            self.sent.push(payload.to_string());
            if payload.starts_with("javascript:") {
                return Err(ScanError::Timeout);
            }
            let shown = if self.echo.iter().any(|e| *e == payload) {
                payload.to_string()
            } else {
                payload.replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
            };
            Ok(HttpResponse::new(
                self.status,
                HashMap::new(),
                format!("<div>{}</div>", shown).into_bytes(),
            ))
        }
    }

    #[test]
    fn test_battery_excludes_discovering_payload() {
        let discovering = BATTERY[1].1;
        let battery = battery_for(discovering);
        assert_eq!(battery.len(), BATTERY.len() - 1);
        assert!(!battery.contains(&discovering));
        assert!(battery.iter().all(|p| p.contains(VERIFICATION_MARKER)));
    }

    #[test]
    fn test_reproduces() {
        let p = BATTERY[0].1;
        assert!(reproduces(p, &format!("<p>{}</p>", p)));
        assert!(!reproduces(p, "<p>&lt;img src=x&gt;</p>"));
        assert!(!reproduces(p, &format!("<!-- {} -->", p)));
    }

    #[tokio::test]
    async fn test_single_reproduction_is_not_enough() {
        let mut sender = FakeSender {
            echo: vec![BATTERY[0].1],
            status: 200,
            sent: Vec::new(),
        };
        let outcome = VerificationPass::default()
            .verify(&mut sender, "<script>alert(1)</script>")
            .await;
        assert_eq!(outcome.reproduced, 1);
        assert!(!outcome.confirmed());
        assert_eq!(sender.sent.len(), BATTERY.len());
    }

    #[tokio::test]
    async fn test_quorum_reached() {
        let mut sender = FakeSender {
            echo: vec![BATTERY[0].1, BATTERY[4].1],
            status: 200,
            sent: Vec::new(),
        };
        let outcome = VerificationPass::default().verify(&mut sender, "x").await;
        assert_eq!(outcome.reproduced, 2);
        assert!(outcome.confirmed());
    }

    #[tokio::test]
    async fn test_blocked_responses_do_not_count() {
        let mut sender = FakeSender {
            echo: BATTERY.iter().map(|(_, p)| *p).collect(),
            status: 403,
            sent: Vec::new(),
        };
        let stats = Arc::new(ScanStats::new());
        let outcome = VerificationPass::new(2)
            .with_stats(Arc::clone(&stats))
            .verify(&mut sender, "x")
            .await;
        assert_eq!(outcome.reproduced, 0);
        // one battery entry times out before a response exists
        assert_eq!(stats.snapshot().waf_blocks, (BATTERY.len() - 1) as u64);

        let outcome = VerificationPass::new(2)
            .with_block_handling(false)
            .verify(&mut sender, "x")
            .await;
        assert!(outcome.confirmed());
    }

    #[tokio::test]
    async fn test_low_quorum_is_raised_to_default() {
        let mut sender = FakeSender {
            echo: vec![BATTERY[0].1],
            status: 200,
            sent: Vec::new(),
        };
        let outcome = VerificationPass::new(1).verify(&mut sender, "x").await;
        assert_eq!(outcome.reproduced, 1);
        assert_eq!(outcome.quorum, DEFAULT_QUORUM);
        assert!(!outcome.confirmed());
    }
}
