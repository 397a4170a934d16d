//! XPROBE Core Engine
//!
//! Discovery, WAF fingerprinting, then the scheduled probe passes.

use crate::core::config::ScanConfig;
use crate::core::context::ScanContext;
use crate::core::rate_limit::RateLimiter;
use crate::core::scheduler::{ScanEvent, ScanScheduler};
use crate::http::request::HttpRequest;
use crate::payload::injector::{inject_query_param, ParameterTarget};
use crate::reporting::model::ScanReport;
use crate::scanner::crawler::Crawler;
use crate::xss::waf::{BlockGuard, WafProfile, FINGERPRINT_PARAM, FINGERPRINT_PROBES};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

pub struct Engine {
    config: ScanConfig,
    cancel: CancellationToken,
    events: Option<UnboundedSender<ScanEvent>>,
}

/// Send the canned probes and settle the scan's WAF profile: the first
/// attributed vendor, `generic` if anything was blocked, `none` otherwise.
pub async fn fingerprint_waf(ctx: &ScanContext) -> WafProfile {
    let guard = BlockGuard::new();
    let mut limiter = RateLimiter::new(ctx.config.delay);
    let mut blocked = false;

    for probe in FINGERPRINT_PROBES {
        let url = inject_query_param(&ctx.config.target, FINGERPRINT_PARAM, probe);
        limiter.wait().await;
        ctx.stats.record_request();

        let resp = match ctx.client.execute(HttpRequest::get(url)).await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("Fingerprint probe failed: {}", e);
                continue;
            }
        };

        if guard.is_blocked(&resp) {
            ctx.stats.record_block();
            blocked = true;
        }

        let profile = guard.fingerprint(&resp);
        if profile.vendor().is_some() {
            return profile;
        }
    }

    if blocked {
        WafProfile::generic()
    } else {
        WafProfile::none()
    }
}

/// Keep only parameters named in `only`, or everything when `only` is empty.
pub fn restrict(parameters: Vec<ParameterTarget>, only: &[String]) -> Vec<ParameterTarget> {
    if only.is_empty() {
        return parameters;
    }
    parameters
        .into_iter()
        .filter(|p| only.iter().any(|o| o == &p.name))
        .collect()
}

impl Engine {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: UnboundedSender<ScanEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Cancelling stops new probes; the report covers what already finished.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self) -> anyhow::Result<ScanReport> {
        tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        tracing::info!("        XPROBE XSS SCAN - {:?} MODE", self.config.mode);
        tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        tracing::info!("Target: {}", self.config.target);
        tracing::info!(
            "Workers: {}  Delay: {:?}  Timeout: {:?}",
            self.config.workers,
            self.config.delay,
            self.config.timeout
        );

        let mut ctx = ScanContext::new(self.config.clone())?.with_cancel(self.cancel.clone());

        // -------------------------------------------------
        // Parameter discovery
        // -------------------------------------------------
        tracing::info!("Phase 1: Mining parameters...");
        let max_pages = if self.config.crawl { self.config.max_crawl } else { 1 };
        let inventory = Crawler::new(self.config.crawl, max_pages)
            .discover(&ctx.client, self.config.target.clone())
            .await?;
        let parameters = restrict(inventory.all(), &self.config.only_params);

        // -------------------------------------------------
        // WAF fingerprinting
        // -------------------------------------------------
        if self.config.waf_handling {
            tracing::info!("Phase 2: Fingerprinting protective layer...");
            let profile = fingerprint_waf(&ctx).await;
            if profile.is_none() {
                tracing::info!("   No WAF detected");
            } else {
                tracing::info!(
                    "   🛡️ WAF: {} (confidence {})",
                    profile.vendor_label,
                    profile.confidence
                );
            }
            ctx = ctx.with_waf(profile);
        } else {
            tracing::info!("Phase 2: WAF handling disabled");
        }

        // -------------------------------------------------
        // Probing
        // -------------------------------------------------
        let outcome = if parameters.is_empty() {
            tracing::warn!("No parameters to test");
            Default::default()
        } else {
            tracing::info!("Phase 3: Probing {} parameters...", parameters.len());
            let mut scheduler = ScanScheduler::new(ctx.clone());
            if let Some(events) = &self.events {
                scheduler = scheduler.with_events(events.clone());
            }
            scheduler.run_all(&parameters, self.config.mode).await
        };

        let report = ScanReport {
            target: self.config.target.to_string(),
            mode: self.config.mode,
            waf: (*ctx.waf).clone(),
            vulnerabilities: outcome.records,
            dom_hints: outcome.dom_hints,
            stats: ctx.stats.snapshot(),
            warnings: outcome.warnings,
            cancelled: self.cancel.is_cancelled(),
        };

        tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        tracing::info!(
            "✅ Scan complete: {} vulnerabilities, {} requests in {:.1}s",
            report.vulnerabilities.len(),
            report.stats.requests_sent,
            report.stats.elapsed_seconds
        );
        tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        Ok(report)
    }
}
