//! Scan configuration built from the command line

use crate::cli::args::Cli;
use crate::core::error::{ScanError, ScanResult};
use crate::xss::verify::DEFAULT_QUORUM;
use clap::ValueEnum;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// User-facing scan mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Fast,
    Comprehensive,
    Dom,
    Blind,
    Advanced,
}

/// Payload family a single pass draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestMode {
    Classic,
    Dom,
    Blind,
    Advanced,
}

impl std::fmt::Display for TestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TestMode::Classic => "classic",
            TestMode::Dom => "dom",
            TestMode::Blind => "blind",
            TestMode::Advanced => "advanced",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pass {
    pub test_mode: TestMode,
    /// Only the first N parameters are probed in this pass.
    pub param_limit: Option<usize>,
}

impl Pass {
    fn new(test_mode: TestMode, param_limit: Option<usize>) -> Self {
        Self {
            test_mode,
            param_limit,
        }
    }
}

#[derive(Debug)]
pub struct ScanPlan {
    pub passes: Vec<Pass>,
    /// Configuration problems that made the plan degrade.
    pub warnings: Vec<ScanError>,
}

impl ScanMode {
    pub fn plan(self, callback: Option<&str>) -> ScanPlan {
        let has_callback = callback.is_some_and(|c| !c.trim().is_empty());
        let mut warnings = Vec::new();

        let passes = match self {
            ScanMode::Fast => vec![Pass::new(TestMode::Classic, Some(20))],
            ScanMode::Comprehensive => vec![
                Pass::new(TestMode::Classic, None),
                Pass::new(TestMode::Dom, None),
            ],
            ScanMode::Dom => vec![Pass::new(TestMode::Dom, None)],
            ScanMode::Blind if has_callback => vec![Pass::new(TestMode::Blind, None)],
            ScanMode::Blind => {
                warnings.push(ScanError::Config(
                    "blind mode needs a callback URL, falling back to classic".to_string(),
                ));
                vec![Pass::new(TestMode::Classic, None)]
            }
            ScanMode::Advanced => {
                let mut passes = vec![
                    Pass::new(TestMode::Classic, None),
                    Pass::new(TestMode::Dom, None),
                    Pass::new(TestMode::Advanced, Some(30)),
                ];
                if has_callback {
                    passes.push(Pass::new(TestMode::Blind, Some(20)));
                }
                passes
            }
        };

        ScanPlan { passes, warnings }
    }
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub target: Url,
    pub mode: ScanMode,
    pub workers: usize,
    pub delay: Duration,
    pub timeout: Duration,
    pub callback: Option<String>,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub proxy: Option<String>,
    pub crawl: bool,
    pub max_crawl: usize,
    pub max_payloads: usize,
    pub waf_handling: bool,
    pub bypass_attempts: usize,
    pub mutation_cap: usize,
    pub verification_quorum: usize,
    pub transport_backoff: Duration,
    pub only_params: Vec<String>,
}

impl ScanConfig {
    /// Defaults for library use and tests.
    pub fn new(target: Url) -> Self {
        Self {
            target,
            mode: ScanMode::Comprehensive,
            workers: 5,
            delay: Duration::from_millis(100),
            timeout: Duration::from_secs(10),
            callback: None,
            headers: Vec::new(),
            cookies: Vec::new(),
            proxy: None,
            crawl: false,
            max_crawl: 10,
            max_payloads: 30,
            waf_handling: true,
            bypass_attempts: 15,
            mutation_cap: 30,
            verification_quorum: 2,
            transport_backoff: Duration::from_secs(1),
            only_params: Vec::new(),
        }
    }

    pub fn from_cli(cli: &Cli) -> ScanResult<Self> {
        let target = Url::parse(&cli.url)?;
        if !matches!(target.scheme(), "http" | "https") {
            return Err(ScanError::InvalidTarget(format!(
                "unsupported scheme '{}'",
                target.scheme()
            )));
        }

        if cli.quorum < DEFAULT_QUORUM {
            return Err(ScanError::Config(format!(
                "quorum must be at least {}",
                DEFAULT_QUORUM
            )));
        }

        let delay = Duration::try_from_secs_f64(cli.delay.max(0.0))
            .map_err(|_| ScanError::Config(format!("delay '{}' is not a usable duration", cli.delay)))?;

        let mut headers = Vec::new();
        for header in &cli.headers {
            match header.split_once(':') {
                Some((key, value)) if !key.trim().is_empty() => {
                    headers.push((key.trim().to_string(), value.trim().to_string()))
                }
                _ => tracing::warn!("Ignoring malformed header '{}'", header),
            }
        }

        let mut config = Self::new(target);
        config.mode = cli.mode;
        config.workers = cli.threads.max(1);
        config.delay = delay;
        config.timeout = Duration::from_secs(cli.timeout.max(1));
        config.callback = cli.callback.clone();
        config.headers = headers;
        config.cookies = cli.cookie.as_deref().map(parse_cookie_header).unwrap_or_default();
        config.proxy = cli.proxy.clone();
        config.crawl = cli.crawl;
        config.max_crawl = cli.max_crawl;
        config.max_payloads = cli.max_payloads.max(1);
        config.waf_handling = !cli.no_waf;
        config.bypass_attempts = cli.bypass_attempts;
        config.mutation_cap = cli.mutation_cap.max(1);
        config.verification_quorum = cli.quorum;
        config.only_params = cli.params.clone();

        Ok(config)
    }
}

/// Split a `Cookie` header value into name/value pairs.
pub fn parse_cookie_header(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            match part.split_once('=') {
                Some((k, v)) => Some((k.trim().to_string(), v.trim().to_string())),
                None => Some((part.to_string(), String::new())),
            }
        })
        .collect()
}
