use crate::core::config::ScanMode;
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// XPROBE – context-aware reflected and DOM XSS probe
#[derive(Parser, Debug)]
#[command(
    name = "xprobe",
    version = "0.1.0",
    about = "XPROBE – context-aware reflected and DOM XSS probe",
    long_about = r#"
XPROBE injects markers and payloads into every discovered input point of a
target, classifies where each value is echoed back, and only reports a
finding after an independent verification battery reproduces it.

  • Context classification (HTML body, attribute, JS string, URL, CSS, comment)
  • WAF detection with vendor-directed payload mutation
  • Bounded concurrency with per-parameter pacing
  • Quorum verification against false positives
"#,
    after_help = r#"EXAMPLES:
  xprobe -u "https://example.com/search?q=test"
  xprobe -u "https://example.com/search?q=test" -m fast -t 10
  xprobe -u "https://example.com/" --crawl --max-crawl 20 -m advanced
  xprobe -u "https://example.com/comment" -m blind -c https://cb.example.net
  xprobe -u "https://example.com/search?q=test" -H "Authorization: Bearer x" --format json
"#
)]
pub struct Cli {
    // ═══════════════════════════════════════════════════════════════
    // TARGET
    // ═══════════════════════════════════════════════════════════════
    /// Target URL
    #[arg(short = 'u', long = "url", help_heading = "Target")]
    pub url: String,

    /// Restrict testing to these parameter names (repeatable)
    #[arg(short = 'p', long = "param", help_heading = "Target")]
    pub params: Vec<String>,

    // ═══════════════════════════════════════════════════════════════
    // SCAN
    // ═══════════════════════════════════════════════════════════════
    /// Scan mode
    #[arg(short = 'm', long, value_enum, default_value_t = ScanMode::Comprehensive, help_heading = "Scan")]
    pub mode: ScanMode,

    /// Number of concurrent parameter probes
    #[arg(short = 't', long, default_value_t = 5, help_heading = "Scan")]
    pub threads: usize,

    /// Delay between requests of one parameter, in seconds
    #[arg(short = 'd', long, default_value_t = 0.1, help_heading = "Scan")]
    pub delay: f64,

    /// Per-request timeout, in seconds
    #[arg(short = 'T', long, default_value_t = 10, help_heading = "Scan")]
    pub timeout: u64,

    /// Blind XSS callback URL
    #[arg(short = 'c', long, help_heading = "Scan")]
    pub callback: Option<String>,

    /// Maximum payloads per parameter
    #[arg(long, default_value_t = 30, help_heading = "Scan")]
    pub max_payloads: usize,

    // ═══════════════════════════════════════════════════════════════
    // WAF HANDLING
    // ═══════════════════════════════════════════════════════════════
    /// Disable WAF detection and bypass
    #[arg(long, help_heading = "WAF")]
    pub no_waf: bool,

    /// Maximum bypass attempts per blocked payload
    #[arg(long, default_value_t = 15, help_heading = "WAF")]
    pub bypass_attempts: usize,

    /// Maximum mutation candidates generated per blocked payload
    #[arg(long, default_value_t = 30, help_heading = "WAF")]
    pub mutation_cap: usize,

    /// Independent confirmations required before reporting (at least 2)
    #[arg(long, default_value_t = 2, help_heading = "WAF")]
    pub quorum: usize,

    // ═══════════════════════════════════════════════════════════════
    // DISCOVERY
    // ═══════════════════════════════════════════════════════════════
    /// Follow same-host links to find more parameters
    #[arg(long, help_heading = "Discovery")]
    pub crawl: bool,

    /// Maximum pages to crawl
    #[arg(long, default_value_t = 10, help_heading = "Discovery")]
    pub max_crawl: usize,

    // ═══════════════════════════════════════════════════════════════
    // HTTP
    // ═══════════════════════════════════════════════════════════════
    /// Custom header (repeatable): -H "Name: value"
    #[arg(short = 'H', long = "header", help_heading = "HTTP")]
    pub headers: Vec<String>,

    /// Cookies sent with every request: "a=1; b=2"
    #[arg(long, help_heading = "HTTP")]
    pub cookie: Option<String>,

    /// Upstream proxy URL
    #[arg(long, help_heading = "HTTP")]
    pub proxy: Option<String>,

    // ═══════════════════════════════════════════════════════════════
    // OUTPUT
    // ═══════════════════════════════════════════════════════════════
    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, help_heading = "Output")]
    pub format: OutputFormat,

    /// Debug logging
    #[arg(short, long, help_heading = "Output")]
    pub verbose: bool,

    /// Warnings only
    #[arg(short, long, help_heading = "Output")]
    pub quiet: bool,

    /// Do not print the banner
    #[arg(long, help_heading = "Output")]
    pub no_banner: bool,
}

impl Cli {
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "xprobe=debug"
        } else if self.quiet {
            "xprobe=warn"
        } else {
            "xprobe=info"
        }
    }
}
