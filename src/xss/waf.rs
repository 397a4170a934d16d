// Block Detection Module
// Tells block pages apart from normal responses and attributes them to a vendor

use crate::http::response::HttpResponse;
use crate::xss::validate::Confidence;
use regex::RegexSet;
use serde::Serialize;
use std::sync::OnceLock;

/// Status codes treated as a block regardless of body.
pub const BLOCKING_STATUS: &[u16] = &[403, 406, 418, 419, 429, 451, 500, 501, 503];

const BLOCK_SIGNATURES: &[&str] = &[
    r"access\s+denied",
    r"blocked",
    r"security.+\Wviolation",
    r"forbidden",
    r"malicious",
    r"suspicious",
    r"not\s+acceptable",
    r"your\s+request.*blocked",
    r"web\s+application\s+firewall",
    r"detected.*attack",
    r"intrusion\s+detection",
    r"rejected.*security",
];

/// Payload shapes common rule sets reject on sight.
const LIKELY_BLOCKED: &[&str] = &[
    r"<script.*>.*alert.*</script>",
    r"javascript:.*alert",
    r"on(?:load|error|click)\s*=",
    r"<svg.*onload=",
    r"eval\s*\(",
    r"document\.write",
    r"innerhtml\s*=",
    r"<iframe.*src=",
    r"<embed.*src=",
    r"<object.*data=",
];

const STRUCTURAL_CHARS: &[char] = &['<', '>', '"', '\'', '`', '(', ')', '{', '}', '[', ']'];

/// Values sent once per scan to provoke a block page for fingerprinting.
pub const FINGERPRINT_PROBES: &[&str] = &[
    "<script>alert(1)</script>",
    "../../../../etc/passwd",
    "' OR '1'='1",
];

/// Query parameter name carrying the fingerprint probes.
pub const FINGERPRINT_PARAM: &str = "waf_test";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WafVendor {
    Cloudflare,
    ModSecurity,
    AwsWaf,
    Akamai,
    Imperva,
    F5BigIp,
    FortiWeb,
    Barracuda,
    Sucuri,
}

impl WafVendor {
    pub fn label(self) -> &'static str {
        match self {
            WafVendor::Cloudflare => "cloudflare",
            WafVendor::ModSecurity => "modsecurity",
            WafVendor::AwsWaf => "aws_waf",
            WafVendor::Akamai => "akamai",
            WafVendor::Imperva => "imperva",
            WafVendor::F5BigIp => "f5_bigip",
            WafVendor::FortiWeb => "fortiweb",
            WafVendor::Barracuda => "barracuda",
            WafVendor::Sucuri => "sucuri",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        SIGNATURES
            .iter()
            .map(|s| s.vendor)
            .find(|v| v.label().eq_ignore_ascii_case(label))
    }
}

struct VendorSignature {
    vendor: WafVendor,
    /// Substrings of response header names
    headers: &'static [&'static str],
    /// Cookie name prefixes
    cookies: &'static [&'static str],
    /// Substrings of the Server header
    server: &'static [&'static str],
    /// Body substrings
    body: &'static [&'static str],
}

const SIGNATURES: &[VendorSignature] = &[
    VendorSignature {
        vendor: WafVendor::Cloudflare,
        headers: &["cf-ray", "cf-cache-status", "cf-request-id"],
        cookies: &["__cfduid", "__cflb", "__cf_bm"],
        server: &["cloudflare"],
        body: &["cloudflare", "cf-error"],
    },
    VendorSignature {
        vendor: WafVendor::ModSecurity,
        headers: &[],
        cookies: &[],
        server: &["mod_security", "owasp_crs"],
        body: &["modsecurity", "owasp modsecurity"],
    },
    VendorSignature {
        vendor: WafVendor::AwsWaf,
        headers: &["x-amzn-waf", "x-amz-id-2", "x-amz-request-id"],
        cookies: &["aws-waf-token"],
        server: &["awselb"],
        body: &["aws waf"],
    },
    VendorSignature {
        vendor: WafVendor::Akamai,
        headers: &["x-akamai-transformed", "akamai-origin-hop"],
        cookies: &["ak_bmsc"],
        server: &["akamaighost", "akamai"],
        body: &["akamai", "reference&#32;&#35;"],
    },
    VendorSignature {
        vendor: WafVendor::Imperva,
        headers: &["x-iinfo", "incap-su", "x-cdn"],
        cookies: &["visid_incap_", "incap_ses_"],
        server: &["imperva", "incapsula"],
        body: &["incapsula", "imperva"],
    },
    VendorSignature {
        vendor: WafVendor::F5BigIp,
        headers: &["x-wa-info", "bigipserver"],
        cookies: &["bigipserver", "ts01"],
        server: &["bigip", "big-ip"],
        body: &["big-ip", "the requested url was rejected"],
    },
    VendorSignature {
        vendor: WafVendor::FortiWeb,
        headers: &["x-fortiweb"],
        cookies: &["fortiwafsid"],
        server: &["fortiweb"],
        body: &["fortiweb", "fortinet"],
    },
    VendorSignature {
        vendor: WafVendor::Barracuda,
        headers: &["barracuda"],
        cookies: &["barra_counter_session"],
        server: &["barracuda"],
        body: &["barracuda"],
    },
    VendorSignature {
        vendor: WafVendor::Sucuri,
        headers: &["x-sucuri-id", "x-sucuri-cache"],
        cookies: &["sucuri_cloudproxy_uuid_"],
        server: &["sucuri"],
        body: &["sucuri", "cloudproxy"],
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WafProfile {
    pub vendor_label: String,
    pub confidence: Confidence,
}

impl WafProfile {
    pub fn none() -> Self {
        Self {
            vendor_label: "none".to_string(),
            confidence: Confidence::Low,
        }
    }

    pub fn generic() -> Self {
        Self {
            vendor_label: "generic".to_string(),
            confidence: Confidence::Low,
        }
    }

    fn vendor_match(vendor: WafVendor, signals: usize) -> Self {
        Self {
            vendor_label: vendor.label().to_string(),
            confidence: if signals >= 2 {
                Confidence::High
            } else {
                Confidence::Medium
            },
        }
    }

    pub fn is_none(&self) -> bool {
        self.vendor_label == "none"
    }

    pub fn vendor(&self) -> Option<WafVendor> {
        WafVendor::from_label(&self.vendor_label)
    }
}

impl Default for WafProfile {
    fn default() -> Self {
        Self::none()
    }
}

fn block_signatures() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        let patterns: Vec<String> = BLOCK_SIGNATURES.iter().map(|p| format!("(?is){}", p)).collect();
        RegexSet::new(patterns).expect("Invalid block signature set")
    })
}

fn likely_blocked_set() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        let patterns: Vec<String> = LIKELY_BLOCKED.iter().map(|p| format!("(?is){}", p)).collect();
        RegexSet::new(patterns).expect("Invalid likely-blocked set")
    })
}

/// Block detection and vendor attribution. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockGuard;

impl BlockGuard {
    pub fn new() -> Self {
        Self
    }

    pub fn is_blocked(&self, response: &HttpResponse) -> bool {
        BLOCKING_STATUS.contains(&response.status) || self.body_signals_block(&response.body_text())
    }

    pub fn body_signals_block(&self, body: &str) -> bool {
        block_signatures().is_match(body)
    }

    /// Pre-send guess that a rule set would reject `payload`.
    pub fn likely_blocked(&self, payload: &str) -> bool {
        likely_blocked_set().is_match(payload)
            || payload.chars().filter(|c| STRUCTURAL_CHARS.contains(c)).count() > 10
    }

    /// First vendor with any matching signal; `generic` for an unattributed
    /// block; `none` otherwise.
    pub fn fingerprint(&self, response: &HttpResponse) -> WafProfile {
        let header_names: Vec<String> = response.headers.keys().map(|k| k.to_ascii_lowercase()).collect();
        let cookie_names: Vec<String> = response
            .cookie_names()
            .into_iter()
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let server = response.header("server").unwrap_or("").to_ascii_lowercase();
        let body = response.body_text().to_ascii_lowercase();

        for sig in SIGNATURES {
            let mut signals = 0;
            if sig.headers.iter().any(|h| header_names.iter().any(|n| n.contains(h))) {
                signals += 1;
            }
            if sig.cookies.iter().any(|c| cookie_names.iter().any(|n| n.starts_with(c))) {
                signals += 1;
            }
            if !server.is_empty() && sig.server.iter().any(|s| server.contains(s)) {
                signals += 1;
            }
            if sig.body.iter().any(|b| body.contains(b)) {
                signals += 1;
            }

            if signals > 0 {
                return WafProfile::vendor_match(sig.vendor, signals);
            }
        }

        if self.is_blocked(response) {
            WafProfile::generic()
        } else {
            WafProfile::none()
        }
    }
}
