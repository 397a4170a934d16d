// Exploitability Classification Module
// Decides whether a classified reflection would run script

use crate::xss::context::{is_event_handler, is_inside_comment, ContextKind};
use crate::xss::reflect::ReflectionMatch;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Low => write!(f, "low"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::High => write!(f, "high"),
        }
    }
}

/// The decision-table row that produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rule {
    JsBreakout,
    CommentNeutralized,
    HtmlBody,
    EventHandler,
    AttributeBreakout,
    UrlScheme,
    /// Default-permissive fallback; never trusted without verification.
    PermissiveFallback,
}

impl Rule {
    pub fn confidence(self) -> Confidence {
        match self {
            Rule::JsBreakout | Rule::HtmlBody | Rule::EventHandler => Confidence::High,
            Rule::AttributeBreakout | Rule::UrlScheme => Confidence::Medium,
            Rule::CommentNeutralized | Rule::PermissiveFallback => Confidence::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub exploitable: bool,
    pub rule: Rule,
}

impl Verdict {
    fn yes(rule: Rule) -> Self {
        Self {
            exploitable: true,
            rule,
        }
    }

    fn no(rule: Rule) -> Self {
        Self {
            exploitable: false,
            rule,
        }
    }
}

fn attribute_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^([\w:-]+)\s*=\s*["']"#).expect("Invalid attribute regex"))
}

/// Attribute name carried at the front of an attribute match, if any.
pub fn attribute_name(raw_match_text: &str) -> Option<String> {
    attribute_name_re()
        .captures(raw_match_text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

fn neutralized_by_comment(m: &ReflectionMatch, body: &str) -> bool {
    is_inside_comment(body, m.position)
}

fn has_js_breakout(kind: ContextKind, payload: &str) -> bool {
    let lower = payload.to_ascii_lowercase();
    if lower.contains("</script") {
        return true;
    }
    match kind.js_quote() {
        Some(q) => {
            let q = q.as_char();
            payload.contains(&format!("{};", q))
                || (kind == ContextKind::JsTemplate && payload.contains("${"))
        }
        None => false,
    }
}

fn has_attribute_breakout(kind: ContextKind, payload: &str) -> bool {
    let quote_escapes = match kind.quote() {
        Some(q) => payload.contains(q.as_char()),
        None => false,
    };
    quote_escapes || payload.contains('>')
}

fn has_script_scheme(payload: &str) -> bool {
    let lower = payload.trim_start().to_ascii_lowercase();
    lower.starts_with("javascript:") || lower.starts_with("data:")
}

/// Apply the decision table to one reflection. First applicable rule wins.
pub fn classify(m: &ReflectionMatch, payload: &str, body: &str) -> Verdict {
    let kind = m.kind;

    if kind.js_quote().is_some() && has_js_breakout(kind, payload) {
        return Verdict::yes(Rule::JsBreakout);
    }

    if kind.is_html_body() {
        if neutralized_by_comment(m, body) {
            return Verdict::no(Rule::CommentNeutralized);
        }
        return Verdict::yes(Rule::HtmlBody);
    }

    if kind.is_attribute() {
        if attribute_name(&m.raw_match_text).is_some_and(|name| is_event_handler(&name)) {
            return Verdict::yes(Rule::EventHandler);
        }
        if has_attribute_breakout(kind, payload) {
            return Verdict::yes(Rule::AttributeBreakout);
        }
    }

    if kind == ContextKind::UrlAttribute && has_script_scheme(payload) {
        return Verdict::yes(Rule::UrlScheme);
    }

    if neutralized_by_comment(m, body) {
        Verdict::no(Rule::CommentNeutralized)
    } else {
        Verdict::yes(Rule::PermissiveFallback)
    }
}

pub fn is_exploitable(m: &ReflectionMatch, payload: &str, body: &str) -> bool {
    classify(m, payload, body).exploitable
}

/// First exploitable reflection, preferring the most confident rule.
pub fn best_exploitable<'a>(
    matches: &'a [ReflectionMatch],
    payload: &str,
    body: &str,
) -> Option<(&'a ReflectionMatch, Verdict)> {
    let mut best: Option<(&ReflectionMatch, Verdict)> = None;
    for m in matches {
        let verdict = classify(m, payload, body);
        if !verdict.exploitable {
            continue;
        }
        let better = match best {
            Some((_, current)) => verdict.rule.confidence() > current.rule.confidence(),
            None => true,
        };
        if better {
            best = Some((m, verdict));
        }
    }
    best
}
