// DOM Sink Analysis Module
// Static, textual hints that a parameter may reach a client-side sink

use crate::xss::context::is_event_handler;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use std::collections::HashSet;

const SINKS: &[(&str, &str)] = &[
    ("innerHTML", "html-injection"),
    ("outerHTML", "html-injection"),
    ("insertAdjacentHTML", "html-injection"),
    ("document.write", "document-write"),
    ("eval(", "code-execution"),
    ("setTimeout(", "code-execution"),
    ("setInterval(", "code-execution"),
    ("Function(", "code-execution"),
    ("location.assign", "navigation"),
    ("location.replace", "navigation"),
    (".html(", "jquery-html"),
    (".append(", "jquery-append"),
];

const SOURCES: &[&str] = &[
    "location.hash",
    "location.search",
    "location.href",
    "document.URL",
    "document.documentURI",
    "document.referrer",
    "window.name",
    "URLSearchParams",
];

const URL_ATTRIBUTES: &[&str] = &["href", "src", "action", "formaction", "data", "poster"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DomSinkKind {
    /// A sink call in an inline script.
    ScriptSink,
    /// An `on*` attribute whose code mentions the parameter.
    InlineHandler,
    /// A `javascript:`/`data:` URL attribute mentioning the parameter.
    ScriptUrl,
}

/// Unverified lead. Never promoted to a vulnerability record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomSinkHint {
    pub parameter: String,
    pub kind: DomSinkKind,
    pub sink: String,
    pub category: String,
    pub source: Option<String>,
    pub snippet: String,
}

/// Matches `parameter` as a whole identifier, so `q` does not hit `query`.
fn mention_re(parameter: &str) -> Option<Regex> {
    Regex::new(&format!(r"(?:^|[^\w$]){}(?:[^\w$]|$)", regex::escape(parameter))).ok()
}

fn script_sinks(document: &Html, parameter: &str, mention: &Regex, out: &mut Vec<DomSinkHint>) {
    let Ok(sel) = Selector::parse("script") else {
        return;
    };

    for script in document.select(&sel) {
        if script.value().attr("src").is_some() {
            continue;
        }
        let code: String = script.text().collect();

        for line in code.lines() {
            let source = SOURCES.iter().find(|s| line.contains(*s)).map(|s| s.to_string());
            if !mention.is_match(line) && source.is_none() {
                continue;
            }
            for (sink, category) in SINKS {
                if line.contains(sink) {
                    out.push(DomSinkHint {
                        parameter: parameter.to_string(),
                        kind: DomSinkKind::ScriptSink,
                        sink: sink.trim_end_matches('(').to_string(),
                        category: category.to_string(),
                        source: source.clone(),
                        snippet: line.trim().to_string(),
                    });
                }
            }
        }
    }
}

fn attribute_sinks(document: &Html, parameter: &str, mention: &Regex, out: &mut Vec<DomSinkHint>) {
    let Ok(sel) = Selector::parse("*") else {
        return;
    };

    for el in document.select(&sel) {
        for (name, value) in el.value().attrs() {
            if !mention.is_match(value) {
                continue;
            }
            let name = name.to_ascii_lowercase();
            let lower = value.trim_start().to_ascii_lowercase();

            let kind = if is_event_handler(&name) {
                DomSinkKind::InlineHandler
            } else if URL_ATTRIBUTES.contains(&name.as_str())
                && (lower.starts_with("javascript:") || lower.starts_with("data:"))
            {
                DomSinkKind::ScriptUrl
            } else {
                continue;
            };

            out.push(DomSinkHint {
                parameter: parameter.to_string(),
                kind,
                sink: name.clone(),
                category: "attribute".to_string(),
                source: None,
                snippet: format!("{}=\"{}\"", name, value),
            });
        }
    }
}

/// Scan a response for places where `parameter` (or a DOM source) meets a sink.
pub fn analyze_dom(body: &str, parameter: &str) -> Vec<DomSinkHint> {
    if body.is_empty() || parameter.is_empty() {
        return Vec::new();
    }
    let Some(mention) = mention_re(parameter) else {
        return Vec::new();
    };

    let document = Html::parse_document(body);
    let mut hints = Vec::new();
    script_sinks(&document, parameter, &mention, &mut hints);
    attribute_sinks(&document, parameter, &mention, &mut hints);

    let mut seen = HashSet::new();
    hints.retain(|h| seen.insert((h.kind, h.sink.clone(), h.snippet.clone())));
    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_sink_mentioning_parameter() {
        let body = r#"<script>
            var q = params.get("search");
            document.getElementById("out").innerHTML = search;
        </script>"#;
        let hints = analyze_dom(body, "search");
        assert!(hints
            .iter()
            .any(|h| h.kind == DomSinkKind::ScriptSink && h.sink == "innerHTML"));
    }

    #[test]
    fn test_source_to_sink_without_parameter() {
        let body = "<script>document.write(location.hash.slice(1));</script>";
        let hints = analyze_dom(body, "q");
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].source.as_deref(), Some("location.hash"));
        assert_eq!(hints[0].category, "document-write");
    }

    #[test]
    fn test_external_scripts_ignored() {
        let body = r#"<script src="/app.js">eval(q)</script>"#;
        assert!(analyze_dom(body, "q").is_empty());
    }

    #[test]
    fn test_inline_handler_and_script_url() {
        let body = r#"<button onclick="go('next')">x</button><a href="javascript:load('next')">y</a>"#;
        let hints = analyze_dom(body, "next");
        assert!(hints.iter().any(|h| h.kind == DomSinkKind::InlineHandler && h.sink == "onclick"));
        assert!(hints.iter().any(|h| h.kind == DomSinkKind::ScriptUrl && h.sink == "href"));
    }

    #[test]
    fn test_short_name_only_matches_whole_identifier() {
        let body = r#"<script>
            var query = input.value;
            el.innerHTML = query;
        </script>
        <button onclick="sequence()">x</button>"#;
        assert!(analyze_dom(body, "q").is_empty());

        let body = "<script>el.innerHTML = q + '!';</script>";
        let hints = analyze_dom(body, "q");
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].sink, "innerHTML");
    }

    #[test]
    fn test_duplicate_hints_collapse() {
        let body = "<script>el.innerHTML = q;</script><script>el.innerHTML = q;</script>";
        assert_eq!(analyze_dom(body, "q").len(), 1);
    }

    #[test]
    fn test_plain_page_has_no_hints() {
        let body = r#"<div class="q"><a href="/next?q=1">next</a></div>"#;
        assert!(analyze_dom(body, "q").is_empty());
    }
}
