// Reflection Analysis Module
// Finds every place a test value is echoed and labels its syntactic context

use crate::xss::context::ContextKind;
use regex::Regex;
use serde::Serialize;

/// Characters of surrounding document kept on each side of a match.
const SNIPPET_RADIUS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionMatch {
    pub kind: ContextKind,
    /// Byte offset of the test value itself in the response body.
    pub position: usize,
    /// The document around the test value.
    pub raw_snippet: String,
    /// The full structural window that matched (e.g. `name="...VALUE..."`).
    pub raw_match_text: String,
}

/// Structural windows per context kind. `V` is replaced by the escaped test
/// value wrapped in a named group so its exact offset can be recovered.
fn window_patterns(kind: ContextKind) -> &'static [&'static str] {
    match kind {
        ContextKind::HtmlBody => &[r">[^<]*V[^<]*<"],
        ContextKind::HtmlComment => &[r"<!--[^-]*V[^-]*-->"],
        ContextKind::HtmlAttributeDouble => &[r#"(?:[\w:-]+\s*=\s*)?"[^"]*V[^"]*""#],
        ContextKind::HtmlAttributeSingle => &[r"(?:[\w:-]+\s*=\s*)?'[^']*V[^']*'"],
        ContextKind::JsStringDouble => &[r#""[^"]*V[^"]*""#],
        ContextKind::JsStringSingle => &[r"'[^']*V[^']*'"],
        ContextKind::JsTemplate => &[r"`[^`]*V[^`]*`"],
        ContextKind::UrlAttribute => {
            &[r#"(?:href|src|action|formaction|data|poster)\s*=\s*["'][^"']*V[^"']*["']"#]
        }
        ContextKind::Css => &[
            r#"style\s*=\s*["'][^"']*V[^"']*["']"#,
            r"<style[^>]*>[^<]*V[^<]*</style>",
        ],
        ContextKind::Direct => &[],
    }
}

fn compile(template: &str, escaped_value: &str) -> Option<Regex> {
    let pattern = format!("(?is){}", template.replace('V', &format!("(?P<v>{})", escaped_value)));
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::debug!("Skipping reflection pattern: {}", e);
            None
        }
    }
}

fn snippet(body: &str, start: usize, end: usize) -> String {
    let mut from = start.saturating_sub(SNIPPET_RADIUS);
    while !body.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + SNIPPET_RADIUS).min(body.len());
    while !body.is_char_boundary(to) {
        to += 1;
    }
    body[from..to].to_string()
}

/// Every occurrence of `test_value` in `body`, once per matching context kind.
///
/// Matches may overlap and are not deduplicated across kinds. A `direct`
/// match is always recorded for each literal occurrence.
pub fn find_reflections(test_value: &str, body: &str) -> Vec<ReflectionMatch> {
    if test_value.is_empty() || body.is_empty() {
        return Vec::new();
    }

    let escaped = regex::escape(test_value);
    let mut matches = Vec::new();

    for kind in ContextKind::ALL {
        for template in window_patterns(kind) {
            let Some(re) = compile(template, &escaped) else {
                continue;
            };

            for caps in re.captures_iter(body) {
                let (Some(whole), Some(value)) = (caps.get(0), caps.name("v")) else {
                    continue;
                };
                matches.push(ReflectionMatch {
                    kind,
                    position: value.start(),
                    raw_snippet: snippet(body, value.start(), value.end()),
                    raw_match_text: whole.as_str().to_string(),
                });
            }
        }
    }

    for (pos, hit) in body.match_indices(test_value) {
        matches.push(ReflectionMatch {
            kind: ContextKind::Direct,
            position: pos,
            raw_snippet: snippet(body, pos, pos + hit.len()),
            raw_match_text: hit.to_string(),
        });
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    const V: &str = "XSS_TEST_1234";

    fn kinds(body: &str) -> Vec<ContextKind> {
        find_reflections(V, body).into_iter().map(|m| m.kind).collect()
    }

    #[test]
    fn test_absent_value_yields_nothing() {
        assert!(find_reflections(V, "<div>nothing here</div>").is_empty());
        assert!(find_reflections(V, "").is_empty());
        assert!(find_reflections("", "<div>x</div>").is_empty());
    }

    #[test]
    fn test_html_body() {
        let k = kinds("<div>XSS_TEST_1234</div>");
        assert!(k.contains(&ContextKind::HtmlBody));
        assert!(k.contains(&ContextKind::Direct));
    }

    #[test]
    fn test_html_comment() {
        let k = kinds("<!-- XSS_TEST_1234 -->");
        assert!(k.contains(&ContextKind::HtmlComment));
        assert!(!k.contains(&ContextKind::HtmlBody));
    }

    #[test]
    fn test_attribute_double_keeps_name() {
        let body = r#"<input type="text" value="XSS_TEST_1234">"#;
        let m = find_reflections(V, body)
            .into_iter()
            .find(|m| m.kind == ContextKind::HtmlAttributeDouble)
            .unwrap();
        assert_eq!(m.raw_match_text, r#"value="XSS_TEST_1234""#);
        assert_eq!(m.position, body.find(V).unwrap());
    }

    #[test]
    fn test_attribute_single() {
        assert!(kinds("<input value='XSS_TEST_1234'>").contains(&ContextKind::HtmlAttributeSingle));
    }

    #[test]
    fn test_js_strings_without_script_tag() {
        let k = kinds(r#"var a = "XSS_TEST_1234";"#);
        assert!(k.contains(&ContextKind::JsStringDouble));
        let k = kinds("var a = 'XSS_TEST_1234';");
        assert!(k.contains(&ContextKind::JsStringSingle));
    }

    #[test]
    fn test_js_template() {
        let k = kinds("<script>let t = `hi XSS_TEST_1234`;</script>");
        assert!(k.contains(&ContextKind::JsTemplate));
    }

    #[test]
    fn test_url_attribute() {
        let k = kinds(r#"<a href="/go?to=XSS_TEST_1234">x</a>"#);
        assert!(k.contains(&ContextKind::UrlAttribute));
    }

    #[test]
    fn test_css() {
        assert!(kinds(r#"<p style="color: XSS_TEST_1234">"#).contains(&ContextKind::Css));
        assert!(kinds("<style>p { color: XSS_TEST_1234 }</style>").contains(&ContextKind::Css));
    }

    #[test]
    fn test_direct_for_every_occurrence() {
        let body = "XSS_TEST_1234 and XSS_TEST_1234";
        let direct: Vec<usize> = find_reflections(V, body)
            .into_iter()
            .filter(|m| m.kind == ContextKind::Direct)
            .map(|m| m.position)
            .collect();
        assert_eq!(direct, vec![0, 18]);
    }

    #[test]
    fn test_payload_with_regex_metacharacters() {
        let payload = "<img src=x onerror=alert(1)>";
        let body = format!("<div>{}</div>", payload);
        let found = find_reflections(payload, &body);
        assert!(found.iter().any(|m| m.kind == ContextKind::HtmlBody));
    }

    #[test]
    fn test_snippet_is_char_safe() {
        let body = format!("{}XSS_TEST_1234{}", "é".repeat(80), "ü".repeat(80));
        let found = find_reflections(V, &body);
        assert!(found[0].raw_snippet.contains(V));
    }
}
