// XSS Context Model
// Where a reflected value lands, and what family of payload targets it

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QuoteType {
    Double,   // "
    Single,   // '
    Backtick, // `
}

impl QuoteType {
    pub fn as_char(self) -> char {
        match self {
            QuoteType::Double => '"',
            QuoteType::Single => '\'',
            QuoteType::Backtick => '`',
        }
    }
}

/// Syntactic category of a single reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextKind {
    /// Text between tags: `<div>VALUE</div>`
    HtmlBody,
    /// `<!-- VALUE -->`
    HtmlComment,
    /// `<input value="VALUE">`
    HtmlAttributeDouble,
    /// `<input value='VALUE'>`
    HtmlAttributeSingle,
    /// `var x = "VALUE";`
    JsStringDouble,
    /// `var x = 'VALUE';`
    JsStringSingle,
    /// `` var x = `VALUE`; ``
    JsTemplate,
    /// `<a href="VALUE">`
    UrlAttribute,
    /// `style="color: VALUE"`
    Css,
    /// Literal occurrence with no recognized structure around it
    Direct,
}

impl ContextKind {
    pub const ALL: [ContextKind; 10] = [
        ContextKind::HtmlBody,
        ContextKind::HtmlComment,
        ContextKind::HtmlAttributeDouble,
        ContextKind::HtmlAttributeSingle,
        ContextKind::JsStringDouble,
        ContextKind::JsStringSingle,
        ContextKind::JsTemplate,
        ContextKind::UrlAttribute,
        ContextKind::Css,
        ContextKind::Direct,
    ];

    pub fn is_html_body(self) -> bool {
        matches!(self, ContextKind::HtmlBody | ContextKind::HtmlComment)
    }

    pub fn is_attribute(self) -> bool {
        matches!(
            self,
            ContextKind::HtmlAttributeDouble | ContextKind::HtmlAttributeSingle
        )
    }

    /// Quote delimiting the string or attribute value, if any.
    pub fn quote(self) -> Option<QuoteType> {
        match self {
            ContextKind::HtmlAttributeDouble | ContextKind::JsStringDouble => Some(QuoteType::Double),
            ContextKind::HtmlAttributeSingle | ContextKind::JsStringSingle => Some(QuoteType::Single),
            ContextKind::JsTemplate => Some(QuoteType::Backtick),
            _ => None,
        }
    }

    pub fn js_quote(self) -> Option<QuoteType> {
        match self {
            ContextKind::JsStringDouble | ContextKind::JsStringSingle | ContextKind::JsTemplate => {
                self.quote()
            }
            _ => None,
        }
    }

    pub fn hint(self) -> ContextHint {
        match self {
            ContextKind::HtmlBody | ContextKind::HtmlComment => ContextHint::HtmlBody,
            ContextKind::HtmlAttributeDouble | ContextKind::HtmlAttributeSingle => {
                ContextHint::Attribute
            }
            ContextKind::JsStringDouble | ContextKind::JsStringSingle | ContextKind::JsTemplate => {
                ContextHint::JsString
            }
            ContextKind::UrlAttribute => ContextHint::Url,
            ContextKind::Css => ContextHint::Css,
            ContextKind::Direct => ContextHint::Unknown,
        }
    }
}

impl std::fmt::Display for ContextKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ContextKind::HtmlBody => "html-body",
            ContextKind::HtmlComment => "html-comment",
            ContextKind::HtmlAttributeDouble => "html-attribute-double",
            ContextKind::HtmlAttributeSingle => "html-attribute-single",
            ContextKind::JsStringDouble => "js-string-double",
            ContextKind::JsStringSingle => "js-string-single",
            ContextKind::JsTemplate => "js-template",
            ContextKind::UrlAttribute => "url-attribute",
            ContextKind::Css => "css",
            ContextKind::Direct => "direct",
        };
        f.write_str(name)
    }
}

/// Coarse injection context used to steer payload choice and mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextHint {
    HtmlBody,
    Attribute,
    JsString,
    Url,
    Css,
    Unknown,
}

/// Event handler attribute names recognized as script sinks.
pub const EVENT_HANDLERS: &[&str] = &[
    "onload",
    "onerror",
    "onclick",
    "onmouseover",
    "onmouseenter",
    "onfocus",
    "onblur",
    "onchange",
    "onsubmit",
    "onreset",
    "onselect",
    "onkeydown",
    "onkeypress",
    "onkeyup",
    "ondblclick",
    "onmousedown",
    "onmouseup",
    "onmousemove",
    "onmouseout",
    "onmouseleave",
    "onwheel",
    "onscroll",
    "onresize",
    "oninput",
    "oninvalid",
    "oncontextmenu",
];

pub fn is_event_handler(attr: &str) -> bool {
    let attr = attr.to_ascii_lowercase();
    EVENT_HANDLERS.iter().any(|h| *h == attr)
}

/// Byte offset of the `<!--` that opens a comment still unclosed at `pos`.
pub fn enclosing_comment(body: &str, pos: usize) -> Option<usize> {
    let before = body.get(..pos)?;
    let open = before.rfind("<!--")?;
    match before[open + 4..].find("-->") {
        Some(_) => None,
        None => Some(open),
    }
}

/// Whether `pos` sits inside an HTML comment (`<!--` with no `-->` between it
/// and `pos`, and a `-->` somewhere after).
pub fn is_inside_comment(body: &str, pos: usize) -> bool {
    match enclosing_comment(body, pos) {
        Some(_) => body.get(pos..).is_some_and(|rest| rest.contains("-->")),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_detection() {
        let html = "<p>a</p><!-- MARKER --><p>b</p>";
        let pos = html.find("MARKER").unwrap();
        assert!(is_inside_comment(html, pos));

        let html = "<!-- closed --><div>MARKER</div>";
        let pos = html.find("MARKER").unwrap();
        assert!(!is_inside_comment(html, pos));
    }

    #[test]
    fn test_unterminated_comment_is_not_neutralizing() {
        let html = "<!-- MARKER";
        assert!(!is_inside_comment(html, html.find("MARKER").unwrap()));
    }

    #[test]
    fn test_event_handler_names() {
        assert!(is_event_handler("onload"));
        assert!(is_event_handler("OnMouseOver"));
        assert!(!is_event_handler("value"));
        assert!(!is_event_handler("href"));
    }

    #[test]
    fn test_hint_mapping() {
        assert_eq!(ContextKind::HtmlAttributeSingle.hint(), ContextHint::Attribute);
        assert_eq!(ContextKind::JsTemplate.hint(), ContextHint::JsString);
        assert_eq!(ContextKind::Direct.hint(), ContextHint::Unknown);
        assert_eq!(ContextKind::JsTemplate.js_quote(), Some(QuoteType::Backtick));
        assert_eq!(ContextKind::HtmlAttributeDouble.js_quote(), None);
    }
}
