//! Parameter mining: turns the target (and optionally its same-host links)
//! into categorized injection points.

use crate::core::error::ScanResult;
use crate::core::scope::Scope;
use crate::http::client::HttpClient;
use crate::http::request::HttpRequest;
use crate::payload::injector::{FormMethod, ParameterLocation, ParameterTarget};
use crate::reporting::model::ParameterInventory;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::sync::OnceLock;
use url::Url;

/// Request headers commonly echoed back by applications and logs.
pub const REFLECTABLE_HEADERS: &[&str] = &[
    "User-Agent",
    "Referer",
    "X-Forwarded-For",
    "X-Forwarded-Host",
    "X-Client-IP",
    "X-Originating-IP",
];

const MAX_PATH_SEGMENT_LEN: usize = 50;

fn inline_object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{[^{}]*\}").expect("Invalid inline object regex"))
}

/// Query parameter names of `url`, in order, without duplicates.
pub fn query_parameters(url: &Url) -> Vec<ParameterTarget> {
    let mut seen = HashSet::new();
    url.query_pairs()
        .map(|(k, _)| k.to_string())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .map(|k| ParameterTarget::query(url.clone(), &k))
        .collect()
}

/// Path segments that look like values rather than ids.
pub fn path_parameters(url: &Url) -> Vec<ParameterTarget> {
    let Some(segments) = url.path_segments() else {
        return Vec::new();
    };
    segments
        .enumerate()
        .filter(|(_, s)| {
            !s.is_empty() && s.len() < MAX_PATH_SEGMENT_LEN && !s.chars().all(|c| c.is_ascii_digit())
        })
        .map(|(i, _)| ParameterTarget::path(url.clone(), i))
        .collect()
}

/// Named form controls. File inputs become multipart targets.
pub fn form_parameters(page: &Url, document: &Html) -> Vec<ParameterTarget> {
    let mut targets = Vec::new();

    let (Ok(form_sel), Ok(field_sel)) = (
        Selector::parse("form"),
        Selector::parse("input[name], textarea[name], select[name]"),
    ) else {
        return targets;
    };

    for form in document.select(&form_sel) {
        let action = match form.value().attr("action") {
            Some(a) if !a.trim().is_empty() => match page.join(a) {
                Ok(u) => u,
                Err(_) => continue,
            },
            _ => page.clone(),
        };
        let method = FormMethod::parse(form.value().attr("method").unwrap_or("get"));

        let controls: Vec<(String, String, String)> = form
            .select(&field_sel)
            .filter_map(|el| {
                let name = el.value().attr("name")?.to_string();
                let kind = el.value().attr("type").unwrap_or("text").to_ascii_lowercase();
                let value = el.value().attr("value").unwrap_or("").to_string();
                Some((name, kind, value))
            })
            .collect();

        let fields: Vec<(String, String)> = controls
            .iter()
            .filter(|(_, kind, _)| kind != "file")
            .map(|(name, _, value)| (name.clone(), value.clone()))
            .collect();

        for (name, kind, _) in &controls {
            if kind == "file" {
                targets.push(ParameterTarget::file(action.clone(), name, fields.clone()));
            } else {
                targets.push(ParameterTarget::form(action.clone(), method, name, fields.clone()));
            }
        }
    }

    targets
}

/// Same-host links, resolved against `page`, fragments dropped.
pub fn links(page: &Url, document: &Html, scope: &Scope) -> Vec<Url> {
    let Ok(sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    document
        .select(&sel)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| page.join(href).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https") && scope.is_in_scope(u))
        .map(|mut u| {
            u.set_fragment(None);
            u
        })
        .collect()
}

/// Top-level keys of a JSON body, or of small inline objects in HTML.
pub fn json_keys(body: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut push_keys = |value: serde_json::Value| {
        if let serde_json::Value::Object(map) = value {
            for k in map.keys() {
                if !keys.contains(k) {
                    keys.push(k.clone());
                }
            }
        }
    };

    match serde_json::from_str::<serde_json::Value>(body.trim()) {
        Ok(value) => push_keys(value),
        Err(_) => {
            for m in inline_object_re().find_iter(body) {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(m.as_str()) {
                    push_keys(value);
                }
            }
        }
    }

    keys
}

pub struct Crawler {
    pub follow_links: bool,
    pub max_pages: usize,
}

impl Crawler {
    pub fn new(follow_links: bool, max_pages: usize) -> Self {
        Self {
            follow_links,
            max_pages: max_pages.max(1),
        }
    }

    /// Mine parameters from `start_url`. Fails only if the first page cannot
    /// be fetched; later pages that fail are skipped.
    pub async fn discover(&self, client: &HttpClient, start_url: Url) -> ScanResult<ParameterInventory> {
        let mut inventory = ParameterInventory::default();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut seen_bodies = HashSet::new();
        let mut cookie_names: Vec<String> = client.base_cookies().iter().map(|(k, _)| k.clone()).collect();

        inventory.url.extend(query_parameters(&start_url));
        inventory.url.extend(path_parameters(&start_url));
        for header in REFLECTABLE_HEADERS {
            inventory.header.push(ParameterTarget::header(start_url.clone(), header));
        }

        queue.push_back(start_url.clone());

        while let Some(url) = queue.pop_front() {
            if visited.len() >= self.max_pages {
                break;
            }
            if !visited.insert(url.as_str().to_string()) {
                continue;
            }

            let resp = match client.execute(HttpRequest::get(url.clone())).await {
                Ok(r) => r,
                Err(e) if url == start_url => return Err(e),
                Err(_) => continue,
            };

            tracing::debug!("Mined {} (HTTP {}, {} bytes)", url, resp.status, resp.body_len);

            if url != start_url {
                inventory.url.extend(query_parameters(&url));
            }

            for name in resp.cookie_names() {
                if !cookie_names.contains(&name) {
                    cookie_names.push(name);
                }
            }

            if resp.is_binary() {
                continue;
            }
            // same content under another URL yields the same forms
            if !seen_bodies.insert(resp.body_hash.clone()) {
                tracing::debug!("Skipping duplicate page body at {}", url);
                continue;
            }
            let body = resp.body_text();

            for key in json_keys(&body) {
                inventory.json.push(ParameterTarget::json(url.clone(), &key));
            }

            let next_links = {
                let document = Html::parse_document(&body);
                for target in form_parameters(&url, &document) {
                    match target.location {
                        ParameterLocation::File => inventory.file.push(target),
                        _ => inventory.form.push(target),
                    }
                }
                if self.follow_links {
                    links(&url, &document, client.scope())
                } else {
                    Vec::new()
                }
            };

            for next in next_links {
                if !visited.contains(next.as_str()) {
                    queue.push_back(next);
                }
            }
        }

        for name in cookie_names {
            inventory.cookie.push(ParameterTarget::cookie(start_url.clone(), &name));
        }

        tracing::info!(
            "Discovered {} parameters: {} url, {} form, {} header, {} json, {} cookie, {} file",
            inventory.len(),
            inventory.url.len(),
            inventory.form.len(),
            inventory.header.len(),
            inventory.json.len(),
            inventory.cookie.len(),
            inventory.file.len()
        );

        Ok(inventory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_query_and_path_parameters() {
        let u = url("http://example.com/shop/123/items?q=a&page=2&q=b");
        let names: Vec<String> = query_parameters(&u).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["q", "page"]);

        let paths: Vec<ParameterLocation> = path_parameters(&u).into_iter().map(|p| p.location).collect();
        assert_eq!(
            paths,
            vec![
                ParameterLocation::UrlPath { segment: 0 },
                ParameterLocation::UrlPath { segment: 2 }
            ]
        );
        assert!(path_parameters(&url("http://example.com/")).is_empty());
    }

    #[test]
    fn test_form_parameters() {
        let page = url("http://example.com/contact");
        let html = Html::parse_document(
            r#"<form action="/send" method="post">
                 <input name="email" value="a@b.c">
                 <textarea name="message"></textarea>
                 <input type="file" name="attachment">
               </form>
               <form><input name="search"></form>"#,
        );
        let targets = form_parameters(&page, &html);
        assert_eq!(targets.len(), 4);

        let email = &targets[0];
        assert_eq!(email.location, ParameterLocation::Form);
        assert_eq!(email.hints.method, FormMethod::Post);
        assert_eq!(email.hints.action.as_str(), "http://example.com/send");
        assert!(email.hints.fields.iter().any(|(k, _)| k == "message"));

        assert_eq!(targets[2].location, ParameterLocation::File);
        assert_eq!(targets[3].hints.method, FormMethod::Get);
        assert_eq!(targets[3].hints.action, page);
    }

    #[test]
    fn test_links_stay_in_scope() {
        let page = url("http://example.com/a/");
        let scope = Scope::new(&page).unwrap();
        let html = Html::parse_document(
            r#"<a href="b?x=1#top">b</a><a href="http://other.com/">o</a><a href="mailto:x@y">m</a>"#,
        );
        let found = links(&page, &html, &scope);
        assert_eq!(found, vec![url("http://example.com/a/b?x=1")]);
    }

    #[test]
    fn test_json_keys() {
        let mut keys = json_keys(r#"{"name": "x", "id": 1}"#);
        keys.sort();
        assert_eq!(keys, vec!["id", "name"]);
        assert_eq!(
            json_keys(r#"<script>var cfg = {"theme": "dark"};</script>"#),
            vec!["theme"]
        );
        assert!(json_keys("<p>plain</p>").is_empty());
    }
}
