//! Parameter targets and the delivery strategy that carries a payload to each

use crate::core::error::{ScanError, ScanResult};
use crate::http::request::HttpRequest;
use rand::Rng;
use serde::Serialize;
use std::fmt;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterLocation {
    UrlQuery,
    UrlPath { segment: usize },
    Form,
    Header,
    Cookie,
    JsonBody,
    File,
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterLocation::UrlQuery => write!(f, "url-query"),
            ParameterLocation::UrlPath { segment } => write!(f, "url-path[{}]", segment),
            ParameterLocation::Form => write!(f, "form"),
            ParameterLocation::Header => write!(f, "header"),
            ParameterLocation::Cookie => write!(f, "cookie"),
            ParameterLocation::JsonBody => write!(f, "json-body"),
            ParameterLocation::File => write!(f, "file"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FormMethod {
    Get,
    Post,
}

impl FormMethod {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("post") {
            FormMethod::Post
        } else {
            FormMethod::Get
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryHints {
    pub method: FormMethod,
    pub action: Url,
    pub content_type: Option<String>,
    /// Other fields submitted alongside the injected one (form siblings).
    pub fields: Vec<(String, String)>,
}

impl DeliveryHints {
    pub fn get(action: Url) -> Self {
        Self {
            method: FormMethod::Get,
            action,
            content_type: None,
            fields: Vec::new(),
        }
    }
}

/// One way of carrying a payload to the target, fixed when the target is built.
#[derive(Debug, Clone)]
enum Delivery {
    Query { url: Url },
    PathSegment { url: Url, index: usize },
    FormGet { action: Url, fields: Vec<(String, String)> },
    FormPost { action: Url, fields: Vec<(String, String)> },
    Header { url: Url },
    Cookie { url: Url },
    Json { url: Url },
    Multipart { action: Url, fields: Vec<(String, String)> },
}

/// An input point of the target. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterTarget {
    pub name: String,
    pub location: ParameterLocation,
    pub hints: DeliveryHints,
    #[serde(skip)]
    delivery: Delivery,
}

impl ParameterTarget {
    pub fn new(name: impl Into<String>, location: ParameterLocation, hints: DeliveryHints) -> Self {
        let name = name.into();
        let url = hints.action.clone();
        let fields: Vec<(String, String)> = hints
            .fields
            .iter()
            .filter(|(k, _)| *k != name)
            .cloned()
            .collect();

        let delivery = match location {
            ParameterLocation::UrlQuery => Delivery::Query { url },
            ParameterLocation::UrlPath { segment } => Delivery::PathSegment {
                url,
                index: segment,
            },
            ParameterLocation::Form => match hints.method {
                FormMethod::Get => Delivery::FormGet { action: url, fields },
                FormMethod::Post => Delivery::FormPost { action: url, fields },
            },
            ParameterLocation::Header => Delivery::Header { url },
            ParameterLocation::Cookie => Delivery::Cookie { url },
            ParameterLocation::JsonBody => Delivery::Json { url },
            ParameterLocation::File => Delivery::Multipart { action: url, fields },
        };

        Self {
            name,
            location,
            hints,
            delivery,
        }
    }

    pub fn query(url: Url, name: &str) -> Self {
        Self::new(name, ParameterLocation::UrlQuery, DeliveryHints::get(url))
    }

    pub fn path(url: Url, segment: usize) -> Self {
        Self::new(
            format!("path:{}", segment),
            ParameterLocation::UrlPath { segment },
            DeliveryHints::get(url),
        )
    }

    pub fn form(action: Url, method: FormMethod, name: &str, fields: Vec<(String, String)>) -> Self {
        let content_type = match method {
            FormMethod::Post => Some("application/x-www-form-urlencoded".to_string()),
            FormMethod::Get => None,
        };
        Self::new(
            name,
            ParameterLocation::Form,
            DeliveryHints {
                method,
                action,
                content_type,
                fields,
            },
        )
    }

    pub fn header(url: Url, name: &str) -> Self {
        Self::new(name, ParameterLocation::Header, DeliveryHints::get(url))
    }

    pub fn cookie(url: Url, name: &str) -> Self {
        Self::new(name, ParameterLocation::Cookie, DeliveryHints::get(url))
    }

    pub fn json(url: Url, name: &str) -> Self {
        let mut hints = DeliveryHints::get(url);
        hints.method = FormMethod::Post;
        hints.content_type = Some("application/json".to_string());
        Self::new(name, ParameterLocation::JsonBody, hints)
    }

    pub fn file(action: Url, name: &str, fields: Vec<(String, String)>) -> Self {
        Self::new(
            name,
            ParameterLocation::File,
            DeliveryHints {
                method: FormMethod::Post,
                action,
                content_type: Some("multipart/form-data".to_string()),
                fields,
            },
        )
    }

    /// Stable identity used to skip already-confirmed targets.
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.location, self.hints.action, self.name)
    }

    pub fn build_request(&self, payload: &str) -> ScanResult<HttpRequest> {
        match &self.delivery {
            Delivery::Query { url } => Ok(HttpRequest::get(inject_query_param(url, &self.name, payload))),
            Delivery::PathSegment { url, index } => {
                Ok(HttpRequest::get(inject_path_segment(url, *index, payload)?))
            }
            Delivery::FormGet { action, fields } => {
                let mut url = action.clone();
                {
                    let mut pairs = url.query_pairs_mut();
                    pairs.clear();
                    for (k, v) in fields {
                        pairs.append_pair(k, v);
                    }
                    pairs.append_pair(&self.name, payload);
                }
                Ok(HttpRequest::get(url))
            }
            Delivery::FormPost { action, fields } => {
                let mut form: Vec<(&str, &str)> =
                    fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
                form.push((self.name.as_str(), payload));
                let body = serde_urlencoded::to_string(&form)
                    .map_err(|e| ScanError::MalformedRequest(e.to_string()))?;

                let mut req = HttpRequest::post(action.clone());
                req.set_header("Content-Type", "application/x-www-form-urlencoded")?;
                req.set_body(body);
                Ok(req)
            }
            Delivery::Header { url } => {
                let mut req = HttpRequest::get(url.clone());
                req.set_header(&self.name, payload)?;
                Ok(req)
            }
            Delivery::Cookie { url } => {
                let mut req = HttpRequest::get(url.clone());
                req.set_cookie(&self.name, payload);
                Ok(req)
            }
            Delivery::Json { url } => {
                let mut body = serde_json::Map::new();
                body.insert(self.name.clone(), serde_json::Value::String(payload.to_string()));
                let body = serde_json::to_vec(&serde_json::Value::Object(body))
                    .map_err(|e| ScanError::MalformedRequest(e.to_string()))?;

                let mut req = HttpRequest::post(url.clone());
                req.set_header("Content-Type", "application/json")?;
                req.set_body_bytes(body);
                Ok(req)
            }
            Delivery::Multipart { action, fields } => {
                let boundary = format!("----xprobe{:016x}", rand::thread_rng().gen::<u64>());
                let body = multipart_body(&boundary, fields, &self.name, payload);

                let mut req = HttpRequest::post(action.clone());
                req.set_header(
                    "Content-Type",
                    &format!("multipart/form-data; boundary={}", boundary),
                )?;
                req.set_body(body);
                Ok(req)
            }
        }
    }
}

pub fn inject_query_param(base: &Url, param: &str, payload: &str) -> Url {
    let mut url = base.clone();
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let mut found = false;
    for (k, v) in pairs.iter_mut() {
        if k == param {
            *v = payload.to_string();
            found = true;
        }
    }

    if !found {
        pairs.push((param.to_string(), payload.to_string()));
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
    url
}

pub fn inject_path_segment(base: &Url, index: usize, payload: &str) -> ScanResult<Url> {
    let mut segments: Vec<String> = base
        .path_segments()
        .ok_or_else(|| ScanError::MalformedRequest(format!("{} has no path", base)))?
        .map(|s| {
            urlencoding::decode(s)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| s.to_string())
        })
        .collect();

    let slot = segments.get_mut(index).ok_or_else(|| {
        ScanError::MalformedRequest(format!("path segment {} out of range", index))
    })?;
    *slot = payload.to_string();

    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ScanError::MalformedRequest(format!("{} cannot be a base", base)))?
        .clear()
        .extend(segments.iter());
    Ok(url)
}

fn multipart_body(boundary: &str, fields: &[(String, String)], name: &str, payload: &str) -> String {
    let mut body = String::new();
    for (k, v) in fields {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            boundary, k, v
        ));
    }
    body.push_str(&format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: text/html\r\n\r\n{}\r\n",
        boundary, name, payload, payload
    ));
    body.push_str(&format!("--{}--\r\n", boundary));
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_query_replaces_existing() {
        let target = ParameterTarget::query(url("http://t.test/s?q=1&page=2"), "q");
        let req = target.build_request("<b>").unwrap();
        let pairs: Vec<(String, String)> = req
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![("q".into(), "<b>".into()), ("page".into(), "2".into())]
        );
    }

    #[test]
    fn test_query_appends_missing() {
        let injected = inject_query_param(&url("http://t.test/s"), "x", "1");
        assert_eq!(injected.query(), Some("x=1"));
    }

    #[test]
    fn test_path_segment() {
        let target = ParameterTarget::path(url("http://t.test/users/42/profile"), 1);
        let req = target.build_request("<svg>").unwrap();
        assert_eq!(req.url.path(), "/users/%3Csvg%3E/profile");
        assert!(target.build_request("x").is_ok());

        let out_of_range = ParameterTarget::path(url("http://t.test/a"), 4);
        assert!(out_of_range.build_request("x").is_err());
    }

    #[test]
    fn test_form_post_keeps_siblings() {
        let target = ParameterTarget::form(
            url("http://t.test/comment"),
            FormMethod::Post,
            "msg",
            vec![("msg".into(), "".into()), ("csrf".into(), "tok".into())],
        );
        let req = target.build_request("a b&c").unwrap();
        assert_eq!(req.method, reqwest::Method::POST);
        let body = String::from_utf8(req.body.unwrap()).unwrap();
        assert_eq!(body, "csrf=tok&msg=a+b%26c");
    }

    #[test]
    fn test_form_get_goes_to_action() {
        let target = ParameterTarget::form(
            url("http://t.test/search?old=1"),
            FormMethod::Get,
            "q",
            Vec::new(),
        );
        let req = target.build_request("v").unwrap();
        assert_eq!(req.url.as_str(), "http://t.test/search?q=v");
    }

    #[test]
    fn test_header_and_cookie() {
        let req = ParameterTarget::header(url("http://t.test/"), "Referer")
            .build_request("<x>")
            .unwrap();
        assert_eq!(req.headers.get("referer").unwrap(), "<x>");

        let req = ParameterTarget::cookie(url("http://t.test/"), "theme")
            .build_request("<x>")
            .unwrap();
        assert_eq!(req.cookies, vec![("theme".to_string(), "<x>".to_string())]);
        assert!(req.headers.get("cookie").is_none());
    }

    #[test]
    fn test_json_body() {
        let req = ParameterTarget::json(url("http://t.test/api"), "name")
            .build_request("\"<x>")
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&req.body.unwrap()).unwrap();
        assert_eq!(value["name"], "\"<x>");
        assert_eq!(req.headers.get("content-type").unwrap(), "application/json");
    }

    #[test]
    fn test_multipart_file() {
        let req = ParameterTarget::file(url("http://t.test/upload"), "avatar", Vec::new())
            .build_request("<svg onload=1>")
            .unwrap();
        let ct = req.headers.get("content-type").unwrap().to_str().unwrap().to_string();
        let boundary = ct.split("boundary=").nth(1).unwrap().to_string();
        let body = String::from_utf8(req.body.unwrap()).unwrap();
        assert!(body.contains("filename=\"<svg onload=1>\""));
        assert!(body.ends_with(&format!("--{}--\r\n", boundary)));
    }

    #[test]
    fn test_header_payload_with_newline_is_rejected() {
        let target = ParameterTarget::header(url("http://t.test/"), "X-Forwarded-For");
        assert!(matches!(
            target.build_request("a\nb"),
            Err(ScanError::MalformedRequest(_))
        ));
    }
}
