use crate::core::config::{ScanMode, TestMode};
use crate::core::stats::StatsSnapshot;
use crate::payload::injector::ParameterTarget;
use crate::xss::dom::DomSinkHint;
use crate::xss::reflect::ReflectionMatch;
use crate::xss::validate::{Confidence, Rule};
use crate::xss::waf::WafProfile;
use serde::Serialize;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl From<Confidence> for Severity {
    fn from(confidence: Confidence) -> Self {
        match confidence {
            Confidence::High => Severity::High,
            Confidence::Medium => Severity::Medium,
            Confidence::Low => Severity::Low,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "🟢 LOW"),
            Severity::Medium => write!(f, "🟡 MEDIUM"),
            Severity::High => write!(f, "🟠 HIGH"),
        }
    }
}

/// A reflected XSS that survived the verification quorum.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityRecord {
    pub parameter: ParameterTarget,
    /// The payload text actually sent (a mutation when a block was bypassed).
    pub payload: String,
    pub context: ReflectionMatch,
    pub confidence: Confidence,
    pub rule: Rule,
    pub waf_bypassed: bool,
    pub technique_chain: Vec<String>,
    pub verification_count: usize,
    pub test_mode: TestMode,
    pub cwe: String,
}

impl VulnerabilityRecord {
    pub fn severity(&self) -> Severity {
        self.confidence.into()
    }

    pub fn description(&self) -> String {
        format!(
            "Parameter '{}' ({}) is reflected into a {} context without sufficient encoding. \
             The reflection was reproduced by {} independent verification payloads.",
            self.parameter.name, self.parameter.location, self.context.kind, self.verification_count
        )
    }

    pub fn remediation(&self) -> &'static str {
        "Encode output for the context it lands in (HTML entity encoding for markup, \
         attribute encoding for attribute values, JavaScript string escaping inside scripts). \
         Validate input against an allow-list and deploy a strict Content-Security-Policy."
    }
}

/// Parameters discovered on the target, grouped by category.
#[derive(Debug, Serialize, Clone, Default)]
pub struct ParameterInventory {
    pub url: Vec<ParameterTarget>,
    pub form: Vec<ParameterTarget>,
    pub header: Vec<ParameterTarget>,
    pub json: Vec<ParameterTarget>,
    pub cookie: Vec<ParameterTarget>,
    pub file: Vec<ParameterTarget>,
}

impl ParameterInventory {
    pub fn len(&self) -> usize {
        self.url.len() + self.form.len() + self.header.len() + self.json.len() + self.cookie.len() + self.file.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten in category order, without duplicate keys.
    pub fn all(&self) -> Vec<ParameterTarget> {
        let mut seen = std::collections::HashSet::new();
        [&self.url, &self.form, &self.json, &self.cookie, &self.header, &self.file]
            .into_iter()
            .flatten()
            .filter(|p| seen.insert(p.key()))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub target: String,
    pub mode: ScanMode,
    pub waf: WafProfile,
    pub vulnerabilities: Vec<VulnerabilityRecord>,
    /// Static DOM leads. Unverified, never counted as vulnerabilities.
    pub dom_hints: Vec<DomSinkHint>,
    pub stats: StatsSnapshot,
    pub warnings: Vec<String>,
    pub cancelled: bool,
}

impl ScanReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.vulnerabilities.iter().filter(|v| v.severity() == severity).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn target(name: &str) -> ParameterTarget {
        let url = Url::parse("http://example.com/search?q=1").unwrap();
        ParameterTarget::query(url, name)
    }

    #[test]
    fn test_severity_from_confidence() {
        assert_eq!(Severity::from(Confidence::High), Severity::High);
        assert_eq!(Severity::from(Confidence::Low), Severity::Low);
    }

    #[test]
    fn test_inventory_dedups_by_key() {
        let mut inv = ParameterInventory::default();
        inv.url.push(target("q"));
        inv.url.push(target("q"));
        inv.url.push(target("page"));
        assert_eq!(inv.len(), 3);
        assert_eq!(inv.all().len(), 2);
    }
}
