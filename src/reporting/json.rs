use crate::reporting::model::{ScanReport, Severity};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Document<'a> {
    scan_metadata: ScanMetadata,
    summary: Summary,
    #[serde(flatten)]
    report: &'a ScanReport,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanMetadata {
    tool: String,
    version: String,
    scan_date: String,
    report_format: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    total_vulnerabilities: usize,
    high: usize,
    medium: usize,
    low: usize,
    dom_hints: usize,
}

pub fn render(report: &ScanReport) -> anyhow::Result<String> {
    let document = Document {
        scan_metadata: ScanMetadata {
            tool: "XPROBE".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            scan_date: chrono::Utc::now().to_rfc3339(),
            report_format: "application/json".to_string(),
        },
        summary: Summary {
            total_vulnerabilities: report.vulnerabilities.len(),
            high: report.count(Severity::High),
            medium: report.count(Severity::Medium),
            low: report.count(Severity::Low),
            dom_hints: report.dom_hints.len(),
        },
        report,
    };

    let json = serde_json::to_string_pretty(&document)?;
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ScanMode;
    use crate::core::stats::ScanStats;
    use crate::xss::waf::WafProfile;

    #[test]
    fn test_render_empty_report() {
        let report = ScanReport {
            target: "http://example.com/?q=1".to_string(),
            mode: ScanMode::Fast,
            waf: WafProfile::none(),
            vulnerabilities: Vec::new(),
            dom_hints: Vec::new(),
            stats: ScanStats::new().snapshot(),
            warnings: vec!["callback missing".to_string()],
            cancelled: false,
        };
        let json = render(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["scanMetadata"]["tool"], "XPROBE");
        assert_eq!(value["summary"]["totalVulnerabilities"], 0);
        assert_eq!(value["target"], "http://example.com/?q=1");
        assert_eq!(value["warnings"][0], "callback missing");
    }
}
