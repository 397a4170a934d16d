use crate::reporting::model::{ScanReport, Severity};
use std::fmt::Write;
use unicode_width::UnicodeWidthStr;

// ==============================
// BOX CONFIGURATION
// ==============================

const BOX_WIDTH: usize = 70;
const INNER_WIDTH: usize = BOX_WIDTH - 2;
const RULE_WIDTH: usize = 80;

fn top_border() -> String {
    format!("╔{}╗", "═".repeat(INNER_WIDTH))
}

fn middle_border() -> String {
    format!("╠{}╣", "═".repeat(INNER_WIDTH))
}

fn bottom_border() -> String {
    format!("╚{}╝", "═".repeat(INNER_WIDTH))
}

/// Left-aligned box line, padded by display width so emoji stay aligned.
fn box_line(content: &str) -> String {
    let padded = format!(" {} ", content);
    let padding = INNER_WIDTH.saturating_sub(UnicodeWidthStr::width(padded.as_str()));
    format!("║{}{}║", padded, " ".repeat(padding))
}

fn box_line_centered(content: &str) -> String {
    let padded = format!(" {} ", content);
    let width = UnicodeWidthStr::width(padded.as_str());
    if width >= INNER_WIDTH {
        return box_line(content);
    }
    let left = (INNER_WIDTH - width) / 2;
    let right = INNER_WIDTH - width - left;
    format!("║{}{}{}║", " ".repeat(left), padded, " ".repeat(right))
}

// ==============================
// MAIN REPORT RENDERER
// ==============================

pub fn render(report: &ScanReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, report);
    out
}

fn write_report(out: &mut String, report: &ScanReport) -> std::fmt::Result {
    let stats = &report.stats;

    writeln!(out, "\n{}", top_border())?;
    if report.vulnerabilities.is_empty() {
        writeln!(out, "{}", box_line_centered("🎉 SCAN COMPLETE"))?;
        writeln!(out, "{}", middle_border())?;
        writeln!(out, "{}", box_line("✅ No confirmed XSS"))?;
    } else {
        writeln!(out, "{}", box_line_centered("XSS VULNERABILITIES CONFIRMED"))?;
        writeln!(out, "{}", middle_border())?;
        writeln!(
            out,
            "{}",
            box_line(&format!("Total Vulnerabilities: {}", report.vulnerabilities.len()))
        )?;
        for severity in [Severity::High, Severity::Medium, Severity::Low] {
            let count = report.count(severity);
            if count > 0 {
                writeln!(out, "{}", box_line(&format!("{}: {}", severity, count)))?;
            }
        }
    }

    writeln!(out, "{}", middle_border())?;
    writeln!(out, "{}", box_line(&format!("Target: {}", report.target)))?;
    writeln!(out, "{}", box_line(&format!("Mode: {:?}", report.mode)))?;
    if report.waf.is_none() {
        writeln!(out, "{}", box_line("WAF: none detected"))?;
    } else {
        writeln!(
            out,
            "{}",
            box_line(&format!("🛡️ WAF: {} ({})", report.waf.vendor_label, report.waf.confidence))
        )?;
    }
    writeln!(
        out,
        "{}",
        box_line(&format!(
            "Requests: {}  Parameters: {}  Blocks: {}",
            stats.requests_sent, stats.parameters_tested, stats.waf_blocks
        ))
    )?;
    writeln!(
        out,
        "{}",
        box_line(&format!(
            "Filtered payloads: {}  Elapsed: {:.1}s",
            stats.filtered_payloads, stats.elapsed_seconds
        ))
    )?;
    if report.cancelled {
        writeln!(out, "{}", box_line("⚠️ Scan cancelled, results are partial"))?;
    }
    writeln!(out, "{}\n", bottom_border())?;

    for warning in &report.warnings {
        writeln!(out, "⚠️  {}", warning)?;
    }

    // ------------------------------
    // DETAILED FINDINGS
    // ------------------------------
    for (idx, v) in report.vulnerabilities.iter().enumerate() {
        writeln!(out, "{}", "═".repeat(RULE_WIDTH))?;
        writeln!(out, "FINDING #{}: Reflected XSS [{}]", idx + 1, v.severity())?;
        writeln!(out, "{}", "═".repeat(RULE_WIDTH))?;

        writeln!(out, "\n📍 LOCATION:")?;
        writeln!(out, "   Parameter:  {} ({})", v.parameter.name, v.parameter.location)?;
        writeln!(out, "   Endpoint:   {:?} {}", v.parameter.hints.method, v.parameter.hints.action)?;
        writeln!(out, "   Context:    {}", v.context.kind)?;
        writeln!(out, "   CWE:        {}", v.cwe)?;

        writeln!(out, "\n💉 PAYLOAD:")?;
        writeln!(out, "   {}", v.payload)?;
        if v.waf_bypassed {
            writeln!(out, "   WAF bypassed via: {}", v.technique_chain.join(" -> "))?;
        }

        writeln!(out, "\n🔍 EVIDENCE:")?;
        writeln!(out, "   Pass:         {}", v.test_mode)?;
        writeln!(out, "   Confidence:   {}", v.confidence)?;
        writeln!(out, "   Verified by:  {} payloads", v.verification_count)?;
        for line in v.context.raw_snippet.lines().filter(|l| !l.trim().is_empty()) {
            writeln!(out, "   | {}", line.trim())?;
        }

        writeln!(out, "\n📋 DESCRIPTION:")?;
        writeln!(out, "   {}", v.description())?;
        writeln!(out, "\n🛠️ REMEDIATION:")?;
        writeln!(out, "   {}", v.remediation())?;
        writeln!(out)?;
    }

    if !report.dom_hints.is_empty() {
        writeln!(out, "{}", "═".repeat(RULE_WIDTH))?;
        writeln!(out, "DOM LEADS (unverified, review manually):")?;
        writeln!(out, "{}", "═".repeat(RULE_WIDTH))?;
        for hint in &report.dom_hints {
            writeln!(
                out,
                "   [{}] {} -> {} ({})",
                hint.parameter,
                hint.source.as_deref().unwrap_or("-"),
                hint.sink,
                hint.category
            )?;
            writeln!(out, "      {}", hint.snippet)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ScanMode;
    use crate::core::stats::ScanStats;
    use crate::xss::waf::WafProfile;

    fn empty_report() -> ScanReport {
        ScanReport {
            target: "http://example.com/".to_string(),
            mode: ScanMode::Comprehensive,
            waf: WafProfile::none(),
            vulnerabilities: Vec::new(),
            dom_hints: Vec::new(),
            stats: ScanStats::new().snapshot(),
            warnings: Vec::new(),
            cancelled: true,
        }
    }

    #[test]
    fn test_box_lines_have_fixed_width() {
        let plain = box_line("abc");
        let emoji = box_line("🎉 done");
        assert_eq!(UnicodeWidthStr::width(plain.as_str()), BOX_WIDTH);
        assert_eq!(UnicodeWidthStr::width(emoji.as_str()), BOX_WIDTH);
    }

    #[test]
    fn test_render_empty_cancelled_report() {
        let text = render(&empty_report());
        assert!(text.contains("No confirmed XSS"));
        assert!(text.contains("Scan cancelled"));
        assert!(!text.contains("FINDING #"));
    }
}
