//! Terminal renderer: verdict banner, then findings grouped by analyzer
//! and file, then recommendations and proposed patches.

use colored::Colorize;

use crate::models::{Finding, FindingCategory, RunReport, Severity, Stage, Verdict};
use crate::output::OutputRenderer;

/// Terminal output renderer with colored, flowing text.
pub struct TerminalRenderer;

impl OutputRenderer for TerminalRenderer {
    fn render(&self, report: &RunReport) -> String {
        let mut output = String::new();

        if report.stage == Stage::Failed {
            output.push_str(&format!(
                " {} run {} failed\n",
                "✖".red().bold(),
                report.run_id.bold()
            ));
            for error in &report.errors {
                output.push_str(&format!("   {error}\n"));
            }
            return output;
        }

        if let Some(decision) = &report.decision {
            output.push_str(&format!(
                " {} {}  risk {}\n",
                verdict_badge(decision.verdict),
                report.repo.bold(),
                severity_label(decision.risk_level)
            ));
            output.push_str(&format!("   {}\n\n", decision.summary));
        }

        if report.findings().next().is_none() {
            output.push_str(&format!("{}", "  ✔ No issues found.\n".green()));
        }

        for category in FindingCategory::ALL {
            let Some(response) = category_response(report, category) else {
                continue;
            };
            if response.findings.is_empty() && response.errors.is_empty() {
                continue;
            }

            let source = if response.success { "" } else { " (heuristic fallback)" };
            output.push_str(&format!("{}{}\n", category.to_string().bold().underline(), source.dimmed()));

            let mut sorted: Vec<&Finding> = response.findings.iter().collect();
            sorted.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
            let mut current_file = "";
            for finding in sorted {
                if finding.file != current_file && !current_file.is_empty() {
                    output.push('\n');
                }
                current_file = &finding.file;
                render_finding(&mut output, report, finding);
            }
            for error in &response.errors {
                output.push_str(&format!("   {} {}\n", "!".yellow(), error.dimmed()));
            }
            output.push('\n');
        }

        if let Some(decision) = &report.decision {
            if !decision.recommendations.is_empty() {
                output.push_str(&format!("{}\n", "Recommendations".bold()));
                for rec in &decision.recommendations {
                    output.push_str(&format!("   {} {}\n", "→".cyan(), rec));
                }
                output.push('\n');
            }
        }

        for patch in &report.patches {
            let note = if patch.applicable { "" } else { " (line moved, review before applying)" };
            output.push_str(&format!(
                "{} {} for {}{}\n",
                "Patch".bold(),
                patch.kind,
                patch.finding_id,
                note.yellow()
            ));
            for line in patch.diff.lines() {
                let styled = if line.starts_with('+') && !line.starts_with("+++") {
                    line.green().to_string()
                } else if line.starts_with('-') && !line.starts_with("---") {
                    line.red().to_string()
                } else {
                    line.dimmed().to_string()
                };
                output.push_str(&format!("   {styled}\n"));
            }
            output.push('\n');
        }

        if let Some(decision) = &report.decision {
            let counts = &decision.counts;
            output.push_str(&format!("{}\n", "───────────────────────────────────".dimmed()));
            output.push_str(&format!(
                " {} findings: {} critical, {} high, {} medium, {} low\n",
                counts.total.to_string().bold(),
                counts.critical.to_string().red().bold(),
                counts.high.to_string().red(),
                counts.medium.to_string().yellow(),
                counts.low.to_string().blue(),
            ));
        }

        output
    }
}

fn category_response(report: &RunReport, category: FindingCategory) -> Option<&crate::models::AgentResponse> {
    match category {
        FindingCategory::Security => report.security.as_ref(),
        FindingCategory::Quality => report.quality.as_ref(),
        FindingCategory::Logic => report.logic.as_ref(),
    }
}

fn render_finding(output: &mut String, report: &RunReport, finding: &Finding) {
    let effective = report.effective_severity(finding);
    let icon = match effective {
        Severity::Critical | Severity::High => "✖".red().bold().to_string(),
        Severity::Medium => "⚠".yellow().bold().to_string(),
        Severity::Low => "ℹ".blue().bold().to_string(),
    };
    let adjusted = if effective != finding.severity {
        format!(" (was {})", finding.severity).dimmed().to_string()
    } else {
        String::new()
    };

    output.push_str(&format!(
        " {} {}{} in {}\n",
        icon,
        severity_label(effective),
        adjusted,
        finding.location().bold()
    ));
    output.push_str(&format!(
        "   {} {}: {}\n",
        finding.id.dimmed(),
        finding.kind.bold(),
        finding.description
    ));
    if let Some(suggestion) = &finding.suggestion {
        output.push_str(&format!("   {} {}\n", "→".cyan(), suggestion));
    }
}

fn severity_label(severity: Severity) -> String {
    let s = severity.to_string();
    match severity {
        Severity::Critical => s.red().bold().to_string(),
        Severity::High => s.red().to_string(),
        Severity::Medium => s.yellow().bold().to_string(),
        Severity::Low => s.blue().bold().to_string(),
    }
}

fn verdict_badge(verdict: Verdict) -> String {
    let s = verdict.to_string();
    match verdict {
        Verdict::Approve => format!("✔ {s}").green().bold().to_string(),
        Verdict::RequestChanges => format!("⚠ {s}").yellow().bold().to_string(),
        Verdict::Block => format!("✖ {s}").red().bold().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentResponse, Decision, Enrichment, Patch, PatchKind, SeverityCounts};

    fn report() -> RunReport {
        RunReport {
            run_id: "run-1".into(),
            repo: "org/repo".into(),
            change_id: "7".into(),
            stage: Stage::Done,
            trail: vec![Stage::Init, Stage::Analyzing, Stage::Routing, Stage::Deciding, Stage::Done],
            security: None,
            quality: None,
            logic: None,
            enrichment: None,
            decision: None,
            patches: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn finding(id: &str, severity: Severity, line: u32) -> Finding {
        let mut f = Finding::new(
            FindingCategory::Security,
            "Hardcoded Secret",
            severity,
            "password literal in source",
            "app/auth.py",
            line,
        );
        f.id = id.into();
        f.suggestion = Some("Load it from the environment".into());
        f
    }

    #[test]
    fn render_empty() {
        let mut r = report();
        r.decision = Some(Decision {
            verdict: Verdict::Approve,
            risk_level: Severity::Low,
            summary: "No issues found.".into(),
            recommendations: Vec::new(),
            counts: SeverityCounts::default(),
        });
        let output = TerminalRenderer.render(&r);
        assert!(output.contains("No issues found"));
        assert!(output.contains("APPROVE"));
    }

    #[test]
    fn render_findings_with_overlay_and_patch() {
        let mut r = report();
        r.security = Some(AgentResponse {
            success: false,
            findings: vec![finding("sec-1", Severity::Critical, 3), finding("sec-2", Severity::Medium, 9)],
            errors: vec!["provider timed out".into()],
            ..Default::default()
        });
        let mut enrichment = Enrichment::default();
        enrichment.adjusted.insert("sec-2".into(), Severity::High);
        r.enrichment = Some(enrichment);
        r.decision = Some(Decision {
            verdict: Verdict::Block,
            risk_level: Severity::Critical,
            summary: "1 critical issue.".into(),
            recommendations: vec!["Rotate the leaked credential".into()],
            counts: SeverityCounts::from_severities([Severity::Critical, Severity::High]),
        });
        r.patches.push(Patch {
            finding_id: "sec-1".into(),
            kind: PatchKind::HardcodedSecret,
            file: "app/auth.py".into(),
            line: 3,
            diff: "--- a/app/auth.py\n+++ b/app/auth.py\n-x = \"s\"\n+x = os.environ[\"X\"]\n".into(),
            applicable: true,
        });

        let output = TerminalRenderer.render(&r);
        assert!(output.contains("BLOCK"));
        assert!(output.contains("app/auth.py:3"));
        assert!(output.contains("(was medium)"));
        assert!(output.contains("heuristic fallback"));
        assert!(output.contains("provider timed out"));
        assert!(output.contains("Rotate the leaked credential"));
        assert!(output.contains("hardcoded-secret for sec-1"));
        assert!(output.contains("findings"));
    }

    #[test]
    fn render_failed_run() {
        let mut r = report();
        r.stage = Stage::Failed;
        r.errors.push("security analyzer fault: panicked".into());
        let output = TerminalRenderer.render(&r);
        assert!(output.contains("failed"));
        assert!(output.contains("panicked"));
    }
}
