//! Decision Agent: the merge verdict.
//!
//! A pure function over the post-enrichment findings. The matrix is
//! evaluated top to bottom and the first matching row wins:
//!
//! | condition                      | verdict         | risk     |
//! |--------------------------------|-----------------|----------|
//! | any critical                   | BLOCK           | critical |
//! | more than 3 high               | BLOCK           | high     |
//! | 1 to 3 high                    | REQUEST_CHANGES | high     |
//! | more than 5 medium             | REQUEST_CHANGES | medium   |
//! | 1 to 5 medium                  | APPROVE         | medium   |
//! | only low, or none              | APPROVE         | low      |

use std::sync::Arc;

use async_trait::async_trait;

use super::patch::generate_patches;
use super::{Agent, AgentError, StateUpdate};
use crate::models::{
    AgentRole, Decision, FindingCategory, Patch, Severity, SeverityCounts, Verdict, WorkflowState,
};

const MAX_HIGH_BEFORE_BLOCK: usize = 3;
const MAX_MEDIUM_BEFORE_CHANGES: usize = 5;

/// Verdict and risk level for a set of severity counts.
pub fn verdict_for(counts: &SeverityCounts) -> (Verdict, Severity) {
    if counts.critical > 0 {
        (Verdict::Block, Severity::Critical)
    } else if counts.high > MAX_HIGH_BEFORE_BLOCK {
        (Verdict::Block, Severity::High)
    } else if counts.high > 0 {
        (Verdict::RequestChanges, Severity::High)
    } else if counts.medium > MAX_MEDIUM_BEFORE_CHANGES {
        (Verdict::RequestChanges, Severity::Medium)
    } else if counts.medium > 0 {
        (Verdict::Approve, Severity::Medium)
    } else {
        (Verdict::Approve, Severity::Low)
    }
}

/// Decide a run. Deterministic: equal states give equal decisions.
pub fn decide(state: &WorkflowState) -> Decision {
    synthesize(state).0
}

/// Decision plus the patches its recommendations refer to.
pub fn synthesize(state: &WorkflowState) -> (Decision, Vec<Patch>) {
    let counts = SeverityCounts::from_severities(
        state.all_findings().map(|f| state.effective_severity(f)),
    );
    let (verdict, risk_level) = verdict_for(&counts);
    let patches = generate_patches(state);

    let decision = Decision {
        verdict,
        risk_level,
        summary: summary(state, &counts),
        recommendations: recommendations(state, verdict, risk_level, &patches),
        counts,
    };
    (decision, patches)
}

fn summary(state: &WorkflowState, counts: &SeverityCounts) -> String {
    let per_category: Vec<String> = FindingCategory::ALL
        .iter()
        .map(|c| format!("{c}: {}", state.findings(*c).len()))
        .collect();
    format!(
        "{} finding(s) ({}): {} critical, {} high, {} medium, {} low.",
        counts.total,
        per_category.join(", "),
        counts.critical,
        counts.high,
        counts.medium,
        counts.low
    )
}

fn recommendations(
    state: &WorkflowState,
    verdict: Verdict,
    risk_level: Severity,
    patches: &[Patch],
) -> Vec<String> {
    let lead = match (verdict, risk_level) {
        (Verdict::Block, Severity::Critical) => {
            "Do not merge: resolve the critical findings before anything else."
        }
        (Verdict::Block, _) => "Do not merge: too many high-severity findings.",
        (Verdict::RequestChanges, Severity::High) => {
            "Address the high-severity findings before merging."
        }
        (Verdict::RequestChanges, _) => "Reduce the number of medium-severity findings before merging.",
        (Verdict::Approve, Severity::Medium) => "Safe to merge; consider the medium-severity findings.",
        (Verdict::Approve, _) => "Safe to merge.",
    };

    let mut lines = vec![lead.to_string()];
    for finding in state.all_findings() {
        let severity = state.effective_severity(finding);
        if let Some(patch) = patches.iter().find(|p| p.finding_id == finding.id) {
            lines.push(format!(
                "[{}] {} at {}: apply the generated {} patch.",
                finding.id,
                finding.kind,
                finding.location(),
                patch.kind
            ));
        } else if severity >= Severity::Medium {
            let advice = finding.suggestion.as_deref().unwrap_or(&finding.description);
            lines.push(format!(
                "[{}] {} at {} ({severity}): {advice}",
                finding.id,
                finding.kind,
                finding.location()
            ));
        }
    }
    lines
}

/// Registry entry for the decision role.
pub struct DecisionAgent;

#[async_trait]
impl Agent for DecisionAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Decision
    }

    async fn run(&self, state: Arc<WorkflowState>) -> Result<StateUpdate, AgentError> {
        let (decision, patches) = synthesize(&state);
        tracing::debug!(
            run_id = %state.run_id,
            verdict = %decision.verdict,
            patches = patches.len(),
            "decision made"
        );
        Ok(StateUpdate::Decision { decision, patches })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentResponse, AnalysisContext, CodeSnippet, Enrichment, Finding};
    use pretty_assertions::assert_eq;

    fn counts(critical: usize, high: usize, medium: usize, low: usize) -> SeverityCounts {
        SeverityCounts {
            total: critical + high + medium + low,
            critical,
            high,
            medium,
            low,
        }
    }

    fn state_with(severities: &[Severity]) -> WorkflowState {
        let ctx = AnalysisContext::new("org/repo", "1", "alice")
            .with_snippet(CodeSnippet::new("a.py", "x = 1\n"));
        let mut state = WorkflowState::new("run", Arc::new(ctx));
        let findings = severities
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let mut f = Finding::new(FindingCategory::Logic, "Edge Case", *s, "d", "a.py", 1);
                f.id = format!("logic-{}", i + 1);
                f
            })
            .collect();
        state.set_response(
            FindingCategory::Logic,
            AgentResponse {
                success: true,
                findings,
                ..Default::default()
            },
        );
        state
    }

    #[test]
    fn single_critical_blocks() {
        let d = decide(&state_with(&[Severity::Critical]));
        assert_eq!((d.verdict, d.risk_level), (Verdict::Block, Severity::Critical));
    }

    #[test]
    fn four_high_blocks() {
        let d = decide(&state_with(&[Severity::High; 4]));
        assert_eq!((d.verdict, d.risk_level), (Verdict::Block, Severity::High));
    }

    #[test]
    fn two_high_request_changes() {
        let d = decide(&state_with(&[Severity::High; 2]));
        assert_eq!((d.verdict, d.risk_level), (Verdict::RequestChanges, Severity::High));
    }

    #[test]
    fn no_findings_approves() {
        let d = decide(&state_with(&[]));
        assert_eq!((d.verdict, d.risk_level), (Verdict::Approve, Severity::Low));
        assert_eq!(d.counts.total, 0);
        assert_eq!(d.recommendations, vec!["Safe to merge.".to_string()]);
    }

    #[test]
    fn matrix_boundaries() {
        assert_eq!(verdict_for(&counts(0, 3, 0, 0)), (Verdict::RequestChanges, Severity::High));
        assert_eq!(verdict_for(&counts(0, 0, 6, 0)), (Verdict::RequestChanges, Severity::Medium));
        assert_eq!(verdict_for(&counts(0, 0, 5, 0)), (Verdict::Approve, Severity::Medium));
        assert_eq!(verdict_for(&counts(0, 0, 0, 20)), (Verdict::Approve, Severity::Low));
    }

    #[test]
    fn escalating_one_finding_is_never_less_strict() {
        for critical in 0..2 {
            for high in 0..6 {
                for medium in 0..8 {
                    for low in 0..3 {
                        let mut set = vec![Severity::Critical; critical];
                        set.extend(vec![Severity::High; high]);
                        set.extend(vec![Severity::Medium; medium]);
                        set.extend(vec![Severity::Low; low]);
                        let base = verdict_for(&SeverityCounts::from_severities(set.iter().copied())).0;
                        for i in 0..set.len() {
                            let mut escalated = set.clone();
                            escalated[i] = escalated[i].escalate();
                            let next = verdict_for(&SeverityCounts::from_severities(escalated)).0;
                            assert!(next >= base, "{set:?}: escalating #{i} lowered the verdict");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn decide_is_idempotent() {
        let state = state_with(&[Severity::High, Severity::Medium, Severity::Low]);
        assert_eq!(decide(&state), decide(&state));
    }

    #[test]
    fn enrichment_overlay_is_respected() {
        let mut state = state_with(&[Severity::High]);
        let mut enrichment = Enrichment::default();
        enrichment.adjusted.insert("logic-1".into(), Severity::Critical);
        state.enrichment = Some(enrichment);
        let d = decide(&state);
        assert_eq!(d.verdict, Verdict::Block);
        assert_eq!(d.counts.critical, 1);
    }

    #[test]
    fn summary_lists_counts() {
        let d = decide(&state_with(&[Severity::High, Severity::Low]));
        assert_eq!(
            d.summary,
            "2 finding(s) (security: 0, quality: 0, logic: 2): 0 critical, 1 high, 0 medium, 1 low."
        );
    }

    #[test]
    fn recommendations_cover_patches_and_unpatched_findings() {
        let ctx = AnalysisContext::new("org/repo", "1", "alice").with_snippet(CodeSnippet::new(
            "app/auth.py",
            "admin_pass = \"superSecret123\"\n",
        ));
        let mut state = WorkflowState::new("run", Arc::new(ctx));
        let mut secret = Finding::new(
            FindingCategory::Security,
            "Hardcoded Secret",
            Severity::Critical,
            "literal password",
            "app/auth.py",
            1,
        );
        secret.id = "sec-1".into();
        let mut naming = Finding::new(
            FindingCategory::Quality,
            "Naming",
            Severity::Medium,
            "unclear name",
            "app/auth.py",
            1,
        );
        naming.id = "qual-1".into();
        naming.suggestion = Some("rename to admin_password".into());
        let mut minor = naming.clone();
        minor.id = "qual-2".into();
        minor.severity = Severity::Low;

        state.set_response(
            FindingCategory::Security,
            AgentResponse { success: true, findings: vec![secret], ..Default::default() },
        );
        state.set_response(
            FindingCategory::Quality,
            AgentResponse { success: true, findings: vec![naming, minor], ..Default::default() },
        );

        let (decision, patches) = synthesize(&state);
        assert_eq!(patches.len(), 1);
        assert_eq!(
            decision.recommendations,
            vec![
                "Do not merge: resolve the critical findings before anything else.".to_string(),
                "[sec-1] Hardcoded Secret at app/auth.py:1: apply the generated hardcoded-secret patch."
                    .to_string(),
                "[qual-1] Naming at app/auth.py:1 (medium): rename to admin_password".to_string(),
            ]
        );
    }
}
