//! Routing of model decisions into immediate actions or approval tasks.

/// Decides whether a decision is high-impact and must wait for a human.
pub trait ImpactPolicy: Send + Sync {
    fn is_high_impact(&self, decision: &str) -> bool;
}

/// Flags decisions that mention modifying, deleting, sending or executing.
#[derive(Debug, Clone)]
pub struct KeywordImpactPolicy {
    keywords: Vec<String>,
}

impl KeywordImpactPolicy {
    pub fn new(keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.into().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

impl Default for KeywordImpactPolicy {
    fn default() -> Self {
        Self::new([
            "修改", "删除", "发送", "执行", "modify", "delete", "send", "execute",
        ])
    }
}

impl ImpactPolicy for KeywordImpactPolicy {
    fn is_high_impact(&self, decision: &str) -> bool {
        let lowered = decision.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

/// Decisions split by impact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutedDecisions {
    /// High-impact decisions, to be stored as approval tasks.
    pub approvals: Vec<String>,
    /// Routine decisions, to be acted on this cycle.
    pub actions: Vec<String>,
}

/// Split decisions into approval-bound and routine ones, dropping blanks.
pub fn route_decisions(policy: &dyn ImpactPolicy, decisions: &[String]) -> RoutedDecisions {
    let mut routed = RoutedDecisions::default();
    for decision in decisions.iter().map(|d| d.trim()).filter(|d| !d.is_empty()) {
        if policy.is_high_impact(decision) {
            routed.approvals.push(decision.to_string());
        } else {
            routed.actions.push(decision.to_string());
        }
    }
    routed
}
