use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Moderator, Round};
use crate::error::ModerationError;
use crate::history::Verdict;

/// Reproducible approval rules for tests and offline runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalRule {
    Always,
    Never,
    /// Approve once the round number reaches `t`
    AtRound(u32),
    /// Approve when any contribution contains the text
    ContainsText(String),
}

impl ApprovalRule {
    pub fn approves(&self, round: &Round) -> bool {
        match self {
            ApprovalRule::Always => true,
            ApprovalRule::Never => false,
            ApprovalRule::AtRound(t) => round.number >= *t,
            ApprovalRule::ContainsText(needle) => round
                .contributions
                .iter()
                .any(|c| c.content.contains(needle.as_str())),
        }
    }

    fn describe(&self) -> String {
        match self {
            ApprovalRule::Always => "always approve".to_string(),
            ApprovalRule::Never => "never approve".to_string(),
            ApprovalRule::AtRound(t) => format!("approve at round {}", t),
            ApprovalRule::ContainsText(needle) => format!("approve when a draft contains {:?}", needle),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuleModerator {
    rule: ApprovalRule,
}

impl RuleModerator {
    pub fn new(rule: ApprovalRule) -> Self {
        Self { rule }
    }
}

#[async_trait]
impl Moderator for RuleModerator {
    async fn evaluate(&self, round: &Round, _criteria: &str) -> Result<Verdict, ModerationError> {
        let verdict = if self.rule.approves(round) {
            Verdict::approve(
                round.number,
                format!("Round {} accepted ({})", round.number, self.rule.describe()),
            )
            .with_score(1.0)
        } else {
            Verdict::reject(
                round.number,
                format!(
                    "Round {} needs another revision ({})",
                    round.number,
                    self.rule.describe()
                ),
            )
            .with_score(0.0)
        };
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Contribution;

    fn round(number: u32, content: &str) -> Round {
        Round::new(
            number,
            vec![Contribution {
                round: number,
                agent: "ResearchBot".to_string(),
                content: content.to_string(),
                index: 0,
            }],
        )
    }

    #[tokio::test]
    async fn test_at_round_rule() {
        let moderator = RuleModerator::new(ApprovalRule::AtRound(2));

        let first = moderator.evaluate(&round(1, "draft"), "c").await.unwrap();
        let second = moderator.evaluate(&round(2, "draft"), "c").await.unwrap();
        assert!(!first.approved);
        assert_eq!(first.round, 1);
        assert!(second.approved);
        assert_eq!(second.round, 2);
    }

    #[tokio::test]
    async fn test_contains_text_rule() {
        let moderator = RuleModerator::new(ApprovalRule::ContainsText("Paris".to_string()));

        assert!(moderator.evaluate(&round(1, "Paris, France"), "c").await.unwrap().approved);
        assert!(!moderator.evaluate(&round(1, "Lyon"), "c").await.unwrap().approved);
    }

    #[tokio::test]
    async fn test_never_rule_explains_rejection() {
        let moderator = RuleModerator::new(ApprovalRule::Never);
        let verdict = moderator.evaluate(&round(5, "draft"), "c").await.unwrap();
        assert!(!verdict.approved);
        assert!(verdict.feedback.contains("never approve"));
        assert_eq!(verdict.score, Some(0.0));
    }
}
