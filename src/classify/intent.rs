//! Intent analysis stage.
//!
//! Scores the decoded text against an ordered table of weighted keyword
//! groups. The table order is load-bearing: when two labels accumulate
//! equal weight, the earliest-registered label wins. Keep the rules in a
//! `Vec`, never a map.

use serde::{Deserialize, Serialize};

/// One weighted keyword within an intent rule. Matched case-insensitively
/// as a substring of the decoded text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentPattern {
    pub pattern: String,
    pub weight: f64,
}

impl IntentPattern {
    pub fn new(pattern: impl Into<String>, weight: f64) -> Self {
        Self {
            pattern: pattern.into(),
            weight,
        }
    }
}

/// A labelled group of weighted patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRule {
    pub label: String,
    pub patterns: Vec<IntentPattern>,
}

impl IntentRule {
    /// Total achievable weight for this rule, used to normalize confidence.
    pub fn total_weight(&self) -> f64 {
        self.patterns.iter().map(|p| p.weight).sum()
    }
}

/// Winning label plus its normalized confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentAnalysis {
    pub intent: String,
    pub confidence: f64,
}

/// Scores `text` against `rules` in registration order.
///
/// `prior` is the most recent conversation entry's intent with the bonus
/// weight it contributes. The bonus is additive and only applies to rules
/// that already matched at least one pattern: continuity nudges near-ties,
/// it never forces the prior label onto content with no signals of its own.
/// Returns the fallback label at confidence 0.0 when nothing scores.
pub fn analyze_intent(
    text: &str,
    rules: &[IntentRule],
    fallback: &str,
    prior: Option<(&str, f64)>,
) -> IntentAnalysis {
    let lower = text.to_ascii_lowercase();

    let mut best: Option<(usize, f64)> = None;
    for (index, rule) in rules.iter().enumerate() {
        let mut score: f64 = rule
            .patterns
            .iter()
            .filter(|p| lower.contains(&p.pattern.to_ascii_lowercase()))
            .map(|p| p.weight)
            .sum();

        if let Some((prior_label, bonus)) = prior {
            if score > 0.0 && rule.label == prior_label {
                score += bonus;
            }
        }

        // Strictly-greater comparison keeps the earliest rule on ties.
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ if score > 0.0 => best = Some((index, score)),
            _ => {}
        }
    }

    match best {
        Some((index, score)) => {
            let rule = &rules[index];
            let total = rule.total_weight();
            let confidence = if total > 0.0 {
                (score / total).clamp(0.0, 1.0)
            } else {
                0.0
            };
            IntentAnalysis {
                intent: rule.label.clone(),
                confidence,
            }
        }
        None => IntentAnalysis {
            intent: fallback.to_string(),
            confidence: 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> Vec<IntentRule> {
        vec![
            IntentRule {
                label: "invoice".into(),
                patterns: vec![
                    IntentPattern::new("invoice", 2.0),
                    IntentPattern::new("payment", 1.0),
                ],
            },
            IntentRule {
                label: "complaint".into(),
                patterns: vec![
                    IntentPattern::new("complaint", 2.0),
                    IntentPattern::new("problem", 1.0),
                ],
            },
        ]
    }

    #[test]
    fn test_highest_cumulative_weight_wins() {
        let analysis = analyze_intent(
            "There is a problem with this complaint about one payment",
            &rules(),
            "general",
            None,
        );
        // complaint: 2.0 + 1.0 = 3.0 beats invoice: 1.0
        assert_eq!(analysis.intent, "complaint");
        assert_eq!(analysis.confidence, 1.0);
    }

    #[test]
    fn test_tie_break_prefers_earliest_rule() {
        // invoice scores 2.0 (invoice), complaint scores 2.0 (complaint):
        // equal weight, so the earlier-registered label must win.
        let analysis = analyze_intent(
            "invoice attached regarding your complaint",
            &rules(),
            "general",
            None,
        );
        assert_eq!(analysis.intent, "invoice");
    }

    #[test]
    fn test_no_match_falls_back() {
        let analysis = analyze_intent("hello there", &rules(), "general", None);
        assert_eq!(analysis.intent, "general");
        assert_eq!(analysis.confidence, 0.0);
    }

    #[test]
    fn test_prior_bonus_breaks_near_tie() {
        // Both rules score 2.0 from the text; the prior pushes complaint
        // past the registration-order tie-break.
        let analysis = analyze_intent(
            "invoice attached regarding your complaint",
            &rules(),
            "general",
            Some(("complaint", 0.5)),
        );
        assert_eq!(analysis.intent, "complaint");
    }

    #[test]
    fn test_prior_alone_does_not_invent_confidence_above_one() {
        let analysis = analyze_intent(
            "complaint problem complaint",
            &rules(),
            "general",
            Some(("complaint", 5.0)),
        );
        assert_eq!(analysis.intent, "complaint");
        assert_eq!(analysis.confidence, 1.0);
    }

    #[test]
    fn test_prior_never_forces_label_onto_unrelated_text() {
        let analysis = analyze_intent(
            "weekly schedule attached",
            &rules(),
            "general",
            Some(("invoice", 0.5)),
        );
        assert_eq!(analysis.intent, "general");
        assert_eq!(analysis.confidence, 0.0);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let analysis = analyze_intent("INVOICE #99 PAYMENT DUE", &rules(), "general", None);
        assert_eq!(analysis.intent, "invoice");
        assert_eq!(analysis.confidence, 1.0);
    }
}
