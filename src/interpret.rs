//! Turns a class and probability into a confidence tier and a recommendation.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::VeryHigh => "Very High",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    PriorityReferral,
    RecommendedReferral,
    ConsiderReferral,
    Monitor,
    RoutineFollowUp,
}

impl Recommendation {
    pub fn text(&self) -> &'static str {
        match self {
            Self::PriorityReferral => "Priority referral for specialist evaluation.",
            Self::RecommendedReferral => "Referral for specialist evaluation recommended.",
            Self::ConsiderReferral => {
                "Consider referral for evaluation. Re-evaluate in 3 months."
            }
            Self::Monitor => "Monitoring recommended. Re-evaluate in 6 months.",
            Self::RoutineFollowUp => "Low risk. Maintain routine follow-up.",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interpretation {
    pub confidence_tier: ConfidenceTier,
    pub recommendation: Recommendation,
}

pub fn interpret(predicted_class: u8, probability: f64) -> Interpretation {
    Interpretation {
        confidence_tier: confidence_tier(probability),
        recommendation: recommendation(predicted_class, probability),
    }
}

/// Tier by distance of the probability from 0.5, independent of the decision threshold.
pub fn confidence_tier(probability: f64) -> ConfidenceTier {
    let distance = (probability - 0.5).abs();

    if distance >= 0.4 {
        ConfidenceTier::VeryHigh
    } else if distance >= 0.3 {
        ConfidenceTier::High
    } else if distance >= 0.2 {
        ConfidenceTier::Medium
    } else {
        ConfidenceTier::Low
    }
}

pub fn recommendation(predicted_class: u8, probability: f64) -> Recommendation {
    if predicted_class == 1 {
        if probability >= 0.8 {
            Recommendation::PriorityReferral
        } else if probability >= 0.6 {
            Recommendation::RecommendedReferral
        } else {
            Recommendation::ConsiderReferral
        }
    } else if probability >= 0.4 {
        Recommendation::Monitor
    } else {
        Recommendation::RoutineFollowUp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_follow_distance_breakpoints() {
        assert_eq!(confidence_tier(0.5), ConfidenceTier::Low);
        assert_eq!(confidence_tier(0.65), ConfidenceTier::Low);
        assert_eq!(confidence_tier(0.75), ConfidenceTier::Medium);
        assert_eq!(confidence_tier(0.85), ConfidenceTier::High);
        assert_eq!(confidence_tier(0.9), ConfidenceTier::VeryHigh);
        assert_eq!(confidence_tier(0.05), ConfidenceTier::VeryHigh);
        assert_eq!(confidence_tier(0.25), ConfidenceTier::Medium);
        assert_eq!(confidence_tier(1.0), ConfidenceTier::VeryHigh);
    }

    #[test]
    fn positive_referral_is_inclusive_at_point_eight() {
        assert_eq!(recommendation(1, 0.8), Recommendation::PriorityReferral);
        assert_eq!(recommendation(1, 0.79), Recommendation::RecommendedReferral);
        assert_eq!(recommendation(1, 0.6), Recommendation::RecommendedReferral);
        assert_eq!(recommendation(1, 0.55), Recommendation::ConsiderReferral);
    }

    #[test]
    fn negative_class_splits_at_point_four() {
        assert_eq!(recommendation(0, 0.4), Recommendation::Monitor);
        assert_eq!(recommendation(0, 0.45), Recommendation::Monitor);
        assert_eq!(recommendation(0, 0.39), Recommendation::RoutineFollowUp);
        assert_eq!(recommendation(0, 0.0), Recommendation::RoutineFollowUp);
    }

    #[test]
    fn interpret_is_deterministic() {
        for &(class, probability) in &[(0u8, 0.12), (1, 0.97), (1, 0.61), (0, 0.48)] {
            assert_eq!(interpret(class, probability), interpret(class, probability));
        }
    }

    #[test]
    fn display_labels() {
        assert_eq!(ConfidenceTier::VeryHigh.to_string(), "Very High");
        assert_eq!(
            Recommendation::RoutineFollowUp.to_string(),
            "Low risk. Maintain routine follow-up."
        );
    }
}
