use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interpret::{ConfidenceTier, Recommendation};

/// Wire and feature names of the ten questionnaire items, in order.
pub const ITEM_COLUMNS: [&str; 10] = [
    "A1_Score", "A2_Score", "A3_Score", "A4_Score", "A5_Score", "A6_Score", "A7_Score",
    "A8_Score", "A9_Score", "A10_Score",
];

pub const POSITIVE_LABEL: &str = "ASD";
pub const NEGATIVE_LABEL: &str = "No ASD";

pub fn prediction_label(predicted_class: u8) -> &'static str {
    if predicted_class == 1 {
        POSITIVE_LABEL
    } else {
        NEGATIVE_LABEL
    }
}

/// One questionnaire as submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireRecord {
    #[serde(rename = "A1_Score")]
    pub a1_score: i32,
    #[serde(rename = "A2_Score")]
    pub a2_score: i32,
    #[serde(rename = "A3_Score")]
    pub a3_score: i32,
    #[serde(rename = "A4_Score")]
    pub a4_score: i32,
    #[serde(rename = "A5_Score")]
    pub a5_score: i32,
    #[serde(rename = "A6_Score")]
    pub a6_score: i32,
    #[serde(rename = "A7_Score")]
    pub a7_score: i32,
    #[serde(rename = "A8_Score")]
    pub a8_score: i32,
    #[serde(rename = "A9_Score")]
    pub a9_score: i32,
    #[serde(rename = "A10_Score")]
    pub a10_score: i32,
    pub age: i32,
    pub gender: String,
    #[serde(alias = "jaundice")]
    pub jundice: String,
    #[serde(alias = "austim")]
    pub autism: String,
    pub used_app_before: String,
}

impl QuestionnaireRecord {
    pub fn item_scores(&self) -> [i32; 10] {
        [
            self.a1_score,
            self.a2_score,
            self.a3_score,
            self.a4_score,
            self.a5_score,
            self.a6_score,
            self.a7_score,
            self.a8_score,
            self.a9_score,
            self.a10_score,
        ]
    }

    /// The categorical fields by their artifact names.
    pub fn categorical_fields(&self) -> [(&'static str, &str); 4] {
        [
            ("gender", self.gender.as_str()),
            ("jundice", self.jundice.as_str()),
            ("autism", self.autism.as_str()),
            ("used_app_before", self.used_app_before.as_str()),
        ]
    }

    /// Request-level checks applied before the record reaches the pipeline.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        for (column, score) in ITEM_COLUMNS.iter().zip(self.item_scores()) {
            if !(0..=1).contains(&score) {
                problems.push(format!("{column} must be 0 or 1, got {score}"));
            }
        }

        if !(1..=100).contains(&self.age) {
            problems.push(format!("age must be between 1 and 100, got {}", self.age));
        }

        if !matches!(self.gender.as_str(), "m" | "f" | "M" | "F") {
            problems.push(format!("gender must be one of m, f, got {:?}", self.gender));
        }

        for (field, value) in [
            ("jundice", &self.jundice),
            ("autism", &self.autism),
            ("used_app_before", &self.used_app_before),
        ] {
            if value != "yes" && value != "no" {
                problems.push(format!("{field} must be yes or no, got {value:?}"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub predicted_class: u8,
    pub probability: f64,
    pub confidence_tier: ConfidenceTier,
    pub recommendation: Recommendation,
    pub model_identifier: String,
}

impl PredictionResult {
    pub fn label(&self) -> &'static str {
        prediction_label(self.predicted_class)
    }
}

/// Identifiers assigned when a screening and its result are persisted.
#[derive(Debug, Clone)]
pub struct StoredPrediction {
    pub result_id: Uuid,
    pub screening_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionOutput {
    pub id: Uuid,
    pub screening_id: Uuid,
    pub prediction: String,
    pub predicted_class: u8,
    pub probability: f64,
    pub confidence: String,
    pub recommendation: String,
    pub model_type: String,
    pub created_at: DateTime<Utc>,
}

impl PredictionOutput {
    pub fn new(result: &PredictionResult, stored: &StoredPrediction) -> Self {
        Self {
            id: stored.result_id,
            screening_id: stored.screening_id,
            prediction: result.label().to_string(),
            predicted_class: result.predicted_class,
            probability: result.probability,
            confidence: result.confidence_tier.to_string(),
            recommendation: result.recommendation.to_string(),
            model_type: result.model_identifier.clone(),
            created_at: stored.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentScreening {
    pub id: Uuid,
    pub age: i32,
    pub gender: String,
    pub created_at: DateTime<Utc>,
    pub prediction: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_screenings: i64,
    pub positive_cases: i64,
    pub negative_cases: i64,
    pub positive_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Kpis {
    pub total_screenings: i64,
    pub total_results: i64,
    pub positive_cases: i64,
    pub negative_cases: i64,
    pub positive_rate: f64,
    pub avg_age: f64,
    pub recent_screenings_7d: i64,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeBucket {
    pub range: String,
    pub total: i64,
    pub positive: i64,
    pub negative: i64,
    pub positive_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenderBreakdown {
    pub gender: String,
    pub total: i64,
    pub positive: i64,
    pub negative: i64,
    pub positive_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceBucket {
    pub range: String,
    pub count: i64,
    pub positive: i64,
    pub negative: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub total: i64,
    pub positive: i64,
    pub negative: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskFactorBreakdown {
    pub factor: String,
    pub value: String,
    pub total: i64,
    pub positive: i64,
    pub positive_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskFactors {
    pub jundice: Vec<RiskFactorBreakdown>,
    pub family_history: Vec<RiskFactorBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionScore {
    pub question: String,
    pub positive_avg: f64,
    pub negative_avg: f64,
    pub total_avg: f64,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_record() -> QuestionnaireRecord {
        QuestionnaireRecord {
            a1_score: 1,
            a2_score: 1,
            a3_score: 1,
            a4_score: 1,
            a5_score: 1,
            a6_score: 1,
            a7_score: 1,
            a8_score: 1,
            a9_score: 1,
            a10_score: 1,
            age: 5,
            gender: "m".to_string(),
            jundice: "yes".to_string(),
            autism: "no".to_string(),
            used_app_before: "no".to_string(),
        }
    }

    #[test]
    fn deserializes_wire_names_and_aliases() {
        let json = r#"{
            "A1_Score": 1, "A2_Score": 0, "A3_Score": 1, "A4_Score": 0, "A5_Score": 1,
            "A6_Score": 0, "A7_Score": 1, "A8_Score": 0, "A9_Score": 1, "A10_Score": 0,
            "age": 7, "gender": "F", "jaundice": "no", "austim": "yes", "used_app_before": "no"
        }"#;
        let record: QuestionnaireRecord = serde_json::from_str(json).expect("parse record");
        assert_eq!(record.item_scores(), [1, 0, 1, 0, 1, 0, 1, 0, 1, 0]);
        assert_eq!(record.jundice, "no");
        assert_eq!(record.autism, "yes");
        assert!(record.validate().is_ok());
    }

    #[test]
    fn validate_accepts_sample() {
        assert!(sample_record().validate().is_ok());
    }

    #[test]
    fn validate_reports_every_bad_field() {
        let mut record = sample_record();
        record.a3_score = 2;
        record.age = 0;
        record.gender = "x".to_string();
        record.jundice = "maybe".to_string();

        let problems = record.validate().unwrap_err();
        assert_eq!(problems.len(), 4);
        assert!(problems[0].contains("A3_Score"));
        assert!(problems[1].contains("age"));
        assert!(problems[2].contains("gender"));
        assert!(problems[3].contains("jundice"));
    }

    #[test]
    fn validate_bounds_age_at_one_hundred() {
        let mut record = sample_record();
        record.age = 100;
        assert!(record.validate().is_ok());
        record.age = 101;
        assert!(record.validate().is_err());
    }

    #[test]
    fn labels_follow_class() {
        assert_eq!(prediction_label(1), "ASD");
        assert_eq!(prediction_label(0), "No ASD");
    }
}
