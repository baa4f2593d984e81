//! The screening pipeline: prepare, score, interpret.
//!
//! `Screener` owns the artifact and is shared read-only between request
//! handlers. Nothing here touches the database or the network.

use std::path::Path;

use crate::artifact::ModelArtifact;
use crate::error::Result;
use crate::features;
use crate::interpret;
use crate::models::{PredictionResult, QuestionnaireRecord};
use crate::scorer;

#[derive(Debug)]
pub struct Screener {
    artifact: ModelArtifact,
}

impl Screener {
    pub fn new(artifact: ModelArtifact) -> Self {
        Self { artifact }
    }

    /// Loads and validates the artifact; any failure here is fatal for the caller.
    pub fn load(path: &Path) -> Result<Self> {
        let artifact = ModelArtifact::load(path)?;
        tracing::info!(
            path = %path.display(),
            model_type = artifact.model_type(),
            features = artifact.feature_count(),
            threshold = artifact.threshold(),
            "model artifact loaded"
        );
        Ok(Self::new(artifact))
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn screen(&self, record: &QuestionnaireRecord) -> Result<PredictionResult> {
        let features = features::prepare(record, self.artifact.schema())?;
        let score = scorer::score(&features, &self.artifact)?;
        let interpretation = interpret::interpret(score.predicted_class, score.probability);

        tracing::debug!(
            predicted_class = score.predicted_class,
            probability = score.probability,
            tier = %interpretation.confidence_tier,
            "screening scored"
        );

        Ok(PredictionResult {
            predicted_class: score.predicted_class,
            probability: score.probability,
            confidence_tier: interpretation.confidence_tier,
            recommendation: interpretation.recommendation,
            model_identifier: self.artifact.model_type().to_string(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::artifact::tests::sample_artifact;
    use crate::error::ScreeningError;
    use crate::interpret::{ConfidenceTier, Recommendation};
    use crate::models::tests::sample_record;

    pub(crate) fn sample_screener() -> Screener {
        Screener::new(sample_artifact())
    }

    #[test]
    fn end_to_end_positive_screening() {
        let result = sample_screener().screen(&sample_record()).expect("screen");
        assert_eq!(result.predicted_class, 1);
        assert_eq!(result.label(), "ASD");
        assert_eq!(result.confidence_tier, ConfidenceTier::VeryHigh);
        assert_eq!(result.recommendation, Recommendation::PriorityReferral);
        assert_eq!(result.model_identifier, "logistic_regression_v1");
    }

    #[test]
    fn identical_records_give_identical_results() {
        let screener = sample_screener();
        let first = screener.screen(&sample_record()).expect("screen");
        let second = screener.screen(&sample_record()).expect("screen");
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_category_surfaces_from_pipeline() {
        let mut record = sample_record();
        record.jundice = "maybe".to_string();
        assert!(matches!(
            sample_screener().screen(&record),
            Err(ScreeningError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn load_reads_shipped_artifact() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("models/tea_model.json");
        let screener = Screener::load(&path).expect("load");
        assert_eq!(screener.artifact().feature_count(), 14);
    }
}
