use crate::artifact::ModelArtifact;
use crate::error::{Result, ScreeningError};
use crate::features::FeatureVector;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub predicted_class: u8,
    pub probability: f64,
}

/// Scales the prepared features and asks the artifact's model for a class and probability.
pub fn score(features: &FeatureVector, artifact: &ModelArtifact) -> Result<Score> {
    let expected = artifact.feature_count();
    if features.len() != expected {
        return Err(ScreeningError::FeatureCountMismatch {
            expected,
            actual: features.len(),
        });
    }
    let declared = &artifact.schema().feature_names;
    if let Some((position, (expected, actual))) = declared
        .iter()
        .zip(features.names())
        .enumerate()
        .find(|(_, (expected, actual))| expected != actual)
    {
        return Err(ScreeningError::FeatureOrderMismatch {
            position,
            expected: expected.clone(),
            actual: actual.clone(),
        });
    }

    let scaled = artifact.scaler().transform(features.values());
    let model = artifact.model();
    let probability = model.predict_probability(&scaled).clamp(0.0, 1.0);
    let predicted_class = model.predict(&scaled, artifact.threshold());

    Ok(Score {
        predicted_class,
        probability,
    })
}
