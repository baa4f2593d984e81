//! Maps a questionnaire onto the feature vector the artifact was trained on.

use std::collections::HashMap;

use crate::artifact::ArtifactSchema;
use crate::error::{Result, ScreeningError};
use crate::models::{QuestionnaireRecord, ITEM_COLUMNS};

/// Feature values in artifact order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// Brings categorical text into the vocabulary the encoders were fit on.
pub fn normalize_category(field: &str, value: &str) -> String {
    let value = value.trim().to_lowercase();
    match (field, value.as_str()) {
        ("gender", "m") => "male".to_string(),
        ("gender", "f") => "female".to_string(),
        _ => value,
    }
}

pub fn prepare(raw: &QuestionnaireRecord, schema: &ArtifactSchema) -> Result<FeatureVector> {
    let mut available: HashMap<String, f64> = HashMap::new();

    for (column, score) in ITEM_COLUMNS.iter().zip(raw.item_scores()) {
        available.insert((*column).to_string(), f64::from(score));
    }
    available.insert("age".to_string(), f64::from(raw.age));

    for (field, value) in raw.categorical_fields() {
        let Some(encoder) = schema.label_encoders.get(field) else {
            continue;
        };
        let normalized = normalize_category(field, value);
        let code = encoder
            .encode(&normalized)
            .ok_or_else(|| ScreeningError::UnknownCategory {
                field: field.to_string(),
                value: normalized.clone(),
            })?;
        available.insert(format!("{field}_encoded"), code as f64);
    }

    let values = schema
        .feature_names
        .iter()
        .map(|name| {
            available
                .get(name)
                .copied()
                .ok_or_else(|| ScreeningError::MissingFeature(name.clone()))
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(FeatureVector {
        names: schema.feature_names.clone(),
        values,
    })
}
