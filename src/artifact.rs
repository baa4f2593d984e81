//! The trained model artifact.
//!
//! Training happens offline; this module only reads the exported JSON bundle
//! and checks every part of it up front, so a bad artifact fails at startup
//! instead of on the first request.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, ScreeningError};

pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Anything that can turn a scaled feature vector into a positive-class probability.
pub trait Classifier: Send + Sync {
    /// Probability of the positive class, in [0, 1].
    fn predict_probability(&self, features: &[f64]) -> f64;

    /// Class label at the given decision threshold (inclusive).
    fn predict(&self, features: &[f64], threshold: f64) -> u8 {
        u8::from(self.predict_probability(features) >= threshold)
    }

    fn kind(&self) -> &str;
}

/// Integer codes learned for one categorical column; a class's code is its position.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    pub fn encode(&self, value: &str) -> Option<usize> {
        self.classes.iter().position(|class| class == value)
    }
}

/// The parts of the artifact the feature preparer needs.
#[derive(Debug, Clone)]
pub struct ArtifactSchema {
    pub feature_names: Vec<String>,
    pub label_encoders: HashMap<String, LabelEncoder>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn transform(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect()
    }

    fn validate(&self, feature_count: usize) -> Result<()> {
        if self.mean.len() != feature_count || self.scale.len() != feature_count {
            return Err(ScreeningError::artifact(format!(
                "scaler has {} means and {} scales for {feature_count} features",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(ScreeningError::artifact("scaler mean contains non-finite values"));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ScreeningError::artifact(
                "scaler scale must be finite and positive",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogisticRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl Classifier for LogisticRegression {
    fn predict_probability(&self, features: &[f64]) -> f64 {
        let margin: f64 = self
            .coefficients
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        1.0 / (1.0 + (-margin).exp())
    }

    fn kind(&self) -> &str {
        "logistic_regression"
    }
}

/// One fitted decision tree in flat-array form. Leaves have `-1` children and
/// carry the positive-class fraction in `value`.
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

impl DecisionTree {
    fn is_leaf(&self, node: usize) -> bool {
        self.children_left[node] < 0
    }

    pub fn leaf_value(&self, features: &[f64]) -> f64 {
        let mut node = 0usize;
        while !self.is_leaf(node) {
            // Indices are range-checked when the artifact loads.
            let feature = self.feature[node] as usize;
            node = if features[feature] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        self.value[node]
    }

    fn validate(&self, index: usize, feature_count: usize) -> Result<()> {
        let nodes = self.children_left.len();
        if nodes == 0 {
            return Err(ScreeningError::artifact(format!("tree {index} has no nodes")));
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|&len| len != nodes)
        {
            return Err(ScreeningError::artifact(format!(
                "tree {index} has arrays of different lengths"
            )));
        }

        for node in 0..nodes {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left < 0 || right < 0 {
                if left >= 0 || right >= 0 {
                    return Err(ScreeningError::artifact(format!(
                        "tree {index} node {node} has exactly one child"
                    )));
                }
                let value = self.value[node];
                if !(0.0..=1.0).contains(&value) {
                    return Err(ScreeningError::artifact(format!(
                        "tree {index} leaf {node} value {value} is not a probability"
                    )));
                }
                continue;
            }
            // Children must point forward so traversal always terminates.
            let in_range = |child: i64| child as usize > node && (child as usize) < nodes;
            if !in_range(left) || !in_range(right) {
                return Err(ScreeningError::artifact(format!(
                    "tree {index} node {node} has children out of range"
                )));
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= feature_count {
                return Err(ScreeningError::artifact(format!(
                    "tree {index} node {node} splits on unknown feature {feature}"
                )));
            }
            if !self.threshold[node].is_finite() {
                return Err(ScreeningError::artifact(format!(
                    "tree {index} node {node} has a non-finite threshold"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RandomForest {
    pub trees: Vec<DecisionTree>,
}

impl Classifier for RandomForest {
    fn predict_probability(&self, features: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|tree| tree.leaf_value(features)).sum();
        total / self.trees.len() as f64
    }

    fn kind(&self) -> &str {
        "random_forest"
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ModelSpec {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
}

impl ModelSpec {
    fn validate(self, feature_count: usize) -> Result<Box<dyn Classifier>> {
        match self {
            Self::LogisticRegression(model) => {
                if model.coefficients.len() != feature_count {
                    return Err(ScreeningError::artifact(format!(
                        "logistic model has {} coefficients for {feature_count} features",
                        model.coefficients.len()
                    )));
                }
                if model.coefficients.iter().any(|c| !c.is_finite())
                    || !model.intercept.is_finite()
                {
                    return Err(ScreeningError::artifact(
                        "logistic model has non-finite parameters",
                    ));
                }
                Ok(Box::new(model))
            }
            Self::RandomForest(forest) => {
                if forest.trees.is_empty() {
                    return Err(ScreeningError::artifact("random forest has no trees"));
                }
                for (index, tree) in forest.trees.iter().enumerate() {
                    tree.validate(index, feature_count)?;
                }
                Ok(Box::new(forest))
            }
        }
    }
}

/// Raw document shape; required keys are optional here so their absence can be named.
#[derive(Debug, Deserialize)]
struct ArtifactFile {
    model: Option<ModelSpec>,
    scaler: Option<StandardScaler>,
    feature_names: Option<Vec<String>>,
    threshold: Option<f64>,
    model_type: Option<String>,
    #[serde(default)]
    label_encoders: HashMap<String, Vec<String>>,
}

/// A loaded, validated artifact. Immutable after load.
pub struct ModelArtifact {
    schema: ArtifactSchema,
    scaler: StandardScaler,
    model: Box<dyn Classifier>,
    threshold: f64,
    model_type: String,
}

impl std::fmt::Debug for ModelArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelArtifact")
            .field("model_type", &self.model_type)
            .field("model_kind", &self.model.kind())
            .field("threshold", &self.threshold)
            .field("feature_names", &self.schema.feature_names)
            .finish()
    }
}

impl ModelArtifact {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ScreeningError::artifact(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: ArtifactFile = serde_json::from_str(raw)
            .map_err(|err| ScreeningError::artifact(format!("invalid artifact JSON: {err}")))?;

        let model = file
            .model
            .ok_or_else(|| ScreeningError::artifact("missing required key `model`"))?;
        let scaler = file
            .scaler
            .ok_or_else(|| ScreeningError::artifact("missing required key `scaler`"))?;
        let feature_names = file
            .feature_names
            .ok_or_else(|| ScreeningError::artifact("missing required key `feature_names`"))?;

        if feature_names.is_empty() {
            return Err(ScreeningError::artifact("feature_names is empty"));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = feature_names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(ScreeningError::artifact(format!(
                "feature {duplicate:?} is declared twice"
            )));
        }

        scaler.validate(feature_names.len())?;

        let threshold = file.threshold.unwrap_or(DEFAULT_THRESHOLD);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ScreeningError::artifact(format!(
                "threshold {threshold} is outside [0, 1]"
            )));
        }

        let mut label_encoders = HashMap::new();
        for (field, classes) in file.label_encoders {
            if classes.is_empty() {
                return Err(ScreeningError::artifact(format!(
                    "encoder for {field} has no classes"
                )));
            }
            let unique: HashSet<&str> = classes.iter().map(String::as_str).collect();
            if unique.len() != classes.len() {
                return Err(ScreeningError::artifact(format!(
                    "encoder for {field} repeats a class"
                )));
            }
            label_encoders.insert(field, LabelEncoder::new(classes));
        }

        let model = model.validate(feature_names.len())?;
        let model_type = file.model_type.unwrap_or_else(|| model.kind().to_string());

        Ok(Self {
            schema: ArtifactSchema {
                feature_names,
                label_encoders,
            },
            scaler,
            model,
            threshold,
            model_type,
        })
    }

    pub fn schema(&self) -> &ArtifactSchema {
        &self.schema
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn model(&self) -> &dyn Classifier {
        self.model.as_ref()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    pub fn feature_count(&self) -> usize {
        self.schema.feature_names.len()
    }
}
