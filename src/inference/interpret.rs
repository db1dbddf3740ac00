//! Raw score interpretation
//!
//! Maps model output to a discrete label, a confidence and a normalised
//! per-class probability pair. The output convention comes from
//! configuration, so identical scores always yield identical results.

use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, Result};

use super::{InferenceConfig, OutputConvention, RawScores};

/// Slack allowed on sigmoid outputs that drift marginally outside [0, 1]
const SIGMOID_SLACK: f64 = 1e-6;

/// Class label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Cat,
    Dog,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Cat => "cat",
            Label::Dog => "dog",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-class probabilities; `cat + dog == 1` within float tolerance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub cat: f64,
    pub dog: f64,
}

impl ClassProbabilities {
    pub fn get(&self, label: Label) -> f64 {
        match label {
            Label::Cat => self.cat,
            Label::Dog => self.dog,
        }
    }
}

/// Immutable outcome of one classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationResult {
    label: Label,
    confidence: f64,
    probabilities: ClassProbabilities,
}

impl ClassificationResult {
    pub fn label(&self) -> Label {
        self.label
    }

    /// Probability of the chosen label
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn probabilities(&self) -> ClassProbabilities {
        self.probabilities
    }

    /// Wire representation with values rounded to 4 decimals
    pub fn to_response(&self) -> ClassificationResponse {
        ClassificationResponse {
            classification: self.label,
            confidence: round4(self.confidence),
            probabilities: ClassProbabilities {
                cat: round4(self.probabilities.cat),
                dog: round4(self.probabilities.dog),
            },
        }
    }
}

/// Outbound payload of a successful classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResponse {
    pub classification: Label,
    pub confidence: f64,
    pub probabilities: ClassProbabilities,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Converts [`RawScores`] into [`ClassificationResult`]s
#[derive(Debug, Clone)]
pub struct ResultInterpreter {
    convention: OutputConvention,
    tie_label: Label,
    tie_tolerance: f64,
}

impl ResultInterpreter {
    pub fn new(config: &InferenceConfig) -> Self {
        Self {
            convention: config.output_convention,
            tie_label: config.tie_label,
            tie_tolerance: f64::from(config.tie_tolerance),
        }
    }

    pub fn interpret(&self, scores: &RawScores) -> Result<ClassificationResult> {
        let probabilities = match (self.convention, scores) {
            (OutputConvention::Sigmoid, RawScores::Scalar(p_dog)) => from_sigmoid(*p_dog)?,
            (OutputConvention::Softmax, RawScores::Pair(logits)) => softmax(*logits)?,
            (OutputConvention::Probabilities, RawScores::Pair(probs)) => renormalise(*probs)?,
            (convention, scores) => {
                return Err(ClassifierError::InferenceError(format!(
                    "{} convention cannot interpret {} score(s)",
                    convention,
                    scores.width()
                )))
            }
        };

        let label = if (probabilities.dog - probabilities.cat).abs() <= self.tie_tolerance {
            self.tie_label
        } else if probabilities.dog > probabilities.cat {
            Label::Dog
        } else {
            Label::Cat
        };

        Ok(ClassificationResult {
            label,
            confidence: probabilities.get(label),
            probabilities,
        })
    }
}

fn from_sigmoid(p_dog: f32) -> Result<ClassProbabilities> {
    let p_dog = f64::from(p_dog);
    if !p_dog.is_finite() || p_dog < -SIGMOID_SLACK || p_dog > 1.0 + SIGMOID_SLACK {
        return Err(ClassifierError::InferenceError(format!(
            "sigmoid output {} is outside [0, 1]",
            p_dog
        )));
    }
    let dog = p_dog.clamp(0.0, 1.0);
    Ok(ClassProbabilities { cat: 1.0 - dog, dog })
}

fn softmax([cat, dog]: [f32; 2]) -> Result<ClassProbabilities> {
    let (cat, dog) = (f64::from(cat), f64::from(dog));
    if !cat.is_finite() || !dog.is_finite() {
        return Err(ClassifierError::InferenceError(format!(
            "non-finite logits [{}, {}]",
            cat, dog
        )));
    }
    let max = cat.max(dog);
    let e_cat = (cat - max).exp();
    let e_dog = (dog - max).exp();
    let sum = e_cat + e_dog;
    Ok(ClassProbabilities {
        cat: e_cat / sum,
        dog: e_dog / sum,
    })
}

fn renormalise([cat, dog]: [f32; 2]) -> Result<ClassProbabilities> {
    let (cat, dog) = (f64::from(cat), f64::from(dog));
    let valid = |p: f64| p.is_finite() && p >= 0.0;
    let sum = cat + dog;
    if !valid(cat) || !valid(dog) || sum <= 0.0 {
        return Err(ClassifierError::InferenceError(format!(
            "invalid class probabilities [{}, {}]",
            cat, dog
        )));
    }
    Ok(ClassProbabilities {
        cat: cat / sum,
        dog: dog / sum,
    })
}
