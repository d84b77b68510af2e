//! Filename metadata predictor
//!
//! A predictor is an explicitly constructed object injected where it is
//! needed (`Arc<dyn MetadataPredictor>`). Failures surface as
//! [`PredictorError`] and are never fatal to parsing: callers fall back to
//! heuristic output.

pub mod token_classifier;

pub use token_classifier::TokenClassifier;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Predictor errors
#[derive(Error, Debug)]
pub enum PredictorError {
    /// Model has no training data
    #[error("Predictor is not trained")]
    NotTrained,

    #[error("Model I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid predictor input: {0}")]
    InvalidInput(String),
}

/// One predicted field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub value: String,
    /// Predictor certainty (0.0-1.0)
    pub confidence: f64,
}

/// Per-field predictions for one filename; `None` = nothing predicted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predictions {
    pub title: Option<Prediction>,
    pub author: Option<Prediction>,
    pub series: Option<Prediction>,
    pub series_number: Option<Prediction>,
}

impl Predictions {
    /// Predicted fields that are present
    pub fn iter(&self) -> impl Iterator<Item = &Prediction> {
        [&self.title, &self.author, &self.series, &self.series_number]
            .into_iter()
            .flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.series.is_none()
            && self.series_number.is_none()
    }
}

/// Filename → metadata prediction
pub trait MetadataPredictor: Send + Sync {
    /// Predict title / author / series / series number from a cleaned filename
    fn predict_metadata(&self, filename: &str) -> Result<Predictions, PredictorError>;

    /// Minimum confidence for a prediction to be used at all
    fn confidence_threshold(&self) -> f64;

    fn is_prediction_confident(&self, prediction: &Prediction) -> bool {
        prediction.confidence >= self.confidence_threshold()
    }

    /// True when at least one predicted field clears the threshold
    fn are_predictions_confident(&self, predictions: &Predictions) -> bool {
        predictions.iter().any(|p| self.is_prediction_confident(p))
    }
}
