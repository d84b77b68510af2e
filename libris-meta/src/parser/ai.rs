//! AI-augmented filename parser
//!
//! Heuristic parse first, then per-field adoption of predictor output. A
//! prediction replaces a field when it clears the predictor's threshold and
//! either the heuristic left the field empty or the prediction is very
//! confident.

use crate::parser::{clean_filename, split_author_names, FilenameParser, ParsedFilename};
use crate::predictor::{MetadataPredictor, Prediction, Predictions};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Confidence a prediction must exceed to replace a non-empty heuristic value
pub const DEFAULT_OVERRIDE_CONFIDENCE: f64 = 0.8;

/// Heuristic parser augmented by an injected predictor
pub struct AiFilenameParser {
    heuristic: FilenameParser,
    predictor: Arc<dyn MetadataPredictor>,
    override_confidence: f64,
}

impl AiFilenameParser {
    pub fn new(heuristic: FilenameParser, predictor: Arc<dyn MetadataPredictor>) -> Self {
        Self {
            heuristic,
            predictor,
            override_confidence: DEFAULT_OVERRIDE_CONFIDENCE,
        }
    }

    pub fn with_override_confidence(mut self, override_confidence: f64) -> Self {
        self.override_confidence = override_confidence;
        self
    }

    /// Parse with heuristics, then merge predictions
    ///
    /// Predictor errors are logged and the heuristic result is returned as is.
    pub fn parse(&self, filename: &str, folder: Option<&Path>) -> ParsedFilename {
        let parsed = self.heuristic.parse(filename, folder);

        match self.predictor.predict_metadata(&clean_filename(filename)) {
            Ok(predictions) => merge_predictions(
                parsed,
                &predictions,
                self.predictor.confidence_threshold(),
                self.override_confidence,
            ),
            Err(e) => {
                warn!("Predictor failed for '{}', using heuristic parse: {}", filename, e);
                parsed
            }
        }
    }
}

/// Adopt confident predictions into a heuristic parse
pub fn merge_predictions(
    mut parsed: ParsedFilename,
    predictions: &Predictions,
    threshold: f64,
    override_confidence: f64,
) -> ParsedFilename {
    let adopt = |heuristic_empty: bool, prediction: &Option<Prediction>| -> Option<String> {
        let prediction = prediction.as_ref()?;
        let usable = !prediction.value.trim().is_empty()
            && prediction.confidence >= threshold
            && (heuristic_empty || prediction.confidence > override_confidence);
        usable.then(|| prediction.value.trim().to_string())
    };

    if let Some(title) = adopt(parsed.title.is_empty(), &predictions.title) {
        debug!(title = %title, "Adopted predicted title");
        parsed.title = title;
    }
    if let Some(author) = adopt(parsed.authors.is_empty(), &predictions.author) {
        let authors = split_author_names(&author);
        if !authors.is_empty() {
            debug!(authors = ?authors, "Adopted predicted authors");
            parsed.authors = authors;
        }
    }
    if let Some(series) = adopt(parsed.series.is_empty(), &predictions.series) {
        debug!(series = %series, "Adopted predicted series");
        parsed.series = series;
    }
    if let Some(number) = adopt(parsed.series_number.is_none(), &predictions.series_number) {
        if let Ok(number) = number.parse::<f64>() {
            parsed.series_number = Some(number);
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::PredictorError;

    struct FixedPredictor {
        result: fn() -> Result<Predictions, PredictorError>,
    }

    impl MetadataPredictor for FixedPredictor {
        fn predict_metadata(&self, _filename: &str) -> Result<Predictions, PredictorError> {
            (self.result)()
        }

        fn confidence_threshold(&self) -> f64 {
            0.7
        }
    }

    fn prediction(value: &str, confidence: f64) -> Option<Prediction> {
        Some(Prediction {
            value: value.to_string(),
            confidence,
        })
    }

    #[test]
    fn test_fills_empty_fields_above_threshold() {
        let parsed = ParsedFilename {
            title: "Mort".to_string(),
            ..Default::default()
        };
        let predictions = Predictions {
            author: prediction("Terry Pratchett", 0.75),
            series: prediction("Discworld", 0.6),
            ..Default::default()
        };

        let merged = merge_predictions(parsed, &predictions, 0.7, 0.8);
        assert_eq!(merged.authors, vec!["Terry Pratchett".to_string()]);
        assert_eq!(merged.series, "");
    }

    #[test]
    fn test_overrides_only_when_very_confident() {
        let parsed = ParsedFilename {
            title: "Heuristic Title".to_string(),
            authors: vec!["Heuristic Author".to_string()],
            ..Default::default()
        };
        let predictions = Predictions {
            title: prediction("Predicted Title", 0.79),
            author: prediction("Predicted Author", 0.95),
            series_number: prediction("3", 0.9),
            ..Default::default()
        };

        let merged = merge_predictions(parsed, &predictions, 0.7, 0.8);
        assert_eq!(merged.title, "Heuristic Title");
        assert_eq!(merged.authors, vec!["Predicted Author".to_string()]);
        assert_eq!(merged.series_number, Some(3.0));
    }

    #[test]
    fn test_predictor_failure_keeps_heuristic_result() {
        let predictor = Arc::new(FixedPredictor {
            result: || Err(PredictorError::NotTrained),
        });
        let parser = AiFilenameParser::new(FilenameParser::new(), predictor);
        let parsed = parser.parse("John Doe - Book Title.epub", None);
        assert_eq!(parsed, FilenameParser::new().parse("John Doe - Book Title.epub", None));
    }

    #[test]
    fn test_prediction_applied_through_parser() {
        let predictor = Arc::new(FixedPredictor {
            result: || {
                Ok(Predictions {
                    author: Some(Prediction {
                        value: "Jane Roe".to_string(),
                        confidence: 0.72,
                    }),
                    ..Default::default()
                })
            },
        });
        let parser = AiFilenameParser::new(FilenameParser::new(), predictor);
        let parsed = parser.parse("Untitled Manuscript.epub", None);
        assert_eq!(parsed.title, "Untitled Manuscript");
        assert_eq!(parsed.authors, vec!["Jane Roe".to_string()]);
    }
}
