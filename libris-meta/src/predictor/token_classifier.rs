//! Token classifier predictor
//!
//! Multinomial naive-Bayes tagger over filename tokens. Each token is tagged
//! title / author / series / series-number / other from its word and its
//! position features; contiguous runs of a tag become the predicted value.
//!
//! Training labels come from parsed filenames, so a classifier can be
//! bootstrapped from the heuristic parser's output on a library and then
//! generalises the library's naming layout to files the heuristics miss.
//!
//! Lifecycle: `new` → `train*` → `save`; later `load` → `predict_metadata`.

use crate::parser::{clean_filename, FilenameParser, ParsedFilename};
use crate::predictor::{MetadataPredictor, Prediction, PredictorError, Predictions};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// Model file format version
const MODEL_VERSION: u32 = 1;

/// Default minimum confidence for a prediction to be used
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Tag assigned to one filename token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenLabel {
    Title,
    Author,
    Series,
    SeriesNumber,
    Other,
}

impl TokenLabel {
    pub const ALL: [TokenLabel; 5] = [
        TokenLabel::Title,
        TokenLabel::Author,
        TokenLabel::Series,
        TokenLabel::SeriesNumber,
        TokenLabel::Other,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LabelStats {
    label: TokenLabel,
    /// Training tokens carrying this label
    tokens: u64,
    /// Sum of all feature counts
    feature_total: u64,
    features: HashMap<String, u64>,
}

impl LabelStats {
    fn new(label: TokenLabel) -> Self {
        Self {
            label,
            tokens: 0,
            feature_total: 0,
            features: HashMap::new(),
        }
    }
}

/// Token of a cleaned filename with its layout position
#[derive(Debug, Clone)]
struct Token {
    text: String,
    /// Index of the token across the whole filename
    index: usize,
    segment: usize,
    segments: usize,
    position: usize,
    segment_len: usize,
}

/// Naive-Bayes filename token classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClassifier {
    version: u32,
    threshold: f64,
    stats: Vec<LabelStats>,
    vocabulary_size: usize,
}

impl Default for TokenClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenClassifier {
    /// Untrained classifier with the default threshold
    pub fn new() -> Self {
        Self {
            version: MODEL_VERSION,
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            stats: TokenLabel::ALL.iter().map(|l| LabelStats::new(*l)).collect(),
            vocabulary_size: 0,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn is_trained(&self) -> bool {
        self.stats.iter().any(|s| s.tokens > 0)
    }

    /// Number of labelled training tokens seen so far
    pub fn training_tokens(&self) -> u64 {
        self.stats.iter().map(|s| s.tokens).sum()
    }

    /// Train from filenames labelled by the heuristic parser
    ///
    /// Returns the number of filenames used.
    pub fn train(&mut self, filenames: &[String], parser: &FilenameParser) -> usize {
        let examples: Vec<(String, ParsedFilename)> = filenames
            .iter()
            .filter(|f| !f.trim().is_empty())
            .map(|f| (f.clone(), parser.parse(f, None)))
            .collect();
        self.train_from_parses(&examples)
    }

    /// Train from `(filename, known metadata)` pairs
    pub fn train_from_parses(&mut self, examples: &[(String, ParsedFilename)]) -> usize {
        let mut used = 0;
        for (filename, parsed) in examples {
            let tokens = tokenize(filename);
            if tokens.is_empty() {
                continue;
            }
            for token in &tokens {
                let label = label_token(token, parsed);
                self.observe(label, &features(token, &tokens));
            }
            used += 1;
        }

        self.vocabulary_size = self
            .stats
            .iter()
            .flat_map(|s| s.features.keys())
            .collect::<HashSet<_>>()
            .len();

        info!(
            examples = used,
            tokens = self.training_tokens(),
            vocabulary = self.vocabulary_size,
            "Token classifier trained"
        );
        used
    }

    /// Write the model as JSON
    pub fn save(&self, path: &Path) -> Result<(), PredictorError> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "Saved token classifier");
        Ok(())
    }

    /// Load a model written by [`TokenClassifier::save`]
    pub fn load(path: &Path) -> Result<Self, PredictorError> {
        let bytes = std::fs::read(path)?;
        let model: TokenClassifier = serde_json::from_slice(&bytes)?;
        if model.version != MODEL_VERSION {
            return Err(PredictorError::InvalidInput(format!(
                "Unsupported model version {} in {}",
                model.version,
                path.display()
            )));
        }
        if model.stats.len() != TokenLabel::ALL.len() {
            return Err(PredictorError::InvalidInput(format!(
                "Model {} has {} label tables, expected {}",
                path.display(),
                model.stats.len(),
                TokenLabel::ALL.len()
            )));
        }
        debug!(path = %path.display(), "Loaded token classifier");
        Ok(model)
    }

    /// Most likely label and its posterior probability for every token
    pub fn classify(&self, filename: &str) -> Result<Vec<(String, TokenLabel, f64)>, PredictorError> {
        if !self.is_trained() {
            return Err(PredictorError::NotTrained);
        }
        let tokens = tokenize(filename);
        if tokens.is_empty() {
            return Err(PredictorError::InvalidInput(format!(
                "No tokens in filename '{}'",
                filename
            )));
        }

        Ok(tokens
            .iter()
            .map(|token| {
                let (label, probability) = self.best_label(&features(token, &tokens));
                (token.text.clone(), label, probability)
            })
            .collect())
    }

    fn observe(&mut self, label: TokenLabel, features: &[String]) {
        if let Some(stats) = self.stats.iter_mut().find(|s| s.label == label) {
            stats.tokens += 1;
            for feature in features {
                *stats.features.entry(feature.clone()).or_insert(0) += 1;
                stats.feature_total += 1;
            }
        }
    }

    fn best_label(&self, features: &[String]) -> (TokenLabel, f64) {
        let total_tokens = self.training_tokens() as f64;
        let label_count = self.stats.len() as f64;
        let vocabulary = self.vocabulary_size as f64 + 1.0;

        let scores: Vec<(TokenLabel, f64)> = self
            .stats
            .iter()
            .map(|stats| {
                let prior = ((stats.tokens as f64 + 1.0) / (total_tokens + label_count)).ln();
                let denominator = stats.feature_total as f64 + vocabulary;
                let likelihood: f64 = features
                    .iter()
                    .map(|f| {
                        let count = stats.features.get(f).copied().unwrap_or(0) as f64;
                        ((count + 1.0) / denominator).ln()
                    })
                    .sum();
                (stats.label, prior + likelihood)
            })
            .collect();

        // log-sum-exp normalization
        let max = scores
            .iter()
            .map(|(_, s)| *s)
            .fold(f64::NEG_INFINITY, f64::max);
        let normalizer: f64 = scores.iter().map(|(_, s)| (s - max).exp()).sum();

        scores
            .iter()
            .map(|(label, s)| (*label, (s - max).exp() / normalizer))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((TokenLabel::Other, 0.0))
    }

    fn assemble(tokens: &[Token], tagged: &[(TokenLabel, f64)]) -> Predictions {
        let run_prediction = |label: TokenLabel| -> Option<Prediction> {
            let mut best: Option<(Vec<usize>, f64)> = None;
            let mut current: Vec<usize> = Vec::new();

            let mut close_run = |run: &mut Vec<usize>| {
                if run.is_empty() {
                    return;
                }
                let mean = run.iter().map(|i| tagged[*i].1).sum::<f64>() / run.len() as f64;
                let better = match &best {
                    None => true,
                    Some((b, m)) => run.len() > b.len() || (run.len() == b.len() && mean > *m),
                };
                if better {
                    best = Some((run.clone(), mean));
                }
                run.clear();
            };

            for (i, (tag, _)) in tagged.iter().enumerate() {
                if *tag == label {
                    current.push(i);
                } else {
                    close_run(&mut current);
                }
            }
            close_run(&mut current);

            best.map(|(run, confidence)| {
                let value = run
                    .iter()
                    .map(|i| tokens[*i].text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
                    .trim_end_matches(',')
                    .to_string();
                Prediction { value, confidence }
            })
        };

        let series_number = tokens
            .iter()
            .zip(tagged)
            .filter(|(_, (tag, _))| *tag == TokenLabel::SeriesNumber)
            .find_map(|(token, (_, probability))| {
                bare_word(&token.text)
                    .parse::<f64>()
                    .ok()
                    .map(|n| Prediction {
                        value: n.to_string(),
                        confidence: *probability,
                    })
            });

        Predictions {
            title: run_prediction(TokenLabel::Title),
            author: run_prediction(TokenLabel::Author),
            series: run_prediction(TokenLabel::Series),
            series_number,
        }
    }
}

impl MetadataPredictor for TokenClassifier {
    fn predict_metadata(&self, filename: &str) -> Result<Predictions, PredictorError> {
        let classified = self.classify(filename)?;
        let tokens = tokenize(filename);
        let tagged: Vec<(TokenLabel, f64)> = classified.iter().map(|(_, l, p)| (*l, *p)).collect();
        let predictions = Self::assemble(&tokens, &tagged);

        debug!(filename = %filename, predictions = ?predictions, "Predicted filename metadata");
        Ok(predictions)
    }

    fn confidence_threshold(&self) -> f64 {
        self.threshold
    }
}

fn tokenize(filename: &str) -> Vec<Token> {
    let cleaned = clean_filename(filename);
    let segments: Vec<Vec<&str>> = cleaned
        .split(" - ")
        .map(|s| s.split_whitespace().collect::<Vec<_>>())
        .filter(|s| !s.is_empty())
        .collect();

    let segment_count = segments.len();
    let mut tokens = Vec::new();
    for (segment, words) in segments.iter().enumerate() {
        for (position, word) in words.iter().enumerate() {
            tokens.push(Token {
                text: (*word).to_string(),
                index: tokens.len(),
                segment,
                segments: segment_count,
                position,
                segment_len: words.len(),
            });
        }
    }
    tokens
}

fn bare_word(text: &str) -> String {
    text.trim_matches(|c: char| !c.is_alphanumeric() && c != '.')
        .trim_end_matches('.')
        .to_lowercase()
}

fn shape(text: &str) -> &'static str {
    let bare = bare_word(text);
    if bare.is_empty() {
        return "punct";
    }
    if bare.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return "digit";
    }
    match text.chars().find(|c| c.is_alphanumeric()) {
        Some(c) if c.is_uppercase() => "cap",
        _ => "lower",
    }
}

fn features(token: &Token, tokens: &[Token]) -> Vec<String> {
    let mut features = vec![
        format!("w={}", bare_word(&token.text)),
        format!("shape={}", shape(&token.text)),
        format!("seg={}", token.segment.min(3)),
        format!("segr={}", (token.segments - 1 - token.segment).min(3)),
        format!("segs={}", token.segments.min(4)),
    ];
    if token.position == 0 {
        features.push("first".to_string());
    }
    if token.position + 1 == token.segment_len {
        features.push("last".to_string());
    }
    if token.text.ends_with(',') {
        features.push("comma".to_string());
    }
    if let Some(previous) = token.index.checked_sub(1).and_then(|i| tokens.get(i)) {
        if previous.segment == token.segment && bare_word(&previous.text) == "by" {
            features.push("prev=by".to_string());
        }
    }
    features
}

fn label_token(token: &Token, parsed: &ParsedFilename) -> TokenLabel {
    let word = bare_word(&token.text);
    let words_of = |text: &str| -> HashSet<String> {
        text.split_whitespace().map(bare_word).filter(|w| !w.is_empty()).collect()
    };

    if let (Some(number), Ok(value)) = (parsed.series_number, word.parse::<f64>()) {
        if value == number {
            return TokenLabel::SeriesNumber;
        }
    }
    if parsed.authors.iter().any(|a| words_of(a).contains(&word)) {
        return TokenLabel::Author;
    }
    if words_of(&parsed.series).contains(&word) {
        return TokenLabel::Series;
    }
    if words_of(&parsed.title).contains(&word) {
        return TokenLabel::Title;
    }
    TokenLabel::Other
}
