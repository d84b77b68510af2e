// Filename Parser - best-guess metadata from a filename (+ folder path)
//
// Pipeline: clean → pattern cascade → author normalization → segment
// fallback → folder clues. Pure string/regex work; never fails.

pub mod ai;
pub mod ambiguity;
pub mod authors;
pub mod comic;
pub mod folder;
mod patterns;

pub use ai::AiFilenameParser;
pub use ambiguity::{author_score, looks_like_author, resolve_title_author_ambiguity};
pub use authors::{merge_surname_particles, split_author_names};
pub use comic::ComicParser;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Ancestor folders inspected for clues unless configured otherwise
pub const DEFAULT_FOLDER_DEPTH: usize = 4;

/// Book, comic and audiobook extensions stripped before parsing
const KNOWN_EXTENSIONS: &[&str] = &[
    "epub", "mobi", "azw", "azw3", "kfx", "pdf", "djvu", "fb2", "lit", "txt", "rtf", "doc",
    "docx", "cbz", "cbr", "cb7", "cbt", "mp3", "m4a", "m4b", "aac", "flac", "ogg", "opus",
];

/// Spaced hyphen / en-dash / em-dash
static DASH_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+[-–—]\s+").expect("dash regex should compile"));

/// Best-guess metadata extracted from a filename
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedFilename {
    pub title: String,
    /// Normalized author names, main author first
    pub authors: Vec<String>,
    /// Empty when unknown
    pub series: String,
    pub series_number: Option<f64>,
}

impl ParsedFilename {
    pub fn primary_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }
}

/// Strip directory and known extension, underscores to spaces, normalize
/// dash separators to `" - "` and collapse whitespace
pub fn clean_filename(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());

    let stem = match base.rsplit_once('.') {
        Some((stem, ext)) if KNOWN_EXTENSIONS.contains(&ext.to_lowercase().as_str()) => {
            stem.to_string()
        }
        _ => base,
    };

    let spaced = stem.replace('_', " ");
    let normalized = DASH_SEPARATOR.replace_all(&spaced, " - ");
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Heuristic filename parser
#[derive(Debug, Clone)]
pub struct FilenameParser {
    folder_depth: usize,
}

impl Default for FilenameParser {
    fn default() -> Self {
        Self {
            folder_depth: DEFAULT_FOLDER_DEPTH,
        }
    }
}

impl FilenameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder_depth(folder_depth: usize) -> Self {
        Self { folder_depth }
    }

    pub fn folder_depth(&self) -> usize {
        self.folder_depth
    }

    /// Parse `filename`, using `folder` (the containing directory) for clues
    pub fn parse(&self, filename: &str, folder: Option<&Path>) -> ParsedFilename {
        let name = clean_filename(filename);
        let matched = patterns::match_cascade(&name);

        let mut parsed = ParsedFilename {
            title: matched.title,
            authors: split_author_names(&matched.author),
            series: matched.series,
            series_number: matched.series_number,
        };

        if parsed.title.is_empty() || parsed.authors.is_empty() {
            apply_segment_fallback(&name, &mut parsed);
        }

        if let Some(folder) = folder {
            let clues = folder::folder_clues(folder, self.folder_depth);
            if parsed.series.is_empty() {
                if let Some(series) = clues.series {
                    parsed.series = series;
                }
            }
            if parsed.authors.is_empty() {
                if let Some(author) = clues.author {
                    parsed.authors = split_author_names(&author);
                }
            }
        }

        debug!(
            filename = %filename,
            pattern = matched.pattern,
            title = %parsed.title,
            authors = ?parsed.authors,
            "Parsed filename"
        );

        parsed
    }
}

/// Re-split on bare dashes and take the most author-like segment
fn apply_segment_fallback(name: &str, parsed: &mut ParsedFilename) {
    let segments: Vec<&str> = name
        .split(['-', '–'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if segments.len() < 2 {
        return;
    }

    // Highest score, earliest index on ties
    let best = segments
        .iter()
        .enumerate()
        .map(|(index, segment)| (index, author_score(segment)))
        .filter(|(_, score)| *score >= 0.5)
        .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)));

    let Some((author_index, _)) = best else {
        return;
    };
    if segments[author_index] == parsed.title {
        return;
    }

    let rest = segments
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != author_index)
        .map(|(_, segment)| *segment)
        .collect::<Vec<_>>()
        .join(" - ");

    if parsed.authors.is_empty() {
        parsed.authors = split_author_names(segments[author_index]);
        if parsed.title == name {
            parsed.title = rest;
            return;
        }
    }
    if parsed.title.is_empty() {
        parsed.title = rest;
    }
}
