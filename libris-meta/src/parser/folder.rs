//! Folder clues
//!
//! Library trees are often organised as `Author/Series/Book.epub`. Ancestor
//! folder names (nearest first) fill series / author when the filename did
//! not provide them.

use crate::parser::ambiguity::looks_like_author;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static SERIES_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bseries\b").expect("series word regex should compile"));

static LAST_COMMA_FIRST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^,]+),\s*([^,]+)$").expect("folder name regex should compile"));

/// Series / author hints collected from ancestor folders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderClues {
    pub series: Option<String>,
    pub author: Option<String>,
}

/// Folder names of `folder` and its ancestors, nearest first, at most `depth`
pub fn ancestor_names(folder: &Path, depth: usize) -> Vec<String> {
    folder
        .ancestors()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().replace('_', " ").trim().to_string())
        .filter(|n| !n.is_empty())
        .take(depth)
        .collect()
}

/// Inspect up to `depth` ancestors of `folder` for series and author hints
pub fn folder_clues(folder: &Path, depth: usize) -> FolderClues {
    let mut clues = FolderClues::default();

    for name in ancestor_names(folder, depth) {
        if clues.series.is_none() {
            if let Some(series) = series_from_folder(&name) {
                clues.series = Some(series);
                continue;
            }
        }
        if clues.author.is_none() {
            clues.author = author_from_folder(&name);
        }
        if clues.series.is_some() && clues.author.is_some() {
            break;
        }
    }

    clues
}

/// `"Discworld Series"` → `"Discworld"`
pub fn series_from_folder(name: &str) -> Option<String> {
    if !SERIES_WORD.is_match(name) {
        return None;
    }
    let stripped = SERIES_WORD.replace_all(name, " ");
    let series = stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == '-' || c == ':' || c.is_whitespace())
        .to_string();
    (!series.is_empty()).then_some(series)
}

/// Personal-name folder (`"Terry Pratchett"`, `"Pratchett, Terry"`)
pub fn author_from_folder(name: &str) -> Option<String> {
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some(caps) = LAST_COMMA_FIRST.captures(&name) {
        let last = caps[1].trim();
        let first = caps[2].trim();
        let candidate = format!("{} {}", first, last);
        return looks_like_author(&candidate).then_some(candidate);
    }

    let is_personal_name = name.split_whitespace().count() >= 2 && looks_like_author(&name);
    is_personal_name.then_some(name)
}
