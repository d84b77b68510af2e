//! Surname / author normalizer
//!
//! Token-level heuristics for author strings pulled out of filenames:
//! noise stripping, splitting multi-author lists and re-joining surnames that
//! carry a particle (`van`, `de la`, `Mc` ...).
//!
//! Known limitation: particle merging is a single greedy pass and cannot tell
//! `"Smith, de Groot"` (two authors) from `"Smith de Groot"` (one).

use once_cell::sync::Lazy;
use regex::Regex;

/// Surname particles, compared case-insensitively
pub const SURNAME_PARTICLES: &[&str] = &[
    "de", "del", "la", "le", "von", "van", "vanden", "van den", "da", "di", "mac", "mc",
    "van der", "von der", "du", "lo", "gel", "ter",
];

static NOISE_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:epub|mobi|pdf|azw3|azw|cbz|cbr|djvu|fb2|txt|rtf|retail|ebook)\b")
        .expect("noise regex should compile")
});

static EMPTY_BRACKETS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*\)|\[\s*\]").expect("bracket regex should compile"));

static AUTHOR_SEPARATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(?:,|&|;|\band\b)\s*").expect("separator regex should compile")
});

/// `"Last, First"` with single-word parts
static LAST_COMMA_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([\p{L}'’\-]+),\s*([\p{L}'’\-]+\.?)$").expect("last-first regex should compile")
});

/// True when `token` is exactly a surname particle
pub fn is_particle(token: &str) -> bool {
    let lower = token.trim().to_lowercase();
    SURNAME_PARTICLES.contains(&lower.as_str())
}

/// True when the leading one or two words of `token` form a particle and
/// more words follow (`"van Gogh"`, `"van der Berg"`)
pub fn has_leading_particle(token: &str) -> bool {
    let words: Vec<&str> = token.split_whitespace().collect();
    if words.len() >= 3 && is_particle(&format!("{} {}", words[0], words[1])) {
        return true;
    }
    words.len() >= 2 && is_particle(words[0])
}

/// Split a raw author string into individual, normalized names
///
/// Empty input yields an empty list.
pub fn split_author_names(raw: &str) -> Vec<String> {
    let cleaned = strip_noise(raw);
    if cleaned.is_empty() {
        return Vec::new();
    }

    if let Some(inverted) = invert_last_first(&cleaned) {
        return vec![inverted];
    }

    let tokens: Vec<String> = AUTHOR_SEPARATORS
        .split(&cleaned)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    merge_surname_particles(tokens)
}

/// Re-join surname particles split off by list separators
///
/// Greedy left-to-right: a bare particle is glued to the previous token and
/// swallows the next one; a token that starts with a particle is appended to
/// the previous token.
pub fn merge_surname_particles(tokens: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();

    while let Some(token) = iter.next() {
        let token = token.trim().to_string();
        if token.is_empty() {
            continue;
        }

        match merged.last_mut() {
            Some(previous) if is_particle(&token) => {
                previous.push(' ');
                previous.push_str(&token);
                if let Some(next) = iter.next() {
                    previous.push(' ');
                    previous.push_str(next.trim());
                }
            }
            Some(previous) if has_leading_particle(&token) => {
                previous.push(' ');
                previous.push_str(&token);
            }
            _ => merged.push(token),
        }
    }

    merged
}

fn strip_noise(raw: &str) -> String {
    let without_noise = NOISE_TOKENS.replace_all(raw, " ");
    let without_brackets = EMPTY_BRACKETS.replace_all(&without_noise, " ");
    without_brackets
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == ',' || c == ';' || c == '&' || c == '-')
        .trim()
        .to_string()
}

// "Doe, John" is one person, not two
fn invert_last_first(cleaned: &str) -> Option<String> {
    let caps = LAST_COMMA_FIRST.captures(cleaned)?;
    let last = caps.get(1)?.as_str();
    let first = caps.get(2)?.as_str();
    if is_particle(last) || is_particle(first) {
        return None;
    }
    let capitalized = |s: &str| s.chars().next().is_some_and(char::is_uppercase);
    (capitalized(last) && capitalized(first)).then(|| format!("{} {}", first, last))
}
