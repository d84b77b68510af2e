//! Title / author ambiguity resolution
//!
//! Decides which of two filename segments is the author when the separator
//! alone does not say (`"A - B"`).

use crate::parser::authors::is_particle;
use once_cell::sync::Lazy;
use regex::Regex;

/// Words that mark a segment as a title rather than a personal name
const TITLE_WORDS: &[&str] = &[
    "the", "a", "an", "of", "and", "in", "on", "at", "to", "for", "with", "from", "into",
    "guide", "guides", "book", "books", "complete", "collected", "collection", "volume",
    "vol", "edition", "handbook", "manual", "introduction", "history", "story", "stories",
    "tale", "tales", "novel", "novels", "anthology", "omnibus", "series", "part", "chapter",
    "secret", "secrets", "adventure", "adventures", "how", "why", "what", "when", "where",
    "my", "your", "our", "world", "journey",
];

/// Capitalised name (`Doe`, `O'Brien`, `Jean-Luc`) or initials (`J.`, `J.R.R.`)
static NAME_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:\p{Lu}\.)+|\p{Lu}[\p{L}'’\-]*\.?)$").expect("name regex should compile")
});

const AMBIGUITY_PUNCTUATION: &[char] = &[':', ',', '-', '(', ')'];

/// Heuristic: does `text` read like a personal name?
///
/// 1-4 capitalised name tokens; lowercase particles are allowed but at least
/// one real name token is required. Digits or common title words disqualify.
pub fn looks_like_author(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() || text.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    let tokens: Vec<&str> = text
        .split_whitespace()
        .map(|t| t.trim_end_matches(','))
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() || tokens.len() > 4 {
        return false;
    }

    let mut name_tokens = 0;
    for token in tokens {
        let lower = token.to_lowercase();
        let bare = lower.trim_matches(|c: char| !c.is_alphanumeric());
        if TITLE_WORDS.contains(&bare) {
            return false;
        }
        if is_particle(&lower) {
            continue;
        }
        if !NAME_TOKEN.is_match(token) {
            return false;
        }
        name_tokens += 1;
    }

    name_tokens > 0
}

/// Comma-separated list where every part is a multi-word personal name
pub fn is_multi_author(segment: &str) -> bool {
    if !segment.contains(',') {
        return false;
    }
    let parts: Vec<&str> = segment.split(',').map(str::trim).collect();
    parts.len() >= 2
        && parts
            .iter()
            .all(|p| p.split_whitespace().count() >= 2 && looks_like_author(p))
}

/// Pick `(title, author)` out of two segments
///
/// 1. A multi-author list is the author.
/// 2. Exactly one segment looking like a name is the author.
/// 3. Fewer `: , - ( )` characters is the author; on an exact tie the first
///    segment is the author.
pub fn resolve_title_author_ambiguity(first: &str, second: &str) -> (String, String) {
    let first = first.trim();
    let second = second.trim();
    let first_is_author = || (second.to_string(), first.to_string());
    let second_is_author = || (first.to_string(), second.to_string());

    match (is_multi_author(first), is_multi_author(second)) {
        (true, false) => return first_is_author(),
        (false, true) => return second_is_author(),
        _ => {}
    }

    match (looks_like_author(first), looks_like_author(second)) {
        (true, false) => first_is_author(),
        (false, true) => second_is_author(),
        _ => {
            if punctuation_count(second) < punctuation_count(first) {
                second_is_author()
            } else {
                first_is_author()
            }
        }
    }
}

/// Author likelihood of a free segment, in [0, 1]
///
/// Single-token names stay below 0.5 so hyphenated titles (`Spider-Man`) are
/// not split into an author.
pub fn author_score(segment: &str) -> f64 {
    let segment = segment.trim();
    if segment.is_empty() {
        return 0.0;
    }

    let mut score: f64 = 0.0;
    let words = segment.split_whitespace().count();

    if looks_like_author(segment) {
        score += 0.4;
        if (2..=4).contains(&words) {
            score += 0.2;
        }
    }
    if is_multi_author(segment) {
        score += 0.3;
    }
    if segment.chars().any(|c| c.is_ascii_digit()) {
        score -= 0.4;
    }
    if segment
        .split_whitespace()
        .any(|w| TITLE_WORDS.contains(&w.to_lowercase().as_str()))
    {
        score -= 0.3;
    }

    score.clamp(0.0, 1.0)
}

fn punctuation_count(segment: &str) -> usize {
    segment
        .chars()
        .filter(|c| AMBIGUITY_PUNCTUATION.contains(c))
        .count()
}
