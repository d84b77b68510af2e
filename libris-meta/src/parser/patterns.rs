//! Filename pattern cascade
//!
//! Input is an already-cleaned filename stem whose dash separators are
//! normalized to `" - "`. Patterns are tried in order; the first match wins
//! and the terminal bare-title pattern always matches.

use crate::parser::ambiguity::{looks_like_author, resolve_title_author_ambiguity};
use crate::parser::authors::{has_leading_particle, is_particle};
use once_cell::sync::Lazy;
use regex::Regex;

pub(crate) const SEPARATOR: &str = " - ";

/// `"02. Title"` / `"02 - Title"`
static NUMBERED_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,3}(?:\.\d+)?)(?:\.\s+|\s+-\s+)(.+)$").expect("numbered regex should compile")
});

/// `"[Series 3] Title - Author"`
static BRACKET_SERIES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[([^\]]+)\]\s*(.+)\s+-\s+(.+)$").expect("bracket regex should compile")
});

/// Trailing number of a series name (`"Discworld 07"`, `"Saga #2"`)
static SERIES_NUMBER_TAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?)[\s#]*(\d+(?:\.\d+)?)$").expect("series tail regex should compile")
});

/// `"Series - 02 - Title - Author"`
static SERIES_NUMBER_TITLE_AUTHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)\s+-\s+(\d+(?:\.\d+)?)\s+-\s+(.+)\s+-\s+(.+)$")
        .expect("series regex should compile")
});

/// `"02 - Title - Author"` / `"02. Title - Author"`
static NUMBERED_TITLE_AUTHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,3}(?:\.\d+)?)(?:\.\s+|\s+-\s+)(.+)\s+-\s+(.+)$")
        .expect("numbered author regex should compile")
});

static TITLE_BY_AUTHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.+)\s+by\s+(.+)$").expect("by regex should compile"));

/// `"Last, First - Title"`
static LAST_FIRST_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^,]+?),\s*([^,]+?)\s+-\s+(.+)$").expect("last-first regex should compile")
});

/// `"Title (Author)"`
static PAREN_AUTHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)\s*\(([^()]+)\)$").expect("paren regex should compile")
});

/// Raw cascade output; the author is not yet normalized
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PatternMatch {
    pub title: String,
    pub author: String,
    pub series: String,
    pub series_number: Option<f64>,
    pub pattern: &'static str,
}

pub(crate) fn match_cascade(name: &str) -> PatternMatch {
    let name = name.trim();
    let matchers: [fn(&str) -> Option<PatternMatch>; 8] = [
        numbered_title,
        bracket_series,
        series_number_title_author,
        numbered_title_author,
        title_by_author,
        last_first_title,
        ambiguous_pair,
        paren_author,
    ];

    matchers
        .iter()
        .find_map(|matcher| matcher(name))
        .unwrap_or_else(|| PatternMatch {
            title: name.to_string(),
            pattern: "bare_title",
            ..Default::default()
        })
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok()
}

fn numbered_title(name: &str) -> Option<PatternMatch> {
    let caps = NUMBERED_TITLE.captures(name)?;
    let title = caps[2].trim();
    if title.contains(SEPARATOR) {
        return None;
    }
    Some(PatternMatch {
        title: title.to_string(),
        series_number: parse_number(&caps[1]),
        pattern: "numbered_title",
        ..Default::default()
    })
}

fn bracket_series(name: &str) -> Option<PatternMatch> {
    let caps = BRACKET_SERIES.captures(name)?;
    let bracket = caps[1].trim();
    let (series, series_number) = match SERIES_NUMBER_TAIL.captures(bracket) {
        Some(tail) => (tail[1].trim().to_string(), parse_number(&tail[2])),
        None => (bracket.to_string(), None),
    };
    Some(PatternMatch {
        title: caps[2].trim().to_string(),
        author: caps[3].trim().to_string(),
        series,
        series_number,
        pattern: "bracket_series",
    })
}

fn series_number_title_author(name: &str) -> Option<PatternMatch> {
    let caps = SERIES_NUMBER_TITLE_AUTHOR.captures(name)?;
    Some(PatternMatch {
        series: caps[1].trim().to_string(),
        series_number: parse_number(&caps[2]),
        title: caps[3].trim().to_string(),
        author: caps[4].trim().to_string(),
        pattern: "series_number_title_author",
    })
}

fn numbered_title_author(name: &str) -> Option<PatternMatch> {
    let caps = NUMBERED_TITLE_AUTHOR.captures(name)?;
    Some(PatternMatch {
        series_number: parse_number(&caps[1]),
        title: caps[2].trim().to_string(),
        author: caps[3].trim().to_string(),
        pattern: "numbered_title_author",
        ..Default::default()
    })
}

fn title_by_author(name: &str) -> Option<PatternMatch> {
    let caps = TITLE_BY_AUTHOR.captures(name)?;
    let title = caps[1].trim();
    let author = caps[2].trim();
    if title.is_empty() || author.is_empty() || author.contains(SEPARATOR) {
        return None;
    }
    Some(PatternMatch {
        title: title.to_string(),
        author: author.to_string(),
        pattern: "title_by_author",
        ..Default::default()
    })
}

fn last_first_title(name: &str) -> Option<PatternMatch> {
    let caps = LAST_FIRST_TITLE.captures(name)?;
    let last = caps[1].trim();
    let first = caps[2].trim();

    let last_words = last.split_whitespace().count();
    let last_ok = (last_words == 1 && !is_particle(last)) || has_leading_particle(last);
    let first_ok = first.split_whitespace().count() <= 3 && looks_like_author(first);
    if !last_ok || !first_ok || !looks_like_author(last) {
        return None;
    }

    Some(PatternMatch {
        title: caps[3].trim().to_string(),
        author: format!("{} {}", first, last),
        pattern: "last_first_title",
        ..Default::default()
    })
}

/// Generic `"A - B"`: first-separator split, then last-separator split when
/// the first one does not yield a name-like author
fn ambiguous_pair(name: &str) -> Option<PatternMatch> {
    let segments: Vec<&str> = name.split(SEPARATOR).map(str::trim).collect();
    if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
        return None;
    }

    let first_split = resolve_title_author_ambiguity(segments[0], &segments[1..].join(SEPARATOR));
    let (title, author) = if segments.len() > 2 && !looks_like_author(&first_split.1) {
        let last = segments.len() - 1;
        resolve_title_author_ambiguity(&segments[..last].join(SEPARATOR), segments[last])
    } else {
        first_split
    };

    Some(PatternMatch {
        title,
        author,
        pattern: "ambiguous_pair",
        ..Default::default()
    })
}

fn paren_author(name: &str) -> Option<PatternMatch> {
    let caps = PAREN_AUTHOR.captures(name)?;
    let title = caps[1].trim();
    let author = caps[2].trim();
    if title.is_empty() || !looks_like_author(author) {
        return None;
    }
    Some(PatternMatch {
        title: title.to_string(),
        author: author.to_string(),
        pattern: "paren_author",
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_title() {
        let m = match_cascade("02 - Book Title");
        assert_eq!(m.pattern, "numbered_title");
        assert_eq!(m.title, "Book Title");
        assert_eq!(m.series_number, Some(2.0));

        let m = match_cascade("1.5. Interlude");
        assert_eq!(m.title, "Interlude");
        assert_eq!(m.series_number, Some(1.5));
    }

    #[test]
    fn test_numbered_title_with_author_falls_through() {
        let m = match_cascade("03 - Book Title - John Doe");
        assert_eq!(m.pattern, "numbered_title_author");
        assert_eq!(m.title, "Book Title");
        assert_eq!(m.author, "John Doe");
        assert_eq!(m.series_number, Some(3.0));
    }

    #[test]
    fn test_bracket_series() {
        let m = match_cascade("[Discworld 07] Guards! Guards! - Terry Pratchett");
        assert_eq!(m.pattern, "bracket_series");
        assert_eq!(m.series, "Discworld");
        assert_eq!(m.series_number, Some(7.0));
        assert_eq!(m.title, "Guards! Guards!");
        assert_eq!(m.author, "Terry Pratchett");
    }

    #[test]
    fn test_series_number_title_author() {
        let m = match_cascade("Fantasy Series - 02 - Book Title - John Doe");
        assert_eq!(m.pattern, "series_number_title_author");
        assert_eq!(m.series, "Fantasy Series");
        assert_eq!(m.series_number, Some(2.0));
        assert_eq!(m.title, "Book Title");
        assert_eq!(m.author, "John Doe");
    }

    #[test]
    fn test_title_by_author() {
        let m = match_cascade("Stand by Me BY Stephen King");
        assert_eq!(m.pattern, "title_by_author");
        assert_eq!(m.title, "Stand by Me");
        assert_eq!(m.author, "Stephen King");
    }

    #[test]
    fn test_last_first_title() {
        let m = match_cascade("Doe, John - Book Title");
        assert_eq!(m.pattern, "last_first_title");
        assert_eq!(m.author, "John Doe");
        assert_eq!(m.title, "Book Title");

        let m = match_cascade("van Gogh, Vincent - Letters");
        assert_eq!(m.author, "Vincent van Gogh");
    }

    #[test]
    fn test_ambiguous_pair_uses_last_split_for_long_titles() {
        let m = match_cascade("The Hobbit - There and Back Again - J.R.R. Tolkien");
        assert_eq!(m.pattern, "ambiguous_pair");
        assert_eq!(m.title, "The Hobbit - There and Back Again");
        assert_eq!(m.author, "J.R.R. Tolkien");
    }

    #[test]
    fn test_paren_author() {
        let m = match_cascade("Book Title (John Doe)");
        assert_eq!(m.pattern, "paren_author");
        assert_eq!(m.title, "Book Title");
        assert_eq!(m.author, "John Doe");

        let m = match_cascade("Book Title (2019)");
        assert_eq!(m.pattern, "bare_title");
    }

    #[test]
    fn test_year_is_not_a_series_number() {
        let m = match_cascade("1984 - George Orwell");
        assert_ne!(m.pattern, "numbered_title");
        assert_eq!(m.author, "George Orwell");
        assert_eq!(m.title, "1984");
    }
}
