//! Comic filename parser
//!
//! Comic files name series + issue rather than title + author
//! (`"Saga 001 (2012) (digital).cbz"`). Creators are rarely in the filename,
//! so the author comes from a known-creator table matched against folders.

use crate::parser::authors::split_author_names;
use crate::parser::folder::{ancestor_names, folder_clues};
use crate::parser::{clean_filename, ParsedFilename, DEFAULT_FOLDER_DEPTH};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

/// Creator name and the series they are known for (lowercase)
const KNOWN_CREATORS: &[(&str, &[&str])] = &[
    ("Stan Lee", &["spider-man", "fantastic four", "x-men", "incredible hulk"]),
    (
        "Alan Moore",
        &["watchmen", "v for vendetta", "from hell", "swamp thing", "promethea"],
    ),
    ("Neil Gaiman", &["sandman", "books of magic"]),
    ("Frank Miller", &["sin city", "dark knight returns", "300"]),
    (
        "Brian K. Vaughan",
        &["saga", "y the last man", "paper girls", "ex machina"],
    ),
    ("Robert Kirkman", &["walking dead", "invincible"]),
    ("Garth Ennis", &["preacher", "the boys"]),
    ("Warren Ellis", &["transmetropolitan", "planetary"]),
    ("Mike Mignola", &["hellboy"]),
    ("Jeff Smith", &["bone"]),
];

/// Trailing `(2019)`, `(digital)`, `(Scanner-Group)` tags
static TRAILING_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\s*\([^()]*\))+$").expect("tag regex should compile"));

static SERIES_ISSUE_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)\s+-\s+#?(\d+(?:\.\d+)?)\s+-\s+(.+)$").expect("comic regex should compile")
});

static SERIES_HASH_ISSUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)\s+#(\d+(?:\.\d+)?)(?:\s+(?:-\s+)?(.+))?$").expect("comic regex should compile")
});

static SERIES_ISSUE_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.+?)\s+issue\s+(\d+(?:\.\d+)?)(?:\s+(?:-\s+)?(.+))?$")
        .expect("comic regex should compile")
});

static SERIES_TRAILING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s+(\d{1,4})$").expect("comic regex should compile"));

/// Comic filename parser
#[derive(Debug, Clone)]
pub struct ComicParser {
    folder_depth: usize,
}

impl Default for ComicParser {
    fn default() -> Self {
        Self {
            folder_depth: DEFAULT_FOLDER_DEPTH,
        }
    }
}

impl ComicParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder_depth(folder_depth: usize) -> Self {
        Self { folder_depth }
    }

    /// Parse a comic filename; never fails
    ///
    /// Without an explicit issue title the title becomes `"<series> #<issue>"`.
    pub fn parse(&self, filename: &str, folder: Option<&Path>) -> ParsedFilename {
        let cleaned = clean_filename(filename);
        let name = TRAILING_TAGS.replace(&cleaned, "").trim().to_string();

        let captures = [
            &*SERIES_ISSUE_TITLE,
            &*SERIES_HASH_ISSUE,
            &*SERIES_ISSUE_WORD,
            &*SERIES_TRAILING_NUMBER,
        ]
        .iter()
        .find_map(|re| re.captures(&name));

        let mut parsed = match captures {
            Some(caps) => {
                let series = caps[1].trim().to_string();
                let series_number = caps[2].parse::<f64>().ok();
                let title = caps
                    .get(3)
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| match series_number {
                        Some(n) => format!("{} #{}", series, n),
                        None => series.clone(),
                    });
                ParsedFilename {
                    title,
                    authors: Vec::new(),
                    series,
                    series_number,
                }
            }
            None => ParsedFilename {
                title: name.clone(),
                ..Default::default()
            },
        };

        if let Some(folder) = folder {
            let creator = known_creator(folder, self.folder_depth)
                .map(str::to_string)
                .or_else(|| folder_clues(folder, self.folder_depth).author);
            if let Some(creator) = creator {
                parsed.authors = split_author_names(&creator);
            }
        }

        debug!(
            filename = %filename,
            series = %parsed.series,
            issue = ?parsed.series_number,
            "Parsed comic filename"
        );

        parsed
    }
}

/// First known creator whose name or series appears in an ancestor folder
pub fn known_creator(folder: &Path, depth: usize) -> Option<&'static str> {
    ancestor_names(folder, depth).iter().find_map(|name| {
        let folder_words = words(name);
        KNOWN_CREATORS.iter().find_map(|(creator, series)| {
            let matches_creator = name.eq_ignore_ascii_case(creator);
            let matches_series = series
                .iter()
                .any(|s| contains_phrase(&folder_words, &words(s)));
            (matches_creator || matches_series).then_some(*creator)
        })
    })
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn contains_phrase(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty()
        && haystack.len() >= needle.len()
        && haystack.windows(needle.len()).any(|w| w == needle)
}
