//! Filename parser behaviour on representative library filenames

use libris_meta::parser::{split_author_names, ComicParser};
use libris_meta::FilenameParser;
use std::path::Path;

fn parse(name: &str) -> libris_meta::ParsedFilename {
    FilenameParser::new().parse(name, None)
}

#[test]
fn test_leading_index_feeds_series_number() {
    let parsed = parse("02 - Book Title.epub");
    assert_eq!(parsed.title, "Book Title");
    assert_eq!(parsed.series_number, Some(2.0));
    assert!(parsed.authors.is_empty());
}

#[test]
fn test_author_first() {
    let parsed = parse("John Doe - Book Title.epub");
    assert_eq!(parsed.authors, vec!["John Doe".to_string()]);
    assert_eq!(parsed.title, "Book Title");
}

#[test]
fn test_author_last() {
    let parsed = parse("The Complete Guide - John Doe.epub");
    assert_eq!(parsed.title, "The Complete Guide");
    assert_eq!(parsed.authors, vec!["John Doe".to_string()]);
}

#[test]
fn test_last_first_author_is_inverted() {
    let parsed = parse("Doe, John - Book Title.epub");
    assert_eq!(parsed.authors, vec!["John Doe".to_string()]);
    assert_eq!(parsed.title, "Book Title");
}

#[test]
fn test_surname_particle_kept_with_name() {
    let parsed = parse("Vincent van Gogh - Art Book.epub");
    assert_eq!(parsed.authors, vec!["Vincent van Gogh".to_string()]);
    assert_eq!(parsed.title, "Art Book");
}

#[test]
fn test_full_series_form() {
    let parsed = parse("Fantasy Series - 02 - Book Title - John Doe.epub");
    assert_eq!(parsed.series, "Fantasy Series");
    assert_eq!(parsed.series_number, Some(2.0));
    assert_eq!(parsed.title, "Book Title");
    assert_eq!(parsed.authors, vec!["John Doe".to_string()]);
}

#[test]
fn test_underscores_and_path_are_ignored() {
    let parsed = parse("/books/incoming/John_Doe_-_Book_Title.epub");
    assert_eq!(parsed.authors, vec!["John Doe".to_string()]);
    assert_eq!(parsed.title, "Book Title");
}

#[test]
fn test_bare_title_falls_through() {
    let parsed = parse("Mort.epub");
    assert_eq!(parsed.title, "Mort");
    assert!(parsed.authors.is_empty());
    assert_eq!(parsed.series, "");
    assert_eq!(parsed.series_number, None);
}

#[test]
fn test_folder_clues_fill_gaps() {
    let folder = Path::new("/library/Terry Pratchett/Discworld Series");
    let parsed = FilenameParser::new().parse("Mort.epub", Some(folder));
    assert_eq!(parsed.title, "Mort");
    assert_eq!(parsed.series, "Discworld");
    assert_eq!(parsed.authors, vec!["Terry Pratchett".to_string()]);
}

#[test]
fn test_author_list_splitting() {
    assert_eq!(
        split_author_names("John Doe & Jane Roe"),
        vec!["John Doe".to_string(), "Jane Roe".to_string()]
    );
    assert_eq!(
        split_author_names("Vincent van Gogh; Ludwig van Beethoven"),
        vec!["Vincent van Gogh".to_string(), "Ludwig van Beethoven".to_string()]
    );
}

#[test]
fn test_comic_issue_forms() {
    let comics = ComicParser::new();

    let parsed = comics.parse("Hellboy - 03 - The Corpse.cbr", None);
    assert_eq!(parsed.series, "Hellboy");
    assert_eq!(parsed.series_number, Some(3.0));
    assert_eq!(parsed.title, "The Corpse");
}
