//! libris-meta - metadata resolution command line
//!
//! Parses book filenames, trains the filename predictor, and drives the
//! ingest → resolve → commit cycle against the library database.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use libris_common::config::{resolve_root_folder, TomlConfig};
use libris_common::db::init_database;
use libris_common::logging::init_logging;
use libris_meta::parser::{AiFilenameParser, ComicParser};
use libris_meta::predictor::{MetadataPredictor, TokenClassifier};
use libris_meta::services::ManualValue;
use libris_meta::store::SqliteStore;
use libris_meta::{Book, FilenameParser, MetadataService, ParsedFilename};
use tracing::{info, warn};
use uuid::Uuid;

/// Command-line arguments for libris-meta
#[derive(Parser, Debug)]
#[command(name = "libris-meta")]
#[command(about = "Metadata resolution for ebook, comic and audiobook libraries")]
#[command(version)]
struct Args {
    /// Library root folder (holds the database)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Explicit config file
    #[arg(short, long, env = "LIBRIS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse filenames and print the result as JSON
    Parse {
        /// Use comic-book heuristics
        #[arg(long)]
        comic: bool,

        /// Trained predictor model to consult
        #[arg(long)]
        model: Option<PathBuf>,

        files: Vec<PathBuf>,
    },

    /// Train the filename predictor from a newline-separated list of filenames
    Train {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Register a book file and record candidates from its filename
    Ingest {
        file: PathBuf,

        /// Last-resort cover image
        #[arg(long)]
        fallback_cover: Option<PathBuf>,
    },

    /// Resolve the final record of a book
    Resolve {
        #[arg(long)]
        book: Uuid,
    },

    /// Set a field by hand (`title`, `author`, `series`, ... or any custom name)
    Set {
        #[arg(long)]
        book: Uuid,

        field: String,

        value: String,
    },

    /// Mark a book as reviewed (or clear the flag)
    Review {
        #[arg(long)]
        book: Uuid,

        #[arg(long)]
        clear: bool,
    },

    /// Deactivate a candidate
    Deactivate {
        #[arg(long)]
        candidate: Uuid,
    },

    /// Print the final record and all candidates of a book
    Show {
        #[arg(long)]
        book: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, ignored) = match &args.config {
        Some(path) => (
            TomlConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None,
        ),
        None => TomlConfig::load_located(),
    };
    init_logging(&config.logging).context("Failed to initialize logging")?;
    if let Some((path, e)) = ignored {
        warn!("Ignoring config file {}: {}", path.display(), e);
    }

    match args.command {
        Command::Parse { comic, model, files } => {
            let model = model.or_else(|| config.resolver.model_path.clone());
            parse_files(&config, comic, model.as_deref(), &files)
        }
        Command::Train { input, output } => train_model(&config, &input, &output),
        command => run_library_command(args.root_folder.as_deref(), &config, command).await,
    }
}

fn parse_files(config: &TomlConfig, comic: bool, model: Option<&Path>, files: &[PathBuf]) -> Result<()> {
    let depth = config.resolver.folder_depth;
    let heuristic = FilenameParser::with_folder_depth(depth);
    let comic_parser = ComicParser::with_folder_depth(depth);

    let predictor = match model {
        Some(path) => {
            let classifier = TokenClassifier::load(path)
                .with_context(|| format!("Failed to load model {}", path.display()))?
                .with_threshold(config.resolver.predictor_threshold);
            let predictor: Arc<dyn MetadataPredictor> = Arc::new(classifier);
            Some(
                AiFilenameParser::new(heuristic.clone(), predictor)
                    .with_override_confidence(config.resolver.predictor_override),
            )
        }
        None => None,
    };

    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let folder = file.parent();

        let parsed: ParsedFilename = if comic {
            comic_parser.parse(&name, folder)
        } else if let Some(ai) = &predictor {
            ai.parse(&name, folder)
        } else {
            heuristic.parse(&name, folder)
        };

        let line = serde_json::json!({ "file": file, "parsed": parsed });
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

fn train_model(config: &TomlConfig, input: &Path, output: &Path) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let filenames: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    let parser = FilenameParser::with_folder_depth(config.resolver.folder_depth);
    let mut classifier = TokenClassifier::new().with_threshold(config.resolver.predictor_threshold);
    let examples = classifier.train(&filenames, &parser);
    classifier
        .save(output)
        .with_context(|| format!("Failed to write model {}", output.display()))?;

    info!(
        examples,
        tokens = classifier.training_tokens(),
        model = %output.display(),
        "Trained filename predictor"
    );
    Ok(())
}

async fn run_library_command(root: Option<&Path>, config: &TomlConfig, command: Command) -> Result<()> {
    let root_folder = resolve_root_folder(root, config);
    let db_path = config.database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to open library database")?;
    let store = Arc::new(SqliteStore::new(pool));

    let mut service = MetadataService::with_config(store, config.resolver.clone());
    if let Some(path) = &config.resolver.model_path {
        let classifier = TokenClassifier::load(path)
            .with_context(|| format!("Failed to load model {}", path.display()))?
            .with_threshold(config.resolver.predictor_threshold);
        service = service.with_predictor(Arc::new(classifier));
    }

    match command {
        Command::Ingest {
            file,
            fallback_cover,
        } => {
            let mut book = Book::new(file.to_string_lossy());
            if let Some(cover) = fallback_cover {
                book = book.with_fallback_cover(cover.to_string_lossy());
            }
            service.create_book(&book).await?;

            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            service.ingest_filename(book.id, &name, file.parent()).await?;
            service.resolve_book(book.id).await?;
            print_json(&service.final_metadata(book.id).await?)?;
        }
        Command::Resolve { book } => {
            let report = service.resolve_book(book).await?;
            print_json(&serde_json::json!({
                "report": report,
                "final": service.final_metadata(book).await?,
            }))?;
        }
        Command::Set { book, field, value } => {
            let record = service.apply_manual(book, manual_value(&field, value)?).await?;
            print_json(&record)?;
        }
        Command::Review { book, clear } => {
            let record = service.set_reviewed(book, !clear).await?;
            print_json(&record)?;
        }
        Command::Deactivate { candidate } => {
            let updated = service
                .deactivate_candidate(candidate)
                .await?
                .with_context(|| format!("Candidate {} not found", candidate))?;
            print_json(&service.final_metadata(updated.book_id).await?)?;
        }
        Command::Show { book } => {
            print_json(&serde_json::json!({
                "final": service.final_metadata(book).await?,
                "candidates": service.candidates(book).await?,
            }))?;
        }
        Command::Parse { .. } | Command::Train { .. } => {
            anyhow::bail!("Command does not use the library database")
        }
    }
    Ok(())
}

/// Map a field name and raw text onto a manual value
fn manual_value(field: &str, value: String) -> Result<ManualValue> {
    let manual = match field.trim().to_lowercase().as_str() {
        "title" => ManualValue::Title(value),
        "author" => ManualValue::Author(value),
        "series" => {
            // "Discworld #4" carries the number inline
            match value.rsplit_once('#') {
                Some((name, number)) => ManualValue::Series {
                    name: name.trim().to_string(),
                    number: Some(number.trim().to_string()),
                },
                None => ManualValue::Series { name: value, number: None },
            }
        }
        "publisher" => ManualValue::Publisher(value),
        "cover" => ManualValue::Cover(value),
        "genre" | "genres" => {
            ManualValue::Genres(value.split(',').map(|g| g.trim().to_string()).collect())
        }
        "year" | "publication_year" => {
            let year = value
                .trim()
                .parse::<i32>()
                .with_context(|| format!("Invalid year '{}'", value))?;
            ManualValue::PublicationYear(year)
        }
        "language" => ManualValue::Language(value),
        "isbn" => ManualValue::Isbn(value),
        "description" => ManualValue::Description(value),
        _ => ManualValue::Other {
            name: field.to_string(),
            value,
        },
    };
    Ok(manual)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
