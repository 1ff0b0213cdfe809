//! Error types and utilities for the raceline toolkit
//!
//! Provides the error taxonomy shared by the map, CSV and profiling stages,
//! plus fuzzy matching used to point at misspelled CSV headers.

use std::path::PathBuf;
use strsim::{jaro_winkler, normalized_levenshtein};
use thiserror::Error;

/// Minimum combined similarity for a header to be offered as a suggestion.
///
/// Column names are short and share prefixes (`local_x` / `local_y`), so the
/// bar sits higher than it would for free-form names.
const MIN_SUGGESTION_SCORE: f64 = 0.8;

/// Find the closest known header for a missing column name.
///
/// Scores combine Jaro-Winkler (prefix and transposition typos such as
/// `lcoal_x`) with normalized Levenshtein (dropped characters such as
/// `locl_x`). Returns `None` for an exact match or when nothing is close.
pub fn suggest_column(missing: &str, found: &[String]) -> Option<String> {
    let missing_lower = missing.trim().to_lowercase();
    if missing_lower.is_empty() {
        return None;
    }

    let mut best_match = None;
    let mut best_score = 0.0f64;

    for candidate in found {
        let candidate_lower = candidate.trim().to_lowercase();
        if candidate_lower == missing_lower {
            return None;
        }

        let jw_score = jaro_winkler(&missing_lower, &candidate_lower);
        let lev_score = normalized_levenshtein(&missing_lower, &candidate_lower);
        let score = (jw_score * 0.7) + (lev_score * 0.3);

        if score >= MIN_SUGGESTION_SCORE && score > best_score {
            best_score = score;
            best_match = Some(candidate.clone());
        }
    }

    best_match
}

fn join_names(names: &[String]) -> String {
    names.join(", ")
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean '{name}'?)"),
        None => String::new(),
    }
}

/// Main error type for raceline operations
#[derive(Debug, Error)]
pub enum Error {
    /// Map document unreadable or not well-formed
    #[error("Failed to parse {input}: {message}")]
    ParseError { input: String, message: String },

    /// Expected CSV columns are absent
    #[error(
        "Unsupported CSV schema in {}: missing column(s) [{}], found [{}]{}",
        .file.display(),
        join_names(.missing),
        join_names(.found),
        did_you_mean(.suggestion)
    )]
    SchemaError {
        file: PathBuf,
        missing: Vec<String>,
        found: Vec<String>,
        suggestion: Option<String>,
    },

    /// Too few points to carry out an operation
    #[error("Not enough data for {what}: need at least {required}, found {found}")]
    DataInsufficiency {
        what: String,
        required: usize,
        found: usize,
    },

    /// Stitched polyline contains jumps between unconnected segments
    #[error("Polyline for role '{role}' has {joins} non-contiguous join(s)")]
    Discontinuous { role: String, joins: usize },

    /// File I/O error with the offending path
    #[error("I/O error on {}: {source}", .path.display())]
    FileError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed CSV record
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Invalid or unreadable tuning configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Invalid parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Wrap an I/O error with the path it occurred on.
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileError {
            path: path.into(),
            source,
        }
    }

    /// Shorthand for a [`Error::DataInsufficiency`].
    pub fn insufficient(what: impl Into<String>, required: usize, found: usize) -> Self {
        Error::DataInsufficiency {
            what: what.into(),
            required,
            found,
        }
    }
}

/// Convenience result type for raceline operations
pub type Result<T> = std::result::Result<T, Error>;
