/*!
 * Error handling for the clinic ETL library
 *
 * Structural problems (missing files, schema drift, sink failures) surface as
 * `EtlError`. Dirty cell values never do: the cleaners degrade them to null
 * and report counts through the event sink instead.
 */

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use serde::{Serialize, Deserialize};

/// Clinic ETL result type
pub type Result<T> = std::result::Result<T, EtlError>;

/// Error types with context and suggestions
#[derive(Error, Debug)]
pub enum EtlError {
    /// File I/O errors with context
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
        context: ErrorContext,
    },

    /// CSV parsing errors with location information
    #[error("CSV parsing error at line {line:?}: {message}")]
    CsvParse {
        message: String,
        line: Option<usize>,
        context: ErrorContext,
    },

    /// Input file missing
    #[error("File not found: {path}")]
    FileNotFound {
        path: PathBuf,
        suggestion: String,
    },

    /// Input file in a format the reader cannot decode
    #[error("Unsupported input format '{extension}' for {path}")]
    UnsupportedFormat {
        path: PathBuf,
        extension: String,
        suggestion: String,
    },

    /// Workbook could not be opened or has no usable sheet
    #[error("Cannot read workbook {path}: {message}")]
    Workbook {
        path: PathBuf,
        message: String,
    },

    /// Raw column list does not match the entity's schema contract
    #[error("Schema mismatch for {entity}: {message}")]
    SchemaMismatch {
        entity: String,
        message: String,
        expected_columns: usize,
        found_columns: usize,
        mismatched_column: Option<(usize, String, String)>,
    },

    /// A stage referenced a column the table does not have
    #[error("Column '{column}' not found (available: {})", available.join(", "))]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        suggestion: Option<String>,
    },

    /// Sink errors
    #[error("Export error: {message}")]
    Export {
        message: String,
        format: ExportFormat,
        suggestion: Option<String>,
    },

    /// Relational store errors
    #[cfg(feature = "sqlite")]
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Generic errors with custom message
    #[error("{message}")]
    Custom {
        message: String,
        suggestion: Option<String>,
    },
}

/// Error context providing additional information
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
    pub line_number: Option<usize>,
    pub column_name: Option<String>,
}

/// Output format, carried by export errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Sql,
    Sqlite,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "CSV"),
            ExportFormat::Json => write!(f, "JSON"),
            ExportFormat::Sql => write!(f, "SQL"),
            ExportFormat::Sqlite => write!(f, "SQLite"),
        }
    }
}

impl EtlError {
    /// Create a file not found error with a hint about the configuration variable
    pub fn file_not_found_with_suggestion(path: PathBuf) -> Self {
        let name = path.to_string_lossy().to_lowercase();
        let suggestion = if name.contains("doctor") {
            format!(
                "Check that the doctors file exists at '{}'. Set DOCTORS_INPUT in your .env file or pass --doctors.",
                path.display()
            )
        } else if name.contains("appointment") || name.contains("booking") {
            format!(
                "Check that the appointments file exists at '{}'. Set APPOINTMENTS_INPUT in your .env file or pass --appointments.",
                path.display()
            )
        } else {
            format!(
                "Check if the file exists at '{}'. Make sure the path is correct and you have read permissions.",
                path.display()
            )
        };

        Self::FileNotFound { path, suggestion }
    }

    /// Create an unsupported format error for spreadsheet and other inputs
    pub fn unsupported_format(path: PathBuf, extension: &str) -> Self {
        let suggestion = match extension {
            "xlsx" | "xls" | "xlsm" | "ods" => {
                "Rebuild with the `excel` feature to read spreadsheets, or export the first sheet to CSV with a header row".to_string()
            }
            _ => "Provide a comma-separated file with a header row".to_string(),
        };

        Self::UnsupportedFormat {
            path,
            extension: extension.to_string(),
            suggestion,
        }
    }

    /// Create a schema mismatch error with detailed information
    pub fn schema_mismatch_detailed(
        entity: &str,
        expected_columns: usize,
        found_columns: usize,
        mismatched_column: Option<(usize, String, String)>,
    ) -> Self {
        let message = if let Some((index, expected, found)) = &mismatched_column {
            format!(
                "Column {} mismatch: expected '{}', found '{}'",
                index, expected, found
            )
        } else {
            format!(
                "Expected {} columns, found {}",
                expected_columns, found_columns
            )
        };

        Self::SchemaMismatch {
            entity: entity.to_string(),
            message,
            expected_columns,
            found_columns,
            mismatched_column,
        }
    }

    /// Create a missing column error listing what the table does have
    pub fn missing_column(column: &str, available: &[String]) -> Self {
        Self::MissingColumn {
            column: column.to_string(),
            available: available.to_vec(),
        }
    }

    /// Whether this error came from the schema contract rather than I/O
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::SchemaMismatch { .. } | Self::MissingColumn { .. })
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::FileNotFound { suggestion, .. } => {
                format!("{}\n\nSuggestion: {}", self, suggestion)
            }
            Self::UnsupportedFormat { suggestion, .. } => {
                format!("{}\n\nSuggestion: {}", self, suggestion)
            }
            Self::CsvParse { context: ErrorContext { column_name: Some(column), .. }, .. } => {
                format!("{}\n\nColumn: {}", self, column)
            }
            Self::Workbook { .. } => {
                format!("{}\n\nSuggestion: Check that the file opens in a spreadsheet application and that the first sheet holds the data", self)
            }
            Self::SchemaMismatch { .. } => {
                format!("{}\n\nColumns must match the expected list exactly, in order. Run `clinetl schema` to print it.", self)
            }
            Self::Configuration { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            Self::Export { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            Self::Custom { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            _ => self.to_string(),
        }
    }
}

// Convenience conversions
impl From<std::io::Error> for EtlError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
            context: ErrorContext::default(),
        }
    }
}

impl From<csv::Error> for EtlError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|pos| pos.line() as usize);

        Self::CsvParse {
            message: err.to_string(),
            line,
            context: ErrorContext::default(),
        }
    }
}

impl From<serde_json::Error> for EtlError {
    fn from(err: serde_json::Error) -> Self {
        EtlError::Export {
            message: err.to_string(),
            format: ExportFormat::Json,
            suggestion: Some("Check if the data is serializable to JSON.".to_string()),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for EtlError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            source: err,
        }
    }
}
