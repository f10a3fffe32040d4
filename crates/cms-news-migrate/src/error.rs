//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, unknown category, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Legacy installation does not match the expected product/version.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Query against a missing or malformed legacy table.
    #[error("Source database error: {0}")]
    Source(String),

    /// Same legacy ID mapped to two different new IDs.
    #[error(
        "ID registry conflict in {category}: legacy ID {legacy_id} already mapped to {existing}, refusing to remap to {attempted}"
    )]
    RegistryConflict {
        category: String,
        legacy_id: i64,
        existing: i64,
        attempted: i64,
    },

    /// Destination writer rejected a record.
    #[error("Destination error: {0}")]
    Destination(String),

    /// A fatal error annotated with the category and page offset it occurred at.
    #[error("Import of {category} failed at offset {offset}: {source}")]
    Page {
        category: String,
        offset: u64,
        #[source]
        source: Box<MigrateError>,
    },

    /// State or registry file error
    #[error("State file error: {0}")]
    State(String),

    /// Config hash mismatch on resume
    #[error("Config has changed since last run - cannot resume. Start a fresh run instead.")]
    ConfigChanged,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl From<sqlx::Error> for MigrateError {
    fn from(err: sqlx::Error) -> Self {
        MigrateError::Source(err.to_string())
    }
}

impl MigrateError {
    /// Create a Source error with context about where it occurred.
    pub fn query(err: impl std::fmt::Display, context: impl std::fmt::Display) -> Self {
        MigrateError::Source(format!("{}: {}", context, err))
    }

    /// Create a Destination error.
    pub fn destination(message: impl Into<String>) -> Self {
        MigrateError::Destination(message.into())
    }

    /// Attach the failing category and page offset to an error.
    pub fn at_page(self, category: impl Into<String>, offset: u64) -> Self {
        match self {
            // Keep the innermost location; cancellation is not a page failure.
            e @ (MigrateError::Page { .. } | MigrateError::Cancelled) => e,
            other => MigrateError::Page {
                category: category.into(),
                offset,
                source: Box::new(other),
            },
        }
    }

    /// The error with any page annotation removed.
    pub fn root(&self) -> &MigrateError {
        match self {
            MigrateError::Page { source, .. } => source.root(),
            other => other,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self.root() {
            MigrateError::Config(_)
            | MigrateError::Yaml(_)
            | MigrateError::ConfigChanged => 1,
            MigrateError::Validation(_) => 2,
            MigrateError::Source(_) => 3,
            MigrateError::RegistryConflict { .. } => 4,
            MigrateError::Destination(_) => 5,
            MigrateError::State(_) | MigrateError::Json(_) => 6,
            MigrateError::Io(_) => 7,
            MigrateError::Cancelled => 130,
            MigrateError::Page { .. } => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
