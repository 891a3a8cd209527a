use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors surfaced by venue gateway calls.
#[derive(Error, Debug)]
pub enum VenueError {
    #[error("venue request failed: {0}")]
    Request(String),

    #[error("venue request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("malformed venue response: {0}")]
    Malformed(String),
}

/// Errors raised by the opportunity graph model.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("venue map is empty")]
    NoVenues,

    #[error("no usable venues: every configured venue failed market listing")]
    NoUsableVenues,

    #[error("universe not initialized")]
    UniverseNotInitialized,

    #[error("decision variables not built")]
    VariablesNotBuilt,

    #[error("solver returned {got} values for {expected} variables")]
    VariableCountMismatch { expected: usize, got: usize },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Venue(#[from] VenueError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("sizing failed: {0}")]
    Sizing(String),
}

pub type Result<T> = std::result::Result<T, Error>;
