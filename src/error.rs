use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KnapsackError {
    #[error("invalid search type: {0} (expected metabolite or organism)")]
    #[diagnostic(help("use `metabolite` or `organism`"))]
    InvalidSearchType(String),

    #[error("search keyword must not be empty")]
    EmptyKeyword,

    #[error("invalid KNApSAcK id: {0}")]
    InvalidKnapsackId(String),

    #[error("KNApSAcK request to {url} failed: {message}")]
    Fetch { url: String, message: String },

    #[error("KNApSAcK returned status {status} for {url}")]
    FetchStatus { url: String, status: u16 },

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    InvalidConfig(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl KnapsackError {
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            KnapsackError::Fetch { .. } | KnapsackError::FetchStatus { .. }
        )
    }

    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            KnapsackError::InvalidSearchType(_)
                | KnapsackError::EmptyKeyword
                | KnapsackError::InvalidKnapsackId(_)
                | KnapsackError::ConfigRead(_)
                | KnapsackError::ConfigParse(_)
                | KnapsackError::InvalidConfig(_)
        )
    }
}
