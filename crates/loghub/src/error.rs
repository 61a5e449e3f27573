use thiserror::Error;

/// Standard Result type for backend and normalization code
pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid backend configuration: {0}")]
    Config(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<handlebars::TemplateError> for SearchError {
    fn from(err: handlebars::TemplateError) -> Self {
        SearchError::Config(format!("invalid query template: {err}"))
    }
}

impl From<handlebars::RenderError> for SearchError {
    fn from(err: handlebars::RenderError) -> Self {
        SearchError::Template(err.to_string())
    }
}

impl From<regex::Error> for SearchError {
    fn from(err: regex::Error) -> Self {
        SearchError::Config(format!("invalid exclusion pattern: {err}"))
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SearchError::Decode(err.to_string())
        } else {
            SearchError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Decode(err.to_string())
    }
}
