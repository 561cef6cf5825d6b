use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("http error: {0}")]
    Http(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("no session available")]
    Unauthenticated,
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::Store(err.to_string())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FinderError {
    #[error("Please enter a search term.")]
    EmptySearchInput,
    #[error("city '{0}' not found in options")]
    CityNotFound(String),
    #[error("no card with id {0}")]
    CardNotFound(String),
}
