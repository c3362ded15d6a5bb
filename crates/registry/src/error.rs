use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Search query is empty")]
    EmptyQuery,
    #[error("Unknown filter: {0} (expected ALL, CRYPTO, KR, GLOBAL or WHALE)")]
    UnknownFilter(String),
}
