use thiserror::Error;

/// Errors from resolving options, running debates or writing outputs.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid option: {0}")]
    Option(String),
    #[error(transparent)]
    Debate(#[from] rehearsal::DebateError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
