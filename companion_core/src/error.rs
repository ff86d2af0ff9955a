// Error types for task sessions, configuration loading, and intent dispatch.
//
// `TaskError` is the reason a task instance stopped. Its `Display` text is
// what the companion says in chat, so the wording is user facing. Sessions
// keep the error that ended them and report it once.
//
// See also: `gather.rs`, `construction.rs` (producers), `companion.rs`
// (reports failures and intent rejections), `config.rs` (`ConfigError`).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("I don't know what \"{0}\" is")]
    UnknownBlock(String),

    #[error("I don't know how to build a \"{0}\"")]
    UnknownBlueprint(String),

    #[error("I couldn't find any more {0} nearby")]
    SearchExhausted(String),

    #[error("I couldn't get to {0}")]
    TravelTimeout(String),

    #[error("I ran out of materials: still need {0}")]
    MaterialShortage(String),

    #[error("No animals to hunt nearby")]
    NothingToHunt,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentError {
    #[error("unknown command \"{0}\"")]
    UnknownVerb(String),

    #[error("missing \"{0}\" for that command")]
    MissingParameter(&'static str),

    #[error("\"{value}\" is not a valid {name}")]
    InvalidParameter { name: &'static str, value: String },
}
