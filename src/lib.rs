use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodexrError>;

#[derive(Error, Debug)]
pub enum CodexrError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Index build error: {0}")]
    IndexBuild(String),

    #[error("No index found at {path}")]
    IndexNotFound { path: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod crawler;
pub mod debugging;
pub mod embeddings;
pub mod formatter;
pub mod index;
pub mod llm;
pub mod orchestrator;
pub mod retrieval;
pub mod search;
pub mod server;
pub mod speech;
