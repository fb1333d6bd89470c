use std::fmt;

use thiserror::Error;

pub use config::ConfigError;

pub type Result<T> = std::result::Result<T, AskPdfError>;

#[derive(Error, Debug)]
pub enum AskPdfError {
    #[error("Document parse error: {0}")]
    DocumentParse(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Index persistence error for namespace '{namespace}' while {stage}: {message}")]
    IndexPersistence {
        namespace: String,
        stage: PersistStage,
        message: String,
    },

    #[error("No passages were retrieved for the question")]
    EmptyContext,

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// The step of the namespace lifecycle an [`AskPdfError::IndexPersistence`] happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistStage {
    Staging,
    Writing,
    Publishing,
    Loading,
    Removing,
}

impl fmt::Display for PersistStage {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PersistStage::Staging => write!(f, "staging"),
            PersistStage::Writing => write!(f, "writing"),
            PersistStage::Publishing => write!(f, "publishing"),
            PersistStage::Loading => write!(f, "loading"),
            PersistStage::Removing => write!(f, "removing"),
        }
    }
}

impl AskPdfError {
    #[inline]
    pub fn persistence(
        namespace: impl Into<String>,
        stage: PersistStage,
        message: impl fmt::Display,
    ) -> Self {
        Self::IndexPersistence {
            namespace: namespace.into(),
            stage,
            message: message.to_string(),
        }
    }

    /// Name the namespace an embedding or generation failure happened in
    #[inline]
    #[must_use]
    pub fn in_namespace(self, namespace: impl fmt::Display) -> Self {
        match self {
            Self::Embedding(message) => {
                Self::Embedding(format!("namespace '{}': {}", namespace, message))
            }
            Self::Generation(message) => {
                Self::Generation(format!("namespace '{}': {}", namespace, message))
            }
            other => other,
        }
    }
}

pub mod chunking;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod extractor;
pub mod index;
pub mod indexer;
pub mod ollama;
pub mod responder;
