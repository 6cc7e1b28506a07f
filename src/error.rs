// SPDX-License-Identifier: MIT

//! Typed error handling for funnel-rs
//!
//! Engine operations never panic on caller mistakes; they return one of
//! these variants and leave the funnel state untouched.

use thiserror::Error;

/// Top-level error type for funnel-rs
#[derive(Debug, Error)]
pub enum FunnelError {
    /// A navigation referenced a step that is not part of the funnel
    #[error("Unknown step '{step}'")]
    UnknownStep { step: String },

    /// Definition without any steps
    #[error("Funnel definition '{0}' has no steps")]
    EmptyDefinition(String),

    /// Same step name declared twice
    #[error("Step '{0}' is declared more than once")]
    DuplicateStep(String),

    /// A field introduced by two different steps
    #[error("Field '{field}' is introduced by both '{first}' and '{second}'")]
    DuplicateField {
        field: String,
        first: String,
        second: String,
    },

    /// Initial step is not part of the funnel
    #[error("Initial step '{0}' is not part of the funnel")]
    InvalidInitialStep(String),

    /// Required context fields are absent at a step
    #[error("Step '{step}' is missing required fields: {fields:?}")]
    MissingFields { step: String, fields: Vec<String> },

    /// A context field holds a value of the wrong JSON type
    #[error("Field '{field}' should be {expected} but was {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    /// Navigation command text could not be parsed
    #[error("Invalid navigation command: {0}")]
    InvalidCommand(String),

    /// Configuration errors (invalid env vars)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// URL parsing errors
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl FunnelError {
    /// Create an unknown step error
    pub fn unknown_step(step: impl Into<String>) -> Self {
        Self::UnknownStep { step: step.into() }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid command error
    pub fn invalid_command(message: impl Into<String>) -> Self {
        Self::InvalidCommand(message.into())
    }
}

pub type Result<T> = std::result::Result<T, FunnelError>;
