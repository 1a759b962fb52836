use std::path::PathBuf;

use thiserror::Error;

/// A user-supplied optimizer or hyperparameter that the model defaults do not know.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid parameter '{parameter}': {hint}")]
pub struct ParameterError {
    pub parameter: String,
    pub hint: String,
}

impl ParameterError {
    pub fn new(parameter: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            hint: hint.into(),
        }
    }

    pub fn unsupported_optimizer(optimizer: &str) -> Self {
        Self::new(
            optimizer,
            "optimizer name, optimizer not supported for this model architecture.",
        )
    }

    pub fn unsupported_hyperparameter(key: &str) -> Self {
        Self::new(
            key,
            format!("hyperparameters, {key} is not supported for this model architecture."),
        )
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("unsupported archive format for {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssetError {
    #[error("no bundled {kind} named {name}")]
    NotFound { kind: &'static str, name: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("input required but prompting is disabled: {0}")]
    InputRequired(String),
    #[error("'{answer}' is not one of the offered choices")]
    InvalidChoice { answer: String },
    #[error("no scripted answer left for prompt: {0}")]
    Exhausted(String),
}
