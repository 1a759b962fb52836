pub mod core;
pub mod error;
pub mod models;
pub mod prompt;
pub mod stats;
pub mod training;

pub use error::{ArchiveError, AssetError, ParameterError, PromptError};
