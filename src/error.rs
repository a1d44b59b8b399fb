use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InputValidation(String),

    #[error("Invalid firmware file. Must be .uf2 or .hex format: {}", .0.display())]
    InvalidFirmware(PathBuf),

    #[error("Tool invocation failed: {0}")]
    ToolInvocation(String),

    #[error("Unparseable tool output: {0}")]
    InvalidOutput(#[from] serde_json::Error),

    #[error("Invalid device record: {0}")]
    InvalidRecord(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, Error>;
