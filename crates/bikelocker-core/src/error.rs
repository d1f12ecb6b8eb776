use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Tag errors
    #[error("Invalid tag identifier: {0}")]
    InvalidTag(String),

    // State errors
    #[error("Unknown locker state: {0}")]
    UnknownState(String),

    #[error("Unknown limit switch: {0}")]
    UnknownSwitch(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
