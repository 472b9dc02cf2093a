use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("Script error: {0}")]
    ScriptError(String),

    #[error("Asset error: {0}")]
    AssetError(String),

    #[error("Video playback error: {0}")]
    VideoError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PreviewError>;
