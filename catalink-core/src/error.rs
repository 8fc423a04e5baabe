use catalink_scanner::error::CrawlError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Missing required setting {0}")]
    MissingSetting(&'static str),

    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidSetting {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("Crawl failed: {0}")]
    Crawl(#[from] CrawlError),

    #[error("Crawling interval must be greater than zero")]
    ZeroInterval,
}

pub type Result<T> = std::result::Result<T, CoreError>;
