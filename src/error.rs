use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Catalog parse error: {0}")]
    Parse(String),

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Package not installed: {0}")]
    NotInstalled(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Truncated download: {0}")]
    Integrity(String),

    #[error("Package index unreadable: {0}")]
    StateCorruption(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Other(String),
}
