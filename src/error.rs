//! Error types for sitectl

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Password hash error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("nginx config is not valid: {0}")]
    NginxParse(String),

    #[error("nginx syntax check failed: {0}")]
    NginxCheck(String),

    #[error("nginx reload failed: {0}")]
    NginxReload(String),

    #[error("Website '{0}' not found")]
    WebsiteNotFound(String),

    #[error("Website '{0}' already exists")]
    WebsiteExists(String),

    #[error("Invalid website alias: {0}")]
    InvalidAlias(String),

    #[error("Name '{0}' already exists")]
    NameExists(String),

    #[error("'{0}' not found")]
    NotFound(String),

    #[error("Username '{0}' already exists")]
    UsernameExists(String),

    #[error("Username '{0}' does not exist")]
    UsernameNotFound(String),

    #[error("Domain '{0}' already exists for this website")]
    DomainExists(String),

    #[error("'{0}' is not a valid IP address or CIDR range")]
    InvalidIp(String),

    #[error("Cannot delete the last domain of a website")]
    LastDomain,

    #[error("Upstream '{0}' is still referenced by a proxy rule")]
    UpstreamInUse(String),

    #[error("Config file not found. Run 'sitectl init' first.")]
    ConfigNotFound,

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl Error {
    /// True for errors caused by the request itself rather than the host.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::WebsiteNotFound(_)
                | Error::WebsiteExists(_)
                | Error::InvalidAlias(_)
                | Error::NameExists(_)
                | Error::NotFound(_)
                | Error::UsernameExists(_)
                | Error::UsernameNotFound(_)
                | Error::DomainExists(_)
                | Error::InvalidIp(_)
                | Error::LastDomain
                | Error::UpstreamInUse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
