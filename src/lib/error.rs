/// The main error enum for this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or self-contradictory address text or attribute combination.
    #[error("{0}")]
    BadAddress(String),
    /// An attribute bag contained a key that inputs of this type do not support.
    #[error("unsupported input attribute '{0}'")]
    UnsupportedAttribute(String),
    /// A required attribute was absent.
    #[error("input attribute '{0}' is missing")]
    MissingAttribute(String),
    #[error("input attribute '{name}' has the wrong type, expected {expected}")]
    WrongAttributeType { name: String, expected: &'static str },
    /// A provider API answered, but not with a usable revision.
    #[error("failed to resolve a revision from '{url}': {reason}")]
    Resolution { url: String, reason: String },
    #[error("no registered input scheme handles '{0}'")]
    UnsupportedScheme(String),
    #[error("'{url}' returned HTTP status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),
    #[error("Command '{command}' exited with status {status}\n{stderr}")]
    Subprocess {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

impl Error {
    pub(crate) fn bad_address<S: Into<String>>(msg: S) -> Self {
        Self::BadAddress(msg.into())
    }

    pub(crate) fn resolution<U: ToString, R: ToString>(url: U, reason: R) -> Self {
        Self::Resolution {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
