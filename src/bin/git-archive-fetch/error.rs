use std::path::PathBuf;
use std::process::ExitCode;

/// Categories of application errors that can be matched on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppErrorKind {
    /// Argument validation errors, including input URLs that do not parse
    ArgValidation,
    /// General IO errors
    IO,
    /// Settings file reading or parsing errors
    Settings,
    /// Errors opening or reading the cache directory
    Cache,
    /// Used to indicate that errors occurred during fetching; these errors are reported immediately,
    /// so this variant only exists to produce the correct `ExitCode`.
    Fetch,
    /// Native clone errors
    Clone,
    /// Errors rendering JSON or TOML output
    Output,
}

/// Internal error type that contains all application error variants.
#[derive(Debug, thiserror::Error)]
pub enum AppErrorInner {
    #[error("Argument error: {0}")]
    ArgValidation(String),
    #[error("invalid input '{url}'")]
    BadInput {
        url: String,
        #[source]
        err: git_archive::Error,
    },
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error("failed to load settings from {}", path.display())]
    Settings {
        path: PathBuf,
        #[source]
        err: git_archive::Error,
    },
    #[error("failed to open cache in {}", path.display())]
    OpenCache {
        path: PathBuf,
        #[source]
        err: git_archive::Error,
    },
    #[error("no cache found in {}", path.display())]
    MissingCache { path: PathBuf },
    #[error("Failed to fetch one or more input(s)")]
    Fetch,
    #[error("failed to clone {input} into {}", dest.display())]
    Clone {
        input: String,
        dest: PathBuf,
        #[source]
        err: git_archive::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Toml(#[from] toml::ser::Error),
}

/// The main application-level error type. We don't use `anyhow::Error` for this as we still care
/// about the concrete error type (for the exit code) while wanting to add context such as which
/// input or which directory was involved. The `Fetch` variant is only used to indicate that errors
/// occurred during fetching - these errors are reported as they happen rather than being returned.
///
/// This type uses the newtype pattern to wrap a boxed inner error, reducing stack size.
#[derive(Debug)]
pub struct AppError(Box<AppErrorInner>, AppErrorKind);

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl AppError {
    pub fn new(inner: AppErrorInner, kind: AppErrorKind) -> Self {
        Self(Box::new(inner), kind)
    }

    /// Get the error kind for pattern matching
    pub fn error_kind(&self) -> &AppErrorKind {
        &self.1
    }

    pub fn arg_validation(msg: String) -> Self {
        Self::new(AppErrorInner::ArgValidation(msg), AppErrorKind::ArgValidation)
    }

    pub fn bad_input(url: String, err: git_archive::Error) -> Self {
        Self::new(AppErrorInner::BadInput { url, err }, AppErrorKind::ArgValidation)
    }

    pub fn settings(path: PathBuf, err: git_archive::Error) -> Self {
        Self::new(AppErrorInner::Settings { path, err }, AppErrorKind::Settings)
    }

    pub fn open_cache(path: PathBuf, err: git_archive::Error) -> Self {
        Self::new(AppErrorInner::OpenCache { path, err }, AppErrorKind::Cache)
    }

    pub fn missing_cache(path: PathBuf) -> Self {
        Self::new(AppErrorInner::MissingCache { path }, AppErrorKind::Cache)
    }

    pub fn fetch() -> Self {
        Self::new(AppErrorInner::Fetch, AppErrorKind::Fetch)
    }

    pub fn clone_failed(input: String, dest: PathBuf, err: git_archive::Error) -> Self {
        Self::new(AppErrorInner::Clone { input, dest, err }, AppErrorKind::Clone)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::new(AppErrorInner::IO(err), AppErrorKind::IO)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(AppErrorInner::Json(err), AppErrorKind::Output)
    }
}

impl From<toml::ser::Error> for AppError {
    fn from(err: toml::ser::Error) -> Self {
        Self::new(AppErrorInner::Toml(err), AppErrorKind::Output)
    }
}

impl From<AppError> for ExitCode {
    fn from(error: AppError) -> Self {
        ExitCode::from(match error.error_kind() {
            AppErrorKind::Fetch => 1,
            AppErrorKind::ArgValidation => 2,
            _ => 3,
        })
    }
}
