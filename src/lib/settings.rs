//! Process-wide, read-only configuration.

use std::path::Path;

pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";
pub const GITLAB_TOKEN_VAR: &str = "GITLAB_TOKEN";

const DEFAULT_USER_AGENT: &str = concat!("git-archive-fetch/", env!("CARGO_PKG_VERSION"));

/// Access tokens and HTTP identity used when talking to hosting providers.
///
/// Read from a TOML document such as
///
/// ```toml
/// github-access-token = "ghp_..."
/// gitlab-access-token = "glpat-..."
/// ```
///
/// An absent or empty token means requests to that provider are unauthenticated.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Settings {
    pub github_access_token: Option<String>,
    pub gitlab_access_token: Option<String>,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            github_access_token: None,
            gitlab_access_token: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Settings {
    pub fn from_toml_str<S: AsRef<str>>(s: S) -> Result<Self, crate::Error> {
        Ok(toml::from_str(s.as_ref())?)
    }

    /// Load settings from `path`, falling back to the defaults if the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        if !path.is_file() {
            tracing::debug!("no settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_toml_str(std::fs::read_to_string(path)?)
    }

    /// Override tokens from `GITHUB_TOKEN` / `GITLAB_TOKEN` when they are set and non-empty.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(GITHUB_TOKEN_VAR).filter(|t| !t.is_empty()) {
            self.github_access_token = Some(token);
        }
        if let Some(token) = lookup(GITLAB_TOKEN_VAR).filter(|t| !t.is_empty()) {
            self.gitlab_access_token = Some(token);
        }
        self
    }

    pub fn github_token(&self) -> Option<&str> {
        non_empty(&self.github_access_token)
    }

    pub fn gitlab_token(&self) -> Option<&str> {
        non_empty(&self.gitlab_access_token)
    }
}

fn non_empty(token: &Option<String>) -> Option<&str> {
    token.as_deref().filter(|t| !t.is_empty())
}
