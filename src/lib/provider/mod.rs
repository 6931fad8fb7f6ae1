//! Hosting providers whose repositories can be fetched as tarballs.
//!
//! Each provider only knows how to talk to its own REST API: where to ask which commit a
//! branch points at, how to read the answer, where the tarball for a commit lives and how to
//! authenticate. Deciding *when* to ask is left to [`Provider::fetch`](crate::fetch).

mod github;
mod gitlab;

pub use github::GitHub;
pub use gitlab::GitLab;

use crate::attrs::Attrs;
use crate::error::{Error, Result};
use crate::git::CloneRequest;
use crate::hash::Revision;
use crate::input::Input;
use crate::settings::Settings;
use crate::store::Store;
use crate::url::ParsedUrl;

/// A URL to download together with the header that authenticates the request, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub access_header: Option<(String, String)>,
}

/// The per-provider parts of fetching an archive input.
pub trait ArchiveApi {
    /// The input type and URL scheme, e.g. `github`.
    fn input_type(&self) -> &'static str;

    /// The public instance used when an input has no `host`.
    fn default_host(&self) -> &'static str;

    /// The configured token for this provider, if any.
    fn access_token<'s>(&self, settings: &'s Settings) -> Option<&'s str>;

    /// Format `token` as an HTTP header.
    fn access_header_from_token(&self, token: &str) -> (String, String);

    /// The API endpoint describing the commit `git_ref` points at.
    fn rev_lookup_url(&self, host: &str, owner: &str, repo: &str, git_ref: &str) -> String;

    /// Extract the commit hash from the body returned by [`ArchiveApi::rev_lookup_url`].
    fn rev_from_response(&self, url: &str, body: &[u8]) -> Result<Revision>;

    /// The endpoint serving a gzipped tarball of the tree at `rev`.
    fn archive_url(&self, host: &str, owner: &str, repo: &str, rev: &Revision) -> String;
}

/// The closed set of supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    GitHub,
    GitLab,
}

impl Provider {
    pub const ALL: &'static [Provider] = &[Provider::GitHub, Provider::GitLab];

    pub fn api(&self) -> &'static dyn ArchiveApi {
        match self {
            Provider::GitHub => &GitHub,
            Provider::GitLab => &GitLab,
        }
    }

    pub fn input_type(&self) -> &'static str {
        self.api().input_type()
    }

    pub fn input_from_url(&self, url: &ParsedUrl) -> Result<Option<Input>> {
        crate::url::input_from_url(self.input_type(), url)
    }

    pub fn input_from_attrs(&self, attrs: Attrs) -> Result<Option<Input>> {
        crate::url::input_from_attrs(self.input_type(), attrs)
    }

    pub fn to_url(&self, input: &Input) -> Result<ParsedUrl> {
        crate::url::to_url(input)
    }

    /// The input's `host`, or this provider's public instance.
    pub fn host<'a>(&self, input: &'a Input) -> Result<&'a str> {
        Ok(input.host()?.unwrap_or(self.api().default_host()))
    }

    /// The authentication header to send, if a non-empty token is configured.
    pub fn access_header(&self, settings: &Settings) -> Option<(String, String)> {
        self.api()
            .access_token(settings)
            .map(|token| self.api().access_header_from_token(token))
    }

    /// Ask the provider which commit the input's `ref` currently points at. This is the
    /// only step that turns a mutable name into an immutable revision.
    pub fn get_rev_from_ref(
        &self,
        settings: &Settings,
        store: &dyn Store,
        input: &Input,
    ) -> Result<Revision> {
        let git_ref = input.get_ref()?.unwrap_or("HEAD");
        let url = self.api().rev_lookup_url(
            self.host(input)?,
            input.owner()?,
            input.repo()?,
            git_ref,
        );
        let request = DownloadRequest {
            url: url.clone(),
            access_header: self.access_header(settings),
        };
        let path = store.download_file(&request, "source")?;
        let body = std::fs::read(store.to_real_path(&path))?;
        let rev = self.api().rev_from_response(&url, &body)?;
        tracing::debug!("HEAD revision for '{url}' is {rev}");
        Ok(rev)
    }

    /// Where to download the tarball for the input's `rev`. Never uses `ref`.
    pub fn get_download_url(&self, settings: &Settings, input: &Input) -> Result<DownloadRequest> {
        let rev = input
            .get_rev()?
            .ok_or_else(|| Error::MissingAttribute("rev".to_string()))?;
        let url = self
            .api()
            .archive_url(self.host(input)?, input.owner()?, input.repo()?, &rev);
        Ok(DownloadRequest {
            url,
            access_header: self.access_header(settings),
        })
    }

    /// The SSH address for cloning the input with git itself, carrying the input's
    /// ref (or `HEAD`) and rev.
    pub fn clone_request(&self, input: &Input) -> Result<CloneRequest> {
        let url = format!(
            "ssh://git@{}/{}/{}.git",
            self.host(input)?,
            input.owner()?,
            input.repo()?
        );
        Ok(CloneRequest {
            url,
            git_ref: input.get_ref()?.unwrap_or("HEAD").to_string(),
            rev: input.get_rev()?,
        })
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.input_type())
    }
}
