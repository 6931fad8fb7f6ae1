use super::ArchiveApi;
use crate::error::{Error, Result};
use crate::hash::Revision;
use crate::settings::Settings;

/// github.com and GitHub Enterprise instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitHub;

#[derive(serde::Deserialize)]
struct Commit {
    sha: String,
}

impl ArchiveApi for GitHub {
    fn input_type(&self) -> &'static str {
        "github"
    }

    fn default_host(&self) -> &'static str {
        "github.com"
    }

    fn access_token<'s>(&self, settings: &'s Settings) -> Option<&'s str> {
        settings.github_token()
    }

    fn access_header_from_token(&self, token: &str) -> (String, String) {
        ("Authorization".to_string(), format!("token {token}"))
    }

    fn rev_lookup_url(&self, host: &str, owner: &str, repo: &str, git_ref: &str) -> String {
        format!("https://api.{host}/repos/{owner}/{repo}/commits/{git_ref}")
    }

    fn rev_from_response(&self, url: &str, body: &[u8]) -> Result<Revision> {
        let commit: Commit =
            serde_json::from_slice(body).map_err(|e| Error::resolution(url, e))?;
        Revision::parse_any(&commit.sha).map_err(|e| Error::resolution(url, e))
    }

    // The regular /archive URLs would avoid the API rate limits, but do not exist on every
    // Enterprise instance.
    fn archive_url(&self, host: &str, owner: &str, repo: &str, rev: &Revision) -> String {
        format!(
            "https://api.{host}/repos/{owner}/{repo}/tarball/{}",
            rev.to_hex()
        )
    }
}
