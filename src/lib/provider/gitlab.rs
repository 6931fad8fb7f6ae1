use super::ArchiveApi;
use crate::error::{Error, Result};
use crate::hash::Revision;
use crate::settings::Settings;

/// gitlab.com and self-hosted GitLab instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitLab;

#[derive(serde::Deserialize)]
struct CommitListEntry {
    id: String,
}

impl ArchiveApi for GitLab {
    fn input_type(&self) -> &'static str {
        "gitlab"
    }

    fn default_host(&self) -> &'static str {
        "gitlab.com"
    }

    fn access_token<'s>(&self, settings: &'s Settings) -> Option<&'s str> {
        settings.gitlab_token()
    }

    fn access_header_from_token(&self, token: &str) -> (String, String) {
        ("Authorization".to_string(), format!("Bearer {token}"))
    }

    fn rev_lookup_url(&self, host: &str, owner: &str, repo: &str, git_ref: &str) -> String {
        let git_ref: String = url::form_urlencoded::byte_serialize(git_ref.as_bytes()).collect();
        format!(
            "https://{host}/api/v4/projects/{owner}%2F{repo}/repository/commits?ref_name={git_ref}"
        )
    }

    fn rev_from_response(&self, url: &str, body: &[u8]) -> Result<Revision> {
        let commits: Vec<CommitListEntry> =
            serde_json::from_slice(body).map_err(|e| Error::resolution(url, e))?;
        let first = commits
            .first()
            .ok_or_else(|| Error::resolution(url, "no commits found for this ref"))?;
        Revision::parse_any(&first.id).map_err(|e| Error::resolution(url, e))
    }

    // Rate limited to roughly 10 requests per second per IP on gitlab.com, less for
    // unauthenticated clients.
    fn archive_url(&self, host: &str, owner: &str, repo: &str, rev: &Revision) -> String {
        format!(
            "https://{host}/api/v4/projects/{owner}%2F{repo}/repository/archive.tar.gz?sha={}",
            rev.to_hex()
        )
    }
}
