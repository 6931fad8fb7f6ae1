//! Cloning an input with git itself, for callers that want a working copy rather than an
//! archive.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{Error, Result};
use crate::hash::Revision;

/// The address and selectors needed to clone an archive input over SSH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneRequest {
    pub url: String,
    /// Branch or tag to clone; `HEAD` selects the remote's default branch.
    pub git_ref: String,
    pub rev: Option<Revision>,
}

impl CloneRequest {
    /// Shallow-clone into `dest`, which must not already exist.
    pub fn clone_into<P: AsRef<Path>>(&self, dest: P) -> Result<()> {
        let dest = dest.as_ref();
        if let Some(parent) = dest.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut git = self.command(dest);
        tracing::debug!("running {git:?}");
        // Drains both pipes while waiting on the child
        let output = git.output()?;
        if output.status.success() {
            return Ok(());
        }
        Err(Error::Subprocess {
            command: self.args(dest).join(" "),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn args(&self, dest: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["git", "clone", "--depth", "1", "--no-tags"]
            .into_iter()
            .map(String::from)
            .collect();
        if let Some(rev) = &self.rev {
            args.extend(["--revision".to_string(), rev.to_hex()]);
        } else if self.git_ref != "HEAD" {
            args.extend(["--branch".to_string(), self.git_ref.clone()]);
        }
        args.push(self.url.clone());
        args.push(dest.display().to_string());
        args
    }

    fn command(&self, dest: &Path) -> Command {
        let mut git = Command::new("git");
        git.args(&self.args(dest)[1..]);
        git.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null());
        git
    }
}

impl std::fmt::Display for CloneRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.url, self.git_ref)?;
        if let Some(rev) = &self.rev {
            write!(f, " (rev: {})", rev.short())?;
        }
        Ok(())
    }
}
