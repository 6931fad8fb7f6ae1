//! Resolve `github:` and `gitlab:` repository references to immutable, cached source trees.
//!
//! An [`Input`] names a repository on a hosting provider, optionally pinned to a branch/tag
//! (`ref`) or to a commit (`rev`). Fetching an input asks the provider which commit the
//! branch currently points at, downloads the tarball for that commit into a [`Store`] and
//! records the result in a [`Cache`] keyed by the commit alone. The input returned from a
//! fetch is locked: it carries the `rev` and the tree's `lastModified` time, and fetching it
//! again never touches the network while the cached tree is still present.
//!
//! # Addresses
//!
//! ```text
//! <github|gitlab>:<owner>/<repo>[/<ref-or-rev>][?ref=<ref>&rev=<rev>&host=<host>]
//! ```
//!
//! A 40 character hex third path segment is a commit hash; anything else must be a valid
//! branch or tag name. `host` selects a self-hosted instance (GitHub Enterprise, a private
//! GitLab) instead of `github.com`/`gitlab.com`.
//!
//! # Usage
//!
//! Parse an address:
//!
//! ```rust
//! use git_archive::{Registry, Settings};
//!
//! let registry = Registry::with_default_providers(Settings::default());
//! let input = registry.input_from_url("github:NixOS/nixpkgs/nixos-23.05")?;
//! assert_eq!(input.owner()?, "NixOS");
//! assert_eq!(input.get_ref()?, Some("nixos-23.05"));
//! assert!(!input.has_all_info());
//! # Ok::<(), git_archive::Error>(())
//! ```
//!
//! Fetch it into a local store:
//!
//! ```rust,no_run
//! use git_archive::{FileCache, LocalStore, Registry, Settings};
//!
//! # fn main() -> Result<(), git_archive::Error> {
//! let settings = Settings::default().with_env_overrides();
//! let store = LocalStore::open("/tmp/git-archive/store", &settings.user_agent)?;
//! let cache = FileCache::load("/tmp/git-archive")?;
//! let registry = Registry::with_default_providers(settings);
//!
//! let input = registry.input_from_url("gitlab:inkscape/inkscape")?;
//! let (tree, locked) = registry.fetch(&store, &cache, &input)?;
//! println!("{locked} is at {}", tree.actual_path.display());
//! # Ok(())
//! # }
//! ```

mod attrs;
mod cache;
mod error;
mod fetch;
mod git;
mod hash;
mod input;
pub mod provider;
mod registry;
mod settings;
mod store;
pub mod url;

#[doc(inline)]
pub use crate::attrs::{Attr, Attrs, get_int_attr, get_str_attr, maybe_get_int_attr, maybe_get_str_attr};
#[doc(inline)]
pub use crate::cache::{Cache, CacheEntry, FileCache};
#[doc(inline)]
pub use crate::error::{Error, Result};
#[doc(inline)]
pub use crate::fetch::{TREE_KIND, Tree, cache_key};
#[doc(inline)]
pub use crate::git::CloneRequest;
#[doc(inline)]
pub use crate::hash::{InvalidRevision, Revision};
#[doc(inline)]
pub use crate::input::{ALLOWED_ATTRS, Input};
#[doc(inline)]
pub use crate::provider::{ArchiveApi, DownloadRequest, GitHub, GitLab, Provider};
#[doc(inline)]
pub use crate::registry::Registry;
#[doc(inline)]
pub use crate::settings::{GITHUB_TOKEN_VAR, GITLAB_TOKEN_VAR, Settings};
#[doc(inline)]
pub use crate::store::{DownloadedTarball, LocalStore, Store, StorePath};
