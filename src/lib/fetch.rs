//! The shared fetch algorithm: resolve a revision, consult the cache, download on a miss.

use std::path::PathBuf;

use crate::attrs::{self, Attrs};
use crate::cache::Cache;
use crate::error::Result;
use crate::hash::Revision;
use crate::input::Input;
use crate::provider::Provider;
use crate::settings::Settings;
use crate::store::{Store, StorePath};

/// The kind recorded in every cache key, shared by all providers.
pub const TREE_KIND: &str = "tree-archive";

/// A fetched source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    /// Where the tree lives on the local filesystem.
    pub actual_path: PathBuf,
    pub store_path: StorePath,
}

/// The cache key for the tree at `rev`. Only the commit hash identifies the tree; in
/// particular `host` is left out, so mirrors serving the same commit share an entry.
pub fn cache_key(rev: &Revision) -> Attrs {
    crate::attrs! {
        "type" => TREE_KIND,
        "rev" => rev.git_rev(),
    }
}

impl Provider {
    /// Fetch the tree `input` points at, returning it along with a copy of `input` that is
    /// locked to the fetched revision and carries its `lastModified`.
    ///
    /// At most one revision lookup and one download happen per call. Nothing is written to
    /// `cache` unless the download and unpack both succeed.
    pub fn fetch(
        &self,
        settings: &Settings,
        store: &dyn Store,
        cache: &dyn Cache,
        input: &Input,
    ) -> Result<(Tree, Input)> {
        let mut input = input.clone();
        let rev = match input.get_rev()? {
            Some(rev) => rev,
            None => {
                if input.get_ref()?.is_none() {
                    input.set_ref("HEAD");
                }
                self.get_rev_from_ref(settings, store, &input)?
            }
        };
        input.set_rev(rev);

        let key = cache_key(&rev);
        if let Some((value, store_path)) = cache.lookup(&key)? {
            let last_modified = attrs::maybe_get_int_attr(&value, "lastModified")
                .ok()
                .flatten();
            match last_modified {
                Some(last_modified) if store.is_valid_path(&store_path) => {
                    input.set_last_modified(last_modified);
                    tracing::debug!("using cached tree {store_path} for {input}");
                    let tree = Tree {
                        actual_path: store.to_real_path(&store_path),
                        store_path,
                    };
                    return Ok((tree, input));
                }
                Some(_) => tracing::warn!(
                    "cached tree {store_path} for {input} is gone, downloading again"
                ),
                None => tracing::warn!(
                    "cache entry for {input} has no usable lastModified, downloading again"
                ),
            }
        }

        let request = self.get_download_url(settings, &input)?;
        tracing::info!("downloading {input}");
        let downloaded = store.download_tarball(&request, "source")?;
        input.set_last_modified(downloaded.last_modified);

        let value = crate::attrs! {
            "rev" => rev.git_rev(),
            "lastModified" => downloaded.last_modified,
        };
        cache.add(&key, value, &downloaded.store_path, true)?;

        let tree = Tree {
            actual_path: store.to_real_path(&downloaded.store_path),
            store_path: downloaded.store_path,
        };
        Ok((tree, input))
    }
}


#[cfg(test)]
mod test_fetch {
    use super::test_support::RecordingStore;
    use super::*;
    use crate::Registry;
    use crate::attrs::Attr;
    use crate::cache::FileCache;
    use crate::error::Error;

    const REV: &str = "7b5b5d2f3bbc4e5ed0f5d8e7ad4e0fc74c4a4a52";
    const OTHER_REV: &str = "0123456789abcdef0123456789abcdef01234567";

    fn registry() -> Registry {
        Registry::with_default_providers(Settings::default())
    }

    fn nixpkgs_store() -> RecordingStore {
        RecordingStore::new()
            .with_file(
                "https://api.github.com/repos/NixOS/nixpkgs/commits/nixos-23.05",
                &format!(r#"{{"sha": "{REV}"}}"#),
            )
            .with_tarball(
                &format!("https://api.github.com/repos/NixOS/nixpkgs/tarball/{REV}"),
                1_686_000_000,
            )
    }

    #[test]
    fn resolve_download_and_lock() {
        let registry = registry();
        let store = nixpkgs_store();
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = FileCache::load(cache_dir.path()).unwrap();

        let input = registry.input_from_url("github:NixOS/nixpkgs/nixos-23.05").unwrap();
        assert!(!input.has_all_info());

        let (tree, locked) = registry.fetch(&store, &cache, &input).unwrap();
        assert_eq!(locked.get_ref().unwrap(), None);
        assert_eq!(locked.get_rev().unwrap().unwrap().git_rev(), REV);
        assert_eq!(locked.last_modified().unwrap(), Some(1_686_000_000));
        assert!(locked.has_all_info());
        assert!(tree.actual_path.join("README.md").is_file());
        assert_eq!(store.file_downloads(), 1);
        assert_eq!(store.tarball_downloads(), 1);

        let (value, path) = cache
            .lookup(&cache_key(&REV.parse().unwrap()))
            .unwrap()
            .unwrap();
        assert_eq!(path, tree.store_path);
        assert_eq!(value.get("lastModified"), Some(&Attr::from(1_686_000_000u64)));
        assert_eq!(value.get("rev"), Some(&Attr::from(REV)));
    }

    #[test]
    fn locked_input_is_served_from_cache() {
        let registry = registry();
        let store = nixpkgs_store();
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = FileCache::load(cache_dir.path()).unwrap();
        let input = registry.input_from_url("github:NixOS/nixpkgs/nixos-23.05").unwrap();

        let (first_tree, locked) = registry.fetch(&store, &cache, &input).unwrap();
        let (second_tree, relocked) = registry.fetch(&store, &cache, &locked).unwrap();

        assert_eq!(first_tree, second_tree);
        assert_eq!(locked, relocked);
        assert_eq!(store.file_downloads(), 1);
        assert_eq!(store.tarball_downloads(), 1);
    }

    #[test]
    fn missing_ref_resolves_head() {
        let store = RecordingStore::new()
            .with_file(
                "https://api.github.com/repos/a/b/commits/HEAD",
                &format!(r#"{{"sha": "{OTHER_REV}"}}"#),
            )
            .with_tarball(
                &format!("https://api.github.com/repos/a/b/tarball/{OTHER_REV}"),
                1,
            );
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = FileCache::load(cache_dir.path()).unwrap();
        let registry = registry();
        let input = registry.input_from_url("github:a/b").unwrap();
        let (_, locked) = registry.fetch(&store, &cache, &input).unwrap();
        assert_eq!(locked.get_ref().unwrap(), None);
        assert_eq!(locked.get_rev().unwrap().unwrap().git_rev(), OTHER_REV);
    }

    #[test]
    fn rev_skips_resolution() {
        let store = RecordingStore::new().with_tarball(
            &format!("https://gitlab.com/api/v4/projects/g%2Fp/repository/archive.tar.gz?sha={REV}"),
            5,
        );
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = FileCache::load(cache_dir.path()).unwrap();
        let registry = registry();
        let input = registry.input_from_url(&format!("gitlab:g/p/{REV}")).unwrap();
        let (_, locked) = registry.fetch(&store, &cache, &input).unwrap();
        assert_eq!(store.file_downloads(), 0);
        assert_eq!(store.tarball_downloads(), 1);
        assert_eq!(locked.last_modified().unwrap(), Some(5));
    }

    #[test]
    fn host_is_not_part_of_the_cache_key() {
        let store = RecordingStore::new()
            .with_tarball(&format!("https://api.github.com/repos/a/b/tarball/{REV}"), 9);
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = FileCache::load(cache_dir.path()).unwrap();
        let registry = registry();

        let public = registry.input_from_url(&format!("github:a/b/{REV}")).unwrap();
        let mirror = registry
            .input_from_url(&format!("github:a/b/{REV}?host=ghe.example.com"))
            .unwrap();
        let (public_tree, _) = registry.fetch(&store, &cache, &public).unwrap();
        let (mirror_tree, mirror_locked) = registry.fetch(&store, &cache, &mirror).unwrap();

        assert_eq!(public_tree, mirror_tree);
        assert_eq!(store.tarball_downloads(), 1);
        assert_eq!(mirror_locked.host().unwrap(), Some("ghe.example.com"));
        assert_eq!(mirror_locked.last_modified().unwrap(), Some(9));
    }

    #[test]
    fn failed_download_leaves_no_entry() {
        let store = RecordingStore::new();
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = FileCache::load(cache_dir.path()).unwrap();
        let registry = registry();
        let input = registry.input_from_url(&format!("github:a/b/{REV}")).unwrap();

        let err = registry.fetch(&store, &cache, &input).unwrap_err();
        assert!(matches!(err, Error::HttpStatus { .. }));
        assert!(cache.is_empty());
        assert!(!FileCache::exists(cache_dir.path()));
    }

    #[test]
    fn resolution_error_aborts_before_download() {
        let store = RecordingStore::new()
            .with_file("https://api.github.com/repos/a/b/commits/main", r#"{"message":"x"}"#);
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = FileCache::load(cache_dir.path()).unwrap();
        let registry = registry();
        let input = registry.input_from_url("github:a/b/main").unwrap();

        let err = registry.fetch(&store, &cache, &input).unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
        assert_eq!(store.tarball_downloads(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn stale_entry_is_downloaded_again() {
        let store = RecordingStore::new()
            .with_tarball(&format!("https://api.github.com/repos/a/b/tarball/{REV}"), 3);
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = FileCache::load(cache_dir.path()).unwrap();
        cache
            .add(
                &cache_key(&REV.parse().unwrap()),
                crate::attrs! { "rev" => REV, "lastModified" => 1u64 },
                &StorePath::new("deleted-source"),
                true,
            )
            .unwrap();
        let registry = registry();
        let input = registry.input_from_url(&format!("github:a/b/{REV}")).unwrap();

        let (tree, locked) = registry.fetch(&store, &cache, &input).unwrap();
        assert_eq!(store.tarball_downloads(), 1);
        assert_eq!(locked.last_modified().unwrap(), Some(3));
        assert_ne!(tree.store_path, StorePath::new("deleted-source"));
        assert_eq!(
            cache.lookup(&cache_key(&REV.parse().unwrap())).unwrap().unwrap().1,
            tree.store_path
        );
    }

    #[test]
    fn entry_without_last_modified_is_downloaded_again() {
        let store = RecordingStore::new()
            .with_tarball(&format!("https://api.github.com/repos/a/b/tarball/{REV}"), 11);
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = FileCache::load(cache_dir.path()).unwrap();
        let registry = registry();
        let input = registry.input_from_url(&format!("github:a/b/{REV}")).unwrap();

        // Put a tree in the store, then strip the entry's metadata
        let (tree, _) = registry.fetch(&store, &cache, &input).unwrap();
        cache
            .add(
                &cache_key(&REV.parse().unwrap()),
                crate::attrs! { "rev" => REV },
                &tree.store_path,
                true,
            )
            .unwrap();

        let (_, locked) = registry.fetch(&store, &cache, &input).unwrap();
        assert_eq!(store.tarball_downloads(), 2);
        assert_eq!(locked.last_modified().unwrap(), Some(11));
        assert!(locked.has_all_info());
        let (value, _) = cache
            .lookup(&cache_key(&REV.parse().unwrap()))
            .unwrap()
            .unwrap();
        assert_eq!(value.get("lastModified"), Some(&Attr::from(11u64)));
    }

    #[test]
    fn locked_attrs_input_is_served_from_cache() {
        let registry = registry();
        let store = nixpkgs_store();
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = FileCache::load(cache_dir.path()).unwrap();
        let branch = registry.input_from_url("github:NixOS/nixpkgs/nixos-23.05").unwrap();
        let (tree, _) = registry.fetch(&store, &cache, &branch).unwrap();
        assert_eq!(store.file_downloads(), 1);

        let input = registry
            .input_from_attrs(crate::attrs! {
                "type" => "github",
                "owner" => "NixOS",
                "repo" => "nixpkgs",
                "rev" => REV,
                "lastModified" => 1_686_000_000u64,
            })
            .unwrap();
        assert!(input.has_all_info());

        let (cached_tree, locked) = registry.fetch(&store, &cache, &input).unwrap();
        assert_eq!(cached_tree, tree);
        assert_eq!(locked, input);
        assert_eq!(store.file_downloads(), 1);
        assert_eq!(store.tarball_downloads(), 1);
    }

    #[test]
    fn token_is_sent_on_both_requests() {
        let registry = Registry::with_default_providers(Settings {
            github_access_token: Some("ghp_secret".into()),
            ..Settings::default()
        });
        let store = nixpkgs_store();
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = FileCache::load(cache_dir.path()).unwrap();
        let input = registry.input_from_url("github:NixOS/nixpkgs/nixos-23.05").unwrap();
        registry.fetch(&store, &cache, &input).unwrap();

        let requests = store.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        for request in requests.iter() {
            assert_eq!(
                request.access_header,
                Some(("Authorization".to_string(), "token ghp_secret".to_string()))
            );
        }
    }
}
