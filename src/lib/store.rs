//! The store fetched trees live in, and the HTTP transport that fills it.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use tar::{Archive, EntryType};

use crate::error::{Error, Result};
use crate::provider::DownloadRequest;

/// The name of an object in a [`Store`], relative to the store's root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct StorePath(String);

impl StorePath {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    /// A content-addressed name: a truncated SHA-256 of `content` followed by `name`.
    pub fn from_content(content: &[u8], name: &str) -> Self {
        Self::from_digest(&Sha256::digest(content), name)
    }

    fn from_digest(digest: &[u8], name: &str) -> Self {
        let digest = hex::encode(digest);
        Self(format!("{}-{name}", &digest[..32]))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The result of downloading and unpacking an archive into a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedTarball {
    pub store_path: StorePath,
    /// Newest modification time found in the archive, in seconds since the epoch.
    pub last_modified: u64,
}

/// Holds downloaded objects and hands out stable local paths for them.
///
/// Implementations must be safe to share between threads; they are not required to
/// de-duplicate concurrent downloads of the same URL.
pub trait Store: Send + Sync {
    /// The local filesystem location of `path`.
    fn to_real_path(&self, path: &StorePath) -> PathBuf;

    /// Whether `path` is (still) present.
    fn is_valid_path(&self, path: &StorePath) -> bool;

    /// Download `request` verbatim into the store.
    fn download_file(&self, request: &DownloadRequest, name: &str) -> Result<StorePath>;

    /// Download a gzipped tarball and unpack it into the store. When the archive holds a
    /// single top-level directory, that directory becomes the stored tree.
    fn download_tarball(&self, request: &DownloadRequest, name: &str)
    -> Result<DownloadedTarball>;
}

/// A [`Store`] rooted at a local directory, downloading with a blocking `reqwest` client.
#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
    client: reqwest::blocking::Client,
}

impl LocalStore {
    /// Open (creating if necessary) a store rooted at `root`.
    pub fn open<P: AsRef<Path>>(root: P, user_agent: &str) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()?;
        Ok(Self { root, client })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn download(&self, request: &DownloadRequest) -> Result<Vec<u8>> {
        Ok(self.send(request)?.bytes()?.to_vec())
    }

    /// Issue the GET and check its status, leaving the body unread.
    fn send(&self, request: &DownloadRequest) -> Result<reqwest::blocking::Response> {
        tracing::debug!(
            "GET {} ({})",
            request.url,
            if request.access_header.is_some() {
                "authenticated"
            } else {
                "anonymous"
            }
        );
        let mut builder = self.client.get(&request.url);
        if let Some((name, value)) = &request.access_header {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: request.url.clone(),
                status,
            });
        }
        Ok(response)
    }
}

impl Store for LocalStore {
    fn to_real_path(&self, path: &StorePath) -> PathBuf {
        self.root.join(path.name())
    }

    fn is_valid_path(&self, path: &StorePath) -> bool {
        self.to_real_path(path).exists()
    }

    fn download_file(&self, request: &DownloadRequest, name: &str) -> Result<StorePath> {
        let content = self.download(request)?;
        let store_path = StorePath::from_content(&content, name);
        let dest = self.to_real_path(&store_path);
        if !dest.exists() {
            let mut staged = tempfile::NamedTempFile::new_in(&self.root)?;
            io::Write::write_all(&mut staged, &content)?;
            staged.persist(&dest).map_err(|e| e.error)?;
        }
        Ok(store_path)
    }

    fn download_tarball(
        &self,
        request: &DownloadRequest,
        name: &str,
    ) -> Result<DownloadedTarball> {
        let response = self.send(request)?;
        let staging = tempfile::Builder::new()
            .prefix(".unpack-")
            .tempdir_in(&self.root)?;
        let unpacked = staging.path().join("unpacked");
        fs::create_dir(&unpacked)?;

        // The store path names the compressed stream, so it is only known once fully read
        let mut body = HashingReader::new(response);
        let last_modified = unpack_tarball(&mut body, &unpacked)?;
        io::copy(&mut body, &mut io::sink())?;
        let store_path = StorePath::from_digest(&body.finish(), name);
        let dest = self.to_real_path(&store_path);
        if dest.exists() {
            tracing::debug!("{store_path} is already in the store");
            return Ok(DownloadedTarball {
                store_path,
                last_modified,
            });
        }

        let tree = single_top_level_dir(&unpacked)?.unwrap_or(unpacked);
        // Losing a rename race to another writer of the same content is fine.
        if let Err(err) = fs::rename(&tree, &dest)
            && !dest.exists()
        {
            return Err(err.into());
        }
        tracing::debug!("unpacked {} into {}", request.url, dest.display());
        Ok(DownloadedTarball {
            store_path,
            last_modified,
        })
    }
}

/// Passes reads through while hashing every byte seen.
struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> HashingReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn finish(self) -> Vec<u8> {
        self.hasher.finalize().to_vec()
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

/// Unpack a gzipped tarball streamed from `compressed` into `dir`. Returns the newest entry
/// modification time.
fn unpack_tarball<R: Read>(compressed: R, dir: &Path) -> io::Result<u64> {
    let mut last_modified = 0;
    let mut archive = Archive::new(GzDecoder::new(compressed));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let header = entry.header();
        if matches!(
            header.entry_type(),
            EntryType::XGlobalHeader | EntryType::XHeader
        ) {
            continue;
        }
        last_modified = last_modified.max(header.mtime()?);
        entry.unpack_in(dir)?;
    }
    Ok(last_modified)
}

/// The only entry in `dir`, if there is exactly one and it is a directory.
fn single_top_level_dir(dir: &Path) -> io::Result<Option<PathBuf>> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    if entries.len() == 1 && entries[0].file_type()?.is_dir() {
        Ok(Some(entries.remove(0).path()))
    } else {
        Ok(None)
    }
}


#[cfg(test)]
mod test_unpacking {
    use super::test_support::make_tarball;
    use super::*;

    #[test]
    fn unpack_and_report_newest_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let tarball = make_tarball(
            &[
                ("owner-repo-0123456/README.md", "hello"),
                ("owner-repo-0123456/src/lib.rs", "fn main() {}"),
            ],
            1686000000,
        );
        let last_modified = unpack_tarball(tarball.as_slice(), dir.path()).unwrap();
        assert_eq!(last_modified, 1686000000);
        let top = single_top_level_dir(dir.path()).unwrap().unwrap();
        assert!(top.ends_with("owner-repo-0123456"));
        assert_eq!(
            fs::read_to_string(top.join("src/lib.rs")).unwrap(),
            "fn main() {}"
        );
    }

    #[test]
    fn hashing_reader_matches_content_address() {
        let tarball = make_tarball(&[("a/b", "x")], 42);
        let dir = tempfile::tempdir().unwrap();
        let mut body = HashingReader::new(tarball.as_slice());
        assert_eq!(unpack_tarball(&mut body, dir.path()).unwrap(), 42);
        io::copy(&mut body, &mut io::sink()).unwrap();
        assert_eq!(
            StorePath::from_digest(&body.finish(), "source"),
            StorePath::from_content(&tarball, "source")
        );
    }

    #[test]
    fn several_top_level_entries_keep_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let tarball = make_tarball(&[("a.txt", "a"), ("b/c.txt", "c")], 7);
        unpack_tarball(tarball.as_slice(), dir.path()).unwrap();
        assert_eq!(single_top_level_dir(dir.path()).unwrap(), None);
    }

    #[test]
    fn garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(unpack_tarball(&b"definitely not gzip"[..], dir.path()).is_err());
    }

    #[test]
    fn content_addressed_names() {
        let a = StorePath::from_content(b"one", "source");
        let b = StorePath::from_content(b"one", "source");
        let c = StorePath::from_content(b"two", "source");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.name().ends_with("-source"));
        assert_eq!(a.name().len(), 32 + "-source".len());
    }
}
