//! Maps client-supplied virtual paths to host paths confined to a user root.

use std::{
    io,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;

/// Longest path, in bytes, we accept from a client.
pub const PATH_MAX: usize = 4096;

/// Why a client path was refused. All variants surface to the client as a
/// 550 that reveals nothing about the host tree above the user root.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// Embedded NUL or longer than [`PATH_MAX`].
    #[error("malformed path")]
    Malformed,
    /// The path resolves (through symlinks) to somewhere outside the root.
    #[error("path escapes the user root")]
    Escapes,
    /// A component that must exist does not.
    #[error("no such file or directory")]
    NotFound,
}

/// A successfully resolved path: the host path to hand to the filesystem and
/// the normalized virtual path to show the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Where the path lives on the host filesystem.
    pub host: PathBuf,
    /// The normalized absolute path as the client sees it.
    pub virtual_path: PathBuf,
}

/// Resolves virtual paths for one user root. Construction canonicalizes the
/// root so the confinement check below compares real paths byte-exactly.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Create a resolver for the given host directory. Fails if the directory
    /// does not exist or cannot be canonicalized.
    pub async fn new<P: Into<PathBuf>>(root: P) -> io::Result<Self> {
        let root = tokio::fs::canonicalize(root.into()).await?;
        Ok(PathResolver { root })
    }

    /// The canonicalized user root that virtual `/` maps to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lexically normalize `arg` against the virtual `cwd`: `.` and `..` are
    /// resolved without touching the filesystem, and `..` above the virtual
    /// root clamps to the root. The result is always absolute.
    pub fn normalize(cwd: &Path, arg: &str) -> Result<PathBuf, PathError> {
        if arg.as_bytes().contains(&0) || arg.len() > PATH_MAX {
            return Err(PathError::Malformed);
        }
        let joined = if arg.starts_with('/') {
            PathBuf::from(arg)
        } else {
            cwd.join(arg)
        };
        let mut stack: Vec<&std::ffi::OsStr> = Vec::new();
        for component in joined.components() {
            match component {
                Component::RootDir | Component::Prefix(_) => stack.clear(),
                Component::CurDir => {}
                Component::ParentDir => {
                    stack.pop();
                }
                Component::Normal(segment) => stack.push(segment),
            }
        }
        let mut virtual_path = PathBuf::from("/");
        for segment in stack {
            virtual_path.push(segment);
        }
        Ok(virtual_path)
    }

    /// Resolve a client path to a host path guaranteed to lie under the root.
    /// Symlinks are followed; if following them leaves the root the path is
    /// rejected as if it did not exist.
    #[tracing_attributes::instrument]
    pub async fn resolve(&self, cwd: &Path, arg: &str) -> Result<Resolved, PathError> {
        let virtual_path = Self::normalize(cwd, arg)?;
        let relative = virtual_path.strip_prefix("/").expect("normalized paths are absolute");
        let host = self.root.join(relative);
        self.confine(&host).await?;
        Ok(Resolved { host, virtual_path })
    }

    // Realpath check: canonicalize the deepest existing ancestor of `host`
    // and require it to stay under the root. The final components may be
    // missing (uploads create them); missing components cannot escape because
    // normalization already removed every `..`.
    async fn confine(&self, host: &Path) -> Result<(), PathError> {
        let mut probe = host.to_path_buf();
        loop {
            match tokio::fs::symlink_metadata(&probe).await {
                Ok(_) => break,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    if !probe.pop() {
                        return Err(PathError::NotFound);
                    }
                }
                Err(_) => return Err(PathError::NotFound),
            }
        }
        let real = tokio::fs::canonicalize(&probe).await.map_err(|_| PathError::NotFound)?;
        if real.starts_with(&self.root) {
            Ok(())
        } else {
            Err(PathError::Escapes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalize_relative_against_cwd() {
        let cwd = Path::new("/reports");
        assert_eq!(PathResolver::normalize(cwd, "jan.csv").unwrap(), PathBuf::from("/reports/jan.csv"));
        assert_eq!(PathResolver::normalize(cwd, "./jan.csv").unwrap(), PathBuf::from("/reports/jan.csv"));
        assert_eq!(PathResolver::normalize(cwd, "../pub").unwrap(), PathBuf::from("/pub"));
    }

    #[test]
    fn normalize_clamps_dotdot_at_root() {
        let cwd = Path::new("/");
        assert_eq!(
            PathResolver::normalize(cwd, "../../etc/passwd").unwrap(),
            PathBuf::from("/etc/passwd")
        );
        assert_eq!(PathResolver::normalize(cwd, "../..").unwrap(), PathBuf::from("/"));
    }

    #[test]
    fn normalize_rejects_nul_and_oversize() {
        let cwd = Path::new("/");
        assert_eq!(PathResolver::normalize(cwd, "a\0b"), Err(PathError::Malformed));
        let long = "x".repeat(PATH_MAX + 1);
        assert_eq!(PathResolver::normalize(cwd, &long), Err(PathError::Malformed));
        let exactly = "x".repeat(PATH_MAX);
        assert!(PathResolver::normalize(cwd, &exactly).is_ok());
    }

    #[tokio::test]
    async fn resolve_stays_under_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        tokio::fs::create_dir(tmp.path().join("sub")).await.unwrap();
        tokio::fs::write(tmp.path().join("sub/file.txt"), b"x").await.unwrap();
        let resolver = PathResolver::new(tmp.path()).await.unwrap();

        let r = resolver.resolve(Path::new("/"), "sub/file.txt").await.unwrap();
        assert_eq!(r.virtual_path, PathBuf::from("/sub/file.txt"));
        assert!(r.host.starts_with(resolver.root()));

        // An escape attempt lexically clamps to the root and resolves inside it.
        let r = resolver.resolve(Path::new("/"), "../../etc/passwd").await.unwrap();
        assert_eq!(r.virtual_path, PathBuf::from("/etc/passwd"));
        assert!(r.host.starts_with(resolver.root()));
    }

    #[tokio::test]
    async fn resolve_allows_missing_leaf_for_uploads() {
        let tmp = tempfile::TempDir::new().unwrap();
        let resolver = PathResolver::new(tmp.path()).await.unwrap();
        let r = resolver.resolve(Path::new("/"), "new-upload.bin").await.unwrap();
        assert_eq!(r.host, resolver.root().join("new-upload.bin"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resolve_rejects_symlink_escape() {
        let outside = tempfile::TempDir::new().unwrap();
        tokio::fs::write(outside.path().join("secret"), b"s").await.unwrap();
        let tmp = tempfile::TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("exit")).unwrap();
        let resolver = PathResolver::new(tmp.path()).await.unwrap();

        let err = resolver.resolve(Path::new("/"), "exit/secret").await.unwrap_err();
        assert_eq!(err, PathError::Escapes);
        let err = resolver.resolve(Path::new("/"), "exit").await.unwrap_err();
        assert_eq!(err, PathError::Escapes);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resolve_follows_symlinks_inside_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        tokio::fs::create_dir(tmp.path().join("data")).await.unwrap();
        tokio::fs::write(tmp.path().join("data/f"), b"x").await.unwrap();
        std::os::unix::fs::symlink(tmp.path().join("data"), tmp.path().join("alias")).unwrap();
        let resolver = PathResolver::new(tmp.path()).await.unwrap();

        let r = resolver.resolve(Path::new("/"), "alias/f").await.unwrap();
        assert_eq!(r.virtual_path, PathBuf::from("/alias/f"));
    }
}
