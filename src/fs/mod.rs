//! Filesystem helpers: virtual-path resolution, directory listings, unique
//! upload names and the post-upload ownership override.

pub mod list;
pub mod path;

pub use path::{PathError, PathResolver, Resolved};

use crate::options::Ownership;
use std::{io, path::Path};

/// How many names STOU tries before giving up with a transient error.
const UNIQUE_ATTEMPTS: u32 = 100;

/// Create a file with a freshly synthesized name in `dir`. Returns the chosen
/// name and the open file, or `None` when no free name was found within
/// [`UNIQUE_ATTEMPTS`] tries.
pub async fn create_unique(dir: &Path) -> io::Result<Option<(String, tokio::fs::File)>> {
    for _ in 0..UNIQUE_ATTEMPTS {
        let mut raw = [0u8; 8];
        getrandom::getrandom(&mut raw).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let name = format!("stou.{:016x}", u64::from_be_bytes(raw));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&name))
            .await
        {
            Ok(file) => return Ok(Some((name, file))),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(None)
}

/// Apply the configured uid/gid to an uploaded file.
#[cfg(unix)]
pub fn apply_ownership(path: &Path, ownership: Ownership) -> io::Result<()> {
    nix::unistd::chown(
        path,
        Some(nix::unistd::Uid::from_raw(ownership.uid)),
        Some(nix::unistd::Gid::from_raw(ownership.gid)),
    )
    .map_err(|e| io::Error::new(io::ErrorKind::PermissionDenied, e))
}

/// Apply the configured uid/gid to an uploaded file. No-op off unix.
#[cfg(not(unix))]
pub fn apply_ownership(_path: &Path, _ownership: Ownership) -> io::Result<()> {
    Ok(())
}
