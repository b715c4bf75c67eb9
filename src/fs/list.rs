//! Formats directory contents for LIST, NLST and MLSD.
//!
//! Owner and group render as decimal uid/gid: name-service lookups are a
//! known hazard in statically linked builds and listings do not need them.

use chrono::{DateTime, Utc};
use std::{
    fmt::Write as _,
    io,
    path::Path,
    time::{Duration, SystemTime},
};

const SIX_MONTHS: Duration = Duration::from_secs(182 * 24 * 60 * 60);

/// Flags extracted from the LIST argument string.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    /// `-a`: include entries whose names start with a dot.
    pub show_hidden: bool,
}

impl ListOptions {
    /// Parse `-a` style flags out of a LIST argument.
    pub fn from_flags(flags: &str) -> Self {
        ListOptions {
            show_hidden: flags.split_whitespace().any(|f| f.starts_with('-') && f.contains('a')),
        }
    }
}

/// Produce the LIST response body: a `total N` line followed by one
/// Unix-style long line per entry, CRLF-terminated.
#[tracing_attributes::instrument]
pub async fn list(dir: &Path, options: ListOptions) -> io::Result<Vec<u8>> {
    let now = SystemTime::now();
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut blocks: u64 = 0;
    let mut lines = String::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !options.show_hidden && name.starts_with('.') {
            continue;
        }
        let md = match entry.metadata().await {
            Ok(md) => md,
            // The entry may have vanished between readdir and stat.
            Err(_) => continue,
        };
        blocks += block_count(&md);
        let _ = writeln!(lines, "{}\r", long_line(&name, &md, now));
    }
    let mut out = format!("total {}\r\n", blocks);
    out.push_str(&lines);
    Ok(out.into_bytes())
}

/// Produce the NLST response body: bare names, CRLF-terminated.
pub async fn name_list(dir: &Path) -> io::Result<Vec<u8>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut out = String::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let _ = writeln!(out, "{}\r", name);
    }
    Ok(out.into_bytes())
}

/// Produce the MLSD response body. `virtual_dir` is the listed directory as
/// the client knows it, used for the `cdir`/`pdir` entries. `writable` feeds
/// the `perm` fact and reflects the session user's read-only flag.
#[tracing_attributes::instrument]
pub async fn machine_list(dir: &Path, virtual_dir: &Path, writable: bool) -> io::Result<Vec<u8>> {
    let mut out = String::new();
    let dir_md = tokio::fs::metadata(dir).await?;
    let _ = writeln!(out, "{}\r", machine_line(".", &dir_md, Some("cdir"), writable));
    if virtual_dir != Path::new("/") {
        let _ = writeln!(out, "{}\r", machine_line("..", &dir_md, Some("pdir"), writable));
    }
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let md = match entry.metadata().await {
            Ok(md) => md,
            Err(_) => continue,
        };
        let _ = writeln!(out, "{}\r", machine_line(&name, &md, None, writable));
    }
    Ok(out.into_bytes())
}

/// A single LIST-format line for one path, used by STAT with an argument.
pub async fn stat_line(host: &Path) -> io::Result<String> {
    let md = tokio::fs::symlink_metadata(host).await?;
    let name = host
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "/".to_string());
    Ok(long_line(&name, &md, SystemTime::now()))
}

/// `YYYYMMDDHHMMSS` in UTC, as used by MDTM replies and the MLSD `modify` fact.
pub fn modify_timestamp(md: &std::fs::Metadata) -> String {
    let modified = md.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    DateTime::<Utc>::from(modified).format("%Y%m%d%H%M%S").to_string()
}

fn long_line(name: &str, md: &std::fs::Metadata, now: SystemTime) -> String {
    let file_type = if md.is_dir() {
        'd'
    } else if md.file_type().is_symlink() {
        'l'
    } else {
        '-'
    };
    format!(
        "{}{} {} {} {} {} {} {}",
        file_type,
        mode_string(md),
        nlink(md),
        uid(md),
        gid(md),
        md.len(),
        list_timestamp(md, now),
        name,
    )
}

fn machine_line(name: &str, md: &std::fs::Metadata, kind_override: Option<&str>, writable: bool) -> String {
    let kind = kind_override.unwrap_or(if md.is_dir() { "dir" } else { "file" });
    let perm = match (md.is_dir() || kind_override.is_some(), writable) {
        (true, true) => "flcdmpe",
        (true, false) => "el",
        (false, true) => "adfrw",
        (false, false) => "r",
    };
    format!(
        "type={};size={};modify={};perm={}; {}",
        kind,
        md.len(),
        modify_timestamp(md),
        perm,
        name,
    )
}

// `MMM DD HH:MM` for files touched within the last six months, `MMM DD  YYYY`
// otherwise.
fn list_timestamp(md: &std::fs::Metadata, now: SystemTime) -> String {
    let modified = md.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    let recent = match now.duration_since(modified) {
        Ok(age) => age <= SIX_MONTHS,
        // Future mtimes count as recent.
        Err(_) => true,
    };
    let when = DateTime::<Utc>::from(modified);
    if recent {
        when.format("%b %d %H:%M").to_string()
    } else {
        when.format("%b %d  %Y").to_string()
    }
}

#[cfg(unix)]
fn mode_string(md: &std::fs::Metadata) -> String {
    use std::os::unix::fs::MetadataExt;
    let mode = md.mode();
    let mut out = String::with_capacity(9);
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(not(unix))]
fn mode_string(md: &std::fs::Metadata) -> String {
    if md.permissions().readonly() {
        "r--r--r--".to_string()
    } else {
        "rw-rw-rw-".to_string()
    }
}

#[cfg(unix)]
fn nlink(md: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    md.nlink()
}

#[cfg(not(unix))]
fn nlink(_md: &std::fs::Metadata) -> u64 {
    1
}

#[cfg(unix)]
fn uid(md: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    md.uid()
}

#[cfg(not(unix))]
fn uid(_md: &std::fs::Metadata) -> u32 {
    0
}

#[cfg(unix)]
fn gid(md: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    md.gid()
}

#[cfg(not(unix))]
fn gid(_md: &std::fs::Metadata) -> u32 {
    0
}

#[cfg(unix)]
fn block_count(md: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    md.blocks()
}

#[cfg(not(unix))]
fn block_count(md: &std::fs::Metadata) -> u64 {
    (md.len() + 511) / 512
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flags_parsing() {
        assert!(ListOptions::from_flags("-a").show_hidden);
        assert!(ListOptions::from_flags("-la").show_hidden);
        assert!(!ListOptions::from_flags("-l").show_hidden);
        assert!(!ListOptions::from_flags("").show_hidden);
    }

    #[tokio::test]
    async fn list_has_totals_and_crlf_lines() {
        let tmp = tempfile::TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("hello.txt"), b"hello world").await.unwrap();
        tokio::fs::create_dir(tmp.path().join("sub")).await.unwrap();
        tokio::fs::write(tmp.path().join(".hidden"), b"x").await.unwrap();

        let body = list(tmp.path(), ListOptions::default()).await.unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("total "));
        let lines: Vec<&str> = text.split("\r\n").filter(|l| !l.is_empty()).collect();
        // totals + two visible entries, hidden one elided
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().any(|l| l.ends_with(" hello.txt") && l.starts_with('-')));
        assert!(lines.iter().any(|l| l.ends_with(" sub") && l.starts_with('d')));
        assert!(!text.contains(".hidden"));
    }

    #[tokio::test]
    async fn list_dash_a_shows_hidden() {
        let tmp = tempfile::TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join(".hidden"), b"x").await.unwrap();
        let body = list(tmp.path(), ListOptions::from_flags("-a")).await.unwrap();
        assert!(String::from_utf8(body).unwrap().contains(".hidden"));
    }

    #[tokio::test]
    async fn nlst_is_bare_names() {
        let tmp = tempfile::TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("a.txt"), b"a").await.unwrap();
        let body = name_list(tmp.path()).await.unwrap();
        assert_eq!(String::from_utf8(body).unwrap(), "a.txt\r\n");
    }

    #[tokio::test]
    async fn mlsd_has_facts_and_dot_entries() {
        let tmp = tempfile::TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("f"), b"abc").await.unwrap();
        let body = machine_list(tmp.path(), Path::new("/sub"), true).await.unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("type=cdir;"));
        assert!(text.contains("type=pdir;"));
        let file_line = text
            .split("\r\n")
            .find(|l| l.ends_with(" f"))
            .expect("file entry missing");
        assert!(file_line.contains("type=file;size=3;modify="));
        assert!(file_line.contains("perm=adfrw;"));
    }

    #[tokio::test]
    async fn mlsd_root_has_no_pdir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let body = machine_list(tmp.path(), Path::new("/"), false).await.unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("type=cdir;"));
        assert!(!text.contains("type=pdir;"));
    }

    #[test]
    fn timestamp_formats() {
        let md = std::fs::metadata(std::env::temp_dir()).unwrap();
        let now = SystemTime::now();
        let recent = list_timestamp(&md, now);
        // Recent files show hour:minute, not a year.
        assert!(recent.contains(':'));
        let far_future = now + Duration::from_secs(400 * 24 * 60 * 60);
        let old = list_timestamp(&md, far_future);
        assert!(!old.contains(':'));
    }
}
