//! Request target to filesystem path resolution.
//!
//! Resolution happens in two stages. First the target is decoded and its
//! `.`/`..` segments are folded lexically, with the root as a floor that
//! cannot be climbed above. Only then is the filesystem touched, and the
//! canonical path is checked again so a symlink cannot lead outside the
//! root either.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::files::decode_segment;
use crate::http::mime;

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// What a request target names under the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedResource {
    RegularFile {
        /// Canonical path to open
        path: PathBuf,
        size: u64,
        mime: &'static str,
    },
    Directory {
        /// Canonical path of the directory
        path: PathBuf,
        /// Decoded, normalized URL segments below the root
        segments: Vec<String>,
        /// Entries sorted by name
        entries: Vec<DirEntry>,
    },
    NotFound,
    Forbidden,
}

/// Resolves `target` against `root`, which must already be canonical.
pub async fn resolve(root: &Path, target: &str) -> ResolvedResource {
    let segments = match normalize_target(target) {
        Some(segments) => segments,
        None => return ResolvedResource::Forbidden,
    };

    let lexical = segments.iter().fold(root.to_path_buf(), |path, s| path.join(s));

    let real = match fs::canonicalize(&lexical).await {
        Ok(real) => real,
        Err(_) => return ResolvedResource::NotFound,
    };
    if !real.starts_with(root) {
        tracing::debug!(request_target = target, resolved = %real.display(), "symlink escapes document root");
        return ResolvedResource::Forbidden;
    }

    let meta = match fs::metadata(&real).await {
        Ok(meta) => meta,
        Err(_) => return ResolvedResource::NotFound,
    };

    if meta.is_dir() {
        match read_entries(&real).await {
            Some(entries) => ResolvedResource::Directory {
                path: real,
                segments,
                entries,
            },
            None => ResolvedResource::NotFound,
        }
    } else if meta.is_file() {
        // Readability check; the responder reopens the file to stream it.
        if fs::File::open(&real).await.is_err() {
            return ResolvedResource::NotFound;
        }
        ResolvedResource::RegularFile {
            path: real,
            size: meta.len(),
            mime: mime::from_path(&lexical),
        }
    } else {
        ResolvedResource::NotFound
    }
}

/// Decodes a request target into normalized path segments.
///
/// Query strings and fragments are dropped, and absolute-form targets
/// contribute only their path. Returns `None` when the target is not
/// decodable, a segment decodes to something containing a separator or
/// NUL, or `..` would climb above the root.
pub fn normalize_target(target: &str) -> Option<Vec<String>> {
    let raw_path = if target.starts_with('/') {
        target
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string()
    } else {
        url::Url::parse(target).ok()?.path().to_string()
    };

    let mut segments: Vec<String> = Vec::new();
    for raw in raw_path.split('/') {
        let segment = decode_segment(raw)?;
        if segment.contains(['/', '\\', '\0']) {
            return None;
        }
        match segment.as_str() {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            _ => segments.push(segment),
        }
    }
    Some(segments)
}

async fn read_entries(dir: &Path) -> Option<Vec<DirEntry>> {
    let scan = match fs::read_dir(dir).await {
        Ok(mut reader) => collect_entries(&mut reader).await,
        Err(e) => Err(e),
    };
    match scan {
        Ok(entries) => Some(entries),
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to read directory");
            None
        }
    }
}

/// Source of raw directory entries: (file name, full path).
trait EntrySource {
    async fn next_raw(&mut self) -> io::Result<Option<(OsString, PathBuf)>>;
}

impl EntrySource for fs::ReadDir {
    async fn next_raw(&mut self) -> io::Result<Option<(OsString, PathBuf)>> {
        let entry = self.next_entry().await?;
        Ok(entry.map(|e| (e.file_name(), e.path())))
    }
}

/// Reads every entry, sorted by name. Any error ends the scan so a
/// partial listing is never served.
async fn collect_entries<R: EntrySource>(source: &mut R) -> io::Result<Vec<DirEntry>> {
    let mut entries = Vec::new();

    while let Some((raw, path)) = source.next_raw().await? {
        let name = match raw.into_string() {
            Ok(name) => name,
            Err(raw) => {
                tracing::debug!(name = ?raw, "skipping non UTF-8 directory entry");
                continue;
            }
        };
        // Follow symlinks so a link to a directory lists as one.
        let is_dir = fs::metadata(&path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        entries.push(DirEntry { name, is_dir });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
