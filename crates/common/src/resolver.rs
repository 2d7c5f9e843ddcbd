//! Translation of client paths into backing store keys.
//!
//! The store is a flat key space, so resolution is string manipulation and
//! nothing more. A trailing `.` segment is dropped, but `..` segments are
//! kept verbatim: there is no parent object to escape into, and a key that
//! contains a literal `..` only ever addresses an object with that literal
//! name. Do not canonicalize here; if the gateway is ever put in front of a
//! hierarchical backend this needs revisiting.
//!
//! Without a jail the client sees bucket-absolute paths (`/bucket/key`).
//! With a jail the jail root becomes the client's `/`, and the user's home
//! must live inside it.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::cache::UserFileSystemResolver;
use crate::provider::FileSystemHandle;
use crate::session::SftpSession;
use crate::strategy::{SessionBucket, SessionHome, SessionJail};

const SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The session's home lies outside its jail root
    #[error("User directory is outside jailed path: {jail}: {home}")]
    JailViolation { jail: String, home: String },
    /// No backend handle has been set up for the session's user
    #[error("Error finding filesystem.")]
    BackendUnavailable { username: String },
}

/// A resolved location in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackingPath {
    bucket: String,
    key: String,
    visible: String,
}

impl BackingPath {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        let bucket = bucket.into();
        let key = key.into();
        let visible = bucket_absolute(&bucket, &key);
        Self {
            bucket,
            key,
            visible,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The flat key sent to the store. Empty for the bucket root.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The path as the client sees it.
    pub fn visible(&self) -> &str {
        &self.visible
    }

    pub fn is_bucket_root(&self) -> bool {
        self.key.is_empty()
    }

    /// The last key segment, or the bucket name at the root.
    pub fn file_name(&self) -> &str {
        match self.key.rsplit_once(SEPARATOR) {
            Some((_, name)) => name,
            None if self.key.is_empty() => &self.bucket,
            None => &self.key,
        }
    }

    /// Same location with a different key, used by key rewriting layers.
    pub fn with_key(&self, key: impl Into<String>) -> Self {
        Self {
            bucket: self.bucket.clone(),
            key: key.into(),
            visible: self.visible.clone(),
        }
    }

    /// A child of this location.
    pub fn child(&self, name: &str) -> Self {
        let key = join(&self.key, name);
        let visible = if self.visible.ends_with(SEPARATOR) {
            format!("{}{}", self.visible, name)
        } else {
            format!("{}{}{}", self.visible, SEPARATOR, name)
        };
        Self {
            bucket: self.bucket.clone(),
            key,
            visible,
        }
    }
}

impl fmt::Display for BackingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bucket_absolute(&self.bucket, &self.key))
    }
}

/// Resolve `raw` against a bucket, home and jail.
///
/// Pure function of its inputs; the only failure is a home outside a
/// non-empty jail.
pub fn resolve_path(
    raw: &str,
    bucket: &str,
    home: &str,
    jail: &str,
) -> Result<BackingPath, ResolveError> {
    let home = home.trim_matches(SEPARATOR);
    let jail = jail.trim_matches(SEPARATOR);
    let raw = strip_current_dir(raw);

    if jail.is_empty() {
        let key = if raw.is_empty() {
            home.to_string()
        } else if raw.starts_with(SEPARATOR) {
            let absolute = raw.trim_start_matches(SEPARATOR);
            strip_segment_prefix(absolute, bucket)
                .unwrap_or(absolute)
                .to_string()
        } else {
            join(home, raw)
        };
        return Ok(BackingPath::new(bucket, trim_trailing(key)));
    }

    if strip_segment_prefix(home, jail).is_none() {
        return Err(ResolveError::JailViolation {
            jail: jail.to_string(),
            home: home.to_string(),
        });
    }

    let key = if raw.trim_matches(SEPARATOR).is_empty() {
        home.to_string()
    } else if raw.starts_with(SEPARATOR) {
        let absolute = raw.trim_start_matches(SEPARATOR);
        // an already resolved bucket-absolute path that points into the jail
        match strip_segment_prefix(absolute, bucket) {
            Some(rest) if strip_segment_prefix(rest, jail).is_some() => rest.to_string(),
            _ => join(jail, absolute),
        }
    } else {
        join(home, raw)
    };
    let key = trim_trailing(key);

    let relative = strip_segment_prefix(&key, jail).unwrap_or(&key);
    let visible = if relative.is_empty() {
        SEPARATOR.to_string()
    } else if key == home {
        format!("{SEPARATOR}{relative}{SEPARATOR}")
    } else {
        format!("{SEPARATOR}{relative}")
    };

    Ok(BackingPath {
        bucket: bucket.to_string(),
        key,
        visible,
    })
}

/// Resolves client paths for live sessions.
///
/// Looks up the user's backend handle first; a session whose user has no
/// handle cannot resolve anything.
#[derive(Clone)]
pub struct PathResolver {
    bucket: Arc<dyn SessionBucket>,
    home: Arc<dyn SessionHome>,
    jail: Arc<dyn SessionJail>,
    users: Arc<dyn UserFileSystemResolver>,
}

/// A resolved path together with the backend handle it lives on.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    pub file_system: FileSystemHandle,
    pub path: BackingPath,
}

impl PathResolver {
    pub fn new(
        bucket: Arc<dyn SessionBucket>,
        home: Arc<dyn SessionHome>,
        jail: Arc<dyn SessionJail>,
        users: Arc<dyn UserFileSystemResolver>,
    ) -> Self {
        Self {
            bucket,
            home,
            jail,
            users,
        }
    }

    pub fn resolve(&self, raw: &str, session: &SftpSession) -> Result<ResolvedPath, ResolveError> {
        let file_system = self.users.resolve(session.username()).ok_or_else(|| {
            ResolveError::BackendUnavailable {
                username: session.username().to_string(),
            }
        })?;

        let bucket = self.bucket.bucket(session);
        let home = self.home.home_path(session);
        let jail = self.jail.jail(session);
        let path = resolve_path(raw, &bucket, &home, &jail)?;

        trace!(
            username = %session.username(),
            raw = %raw,
            bucket = %path.bucket(),
            key = %path.key(),
            visible = %path.visible(),
            "resolved path"
        );

        Ok(ResolvedPath { file_system, path })
    }
}

fn strip_current_dir(raw: &str) -> &str {
    let mut path = raw;
    while let Some(parent) = path.strip_suffix("/.") {
        path = if parent.is_empty() { "/" } else { parent };
    }
    if path == "." {
        ""
    } else {
        path
    }
}

/// `path` without the leading `prefix` segments, if `path` is `prefix` or
/// lies under it. An empty prefix matches everything.
fn strip_segment_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix(SEPARATOR)
    }
}

fn join(base: &str, child: &str) -> String {
    match (base.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}{SEPARATOR}{child}"),
    }
}

fn trim_trailing(mut key: String) -> String {
    while key.ends_with(SEPARATOR) {
        key.pop();
    }
    key
}

fn bucket_absolute(bucket: &str, key: &str) -> String {
    format!("{SEPARATOR}{bucket}{SEPARATOR}{key}")
}
