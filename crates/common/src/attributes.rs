//! File attributes and the synthetic POSIX layer on top of them.
//!
//! The store has no permission bits. Reads get a synthesized `permissions`
//! entry so clients that insist on one keep working; writes have the entry
//! removed before anything downstream sees it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

pub const SIZE: &str = "size";
pub const LAST_MODIFIED_TIME: &str = "lastModifiedTime";
pub const IS_DIRECTORY: &str = "isDirectory";
pub const IS_REGULAR_FILE: &str = "isRegularFile";
pub const PERMISSIONS: &str = "permissions";

pub const DIRECTORY_PERMISSIONS: u32 = 0o755;
pub const FILE_PERMISSIONS: u32 = 0o644;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Bool(bool),
    Size(u64),
    Time(DateTime<Utc>),
    Permissions(u32),
    Text(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Size(v) => write!(f, "{v}"),
            Self::Time(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Permissions(v) => write!(f, "{v:o}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

/// Attribute name to value. Ordered so listings and logs are stable.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Attributes of a regular file.
pub fn file_attributes(size: u64, last_modified: DateTime<Utc>) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert(SIZE.to_string(), AttributeValue::Size(size));
    attrs.insert(
        LAST_MODIFIED_TIME.to_string(),
        AttributeValue::Time(last_modified),
    );
    attrs.insert(IS_DIRECTORY.to_string(), AttributeValue::Bool(false));
    attrs.insert(IS_REGULAR_FILE.to_string(), AttributeValue::Bool(true));
    attrs
}

/// Attributes of an emulated directory.
pub fn directory_attributes() -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert(SIZE.to_string(), AttributeValue::Size(0));
    attrs.insert(IS_DIRECTORY.to_string(), AttributeValue::Bool(true));
    attrs.insert(IS_REGULAR_FILE.to_string(), AttributeValue::Bool(false));
    attrs
}

pub fn is_directory(attrs: &Attributes) -> bool {
    matches!(attrs.get(IS_DIRECTORY), Some(AttributeValue::Bool(true)))
}

/// Drop the `permissions` entry from an attribute write request.
pub fn without_permissions(attrs: &Attributes) -> Attributes {
    attrs
        .iter()
        .filter(|(name, _)| name.as_str() != PERMISSIONS)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// A copy of `attrs` that is guaranteed to carry `permissions`.
///
/// An existing entry is kept; otherwise 755 for directories and 644 for
/// everything else.
pub fn with_synthetic_permissions(attrs: &Attributes) -> Attributes {
    let mut result = attrs.clone();
    if !result.contains_key(PERMISSIONS) {
        let mode = if is_directory(attrs) {
            DIRECTORY_PERMISSIONS
        } else {
            FILE_PERMISSIONS
        };
        result.insert(PERMISSIONS.to_string(), AttributeValue::Permissions(mode));
    }
    result
}
