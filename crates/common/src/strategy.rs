//! Per-session policy values: which bucket, which home, which jail.
//!
//! Each strategy is a pure, total function of an [`SftpSession`]. The empty
//! string is the well defined "bucket root" / "no restriction" value, never
//! an error. Closures implement the traits directly, so ad-hoc policies can
//! be passed without a named type:
//!
//! ```rust
//! use std::sync::Arc;
//! use common::strategy::SessionJail;
//! use common::session::SftpSession;
//!
//! let jail: Arc<dyn SessionJail> = Arc::new(|_: &SftpSession| "users".to_string());
//! ```

use std::sync::Arc;

use crate::session::SftpSession;

/// Selects the bucket a session operates in.
pub trait SessionBucket: Send + Sync {
    fn bucket(&self, session: &SftpSession) -> String;
}

/// Selects the home path (inside the bucket) a session starts in.
pub trait SessionHome: Send + Sync {
    fn home_path(&self, session: &SftpSession) -> String;
}

/// Selects the jail root a session may never resolve outside of.
pub trait SessionJail: Send + Sync {
    fn jail(&self, session: &SftpSession) -> String;
}

impl<F> SessionBucket for F
where
    F: Fn(&SftpSession) -> String + Send + Sync,
{
    fn bucket(&self, session: &SftpSession) -> String {
        self(session)
    }
}

impl<F> SessionHome for F
where
    F: Fn(&SftpSession) -> String + Send + Sync,
{
    fn home_path(&self, session: &SftpSession) -> String {
        self(session)
    }
}

impl<F> SessionJail for F
where
    F: Fn(&SftpSession) -> String + Send + Sync,
{
    fn jail(&self, session: &SftpSession) -> String {
        self(session)
    }
}

/// Every session uses the same bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedSessionBucket(String);

impl SessionBucket for FixedSessionBucket {
    fn bucket(&self, _session: &SftpSession) -> String {
        self.0.clone()
    }
}

/// Home is `<subdir>/<username>`, or just `<username>` when `subdir` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerUserSessionHome {
    subdir: String,
}

impl SessionHome for PerUserSessionHome {
    fn home_path(&self, session: &SftpSession) -> String {
        if self.subdir.is_empty() {
            session.username().to_string()
        } else {
            format!("{}/{}", self.subdir, session.username())
        }
    }
}

/// Every session shares the same home.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedSessionHome(String);

impl SessionHome for FixedSessionHome {
    fn home_path(&self, _session: &SftpSession) -> String {
        self.0.clone()
    }
}

/// Every session shares the same jail root. The empty jail means "no jail".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedSessionJail(String);

impl SessionJail for FixedSessionJail {
    fn jail(&self, _session: &SftpSession) -> String {
        self.0.clone()
    }
}

pub fn simple_session_bucket(bucket: impl Into<String>) -> Arc<dyn SessionBucket> {
    Arc::new(FixedSessionBucket(bucket.into()))
}

pub fn per_user_home(subdir: impl Into<String>) -> Arc<dyn SessionHome> {
    let subdir = subdir.into().trim_matches('/').to_string();
    Arc::new(PerUserSessionHome { subdir })
}

pub fn fixed_home(home: impl Into<String>) -> Arc<dyn SessionHome> {
    Arc::new(FixedSessionHome(home.into()))
}

pub fn no_jail() -> Arc<dyn SessionJail> {
    fixed_jail("")
}

pub fn fixed_jail(jail: impl Into<String>) -> Arc<dyn SessionJail> {
    Arc::new(FixedSessionJail(jail.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;

    fn session(username: &str) -> SftpSession {
        SftpSession::new(SessionId::generate(), username, None)
    }

    #[test]
    fn test_per_user_home() {
        assert_eq!(per_user_home("home").home_path(&session("bob")), "home/bob");
        assert_eq!(per_user_home("/home/").home_path(&session("bob")), "home/bob");
        assert_eq!(per_user_home("").home_path(&session("bob")), "bob");
    }

    #[test]
    fn test_defaults_are_total() {
        let s = session("alice");
        assert_eq!(no_jail().jail(&s), "");
        assert_eq!(simple_session_bucket("bucket").bucket(&s), "bucket");
        assert_eq!(fixed_home("").home_path(&s), "");
    }

    #[test]
    fn test_closure_strategies() {
        let bucket: Arc<dyn SessionBucket> =
            Arc::new(|s: &SftpSession| format!("tenant-{}", s.username()));
        assert_eq!(bucket.bucket(&session("acme")), "tenant-acme");
    }
}
