use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::provider::{FileSystemHandle, ProviderError};

/// Maps a username to the backend handle built for that user.
///
/// Handles live for the lifetime of the process; there is no eviction.
pub trait UserFileSystemResolver: Send + Sync {
    /// The handle previously associated with `username`, if any.
    fn resolve(&self, username: &str) -> Option<FileSystemHandle>;

    /// Associate `handle` with `username`, replacing any earlier handle.
    fn associate(&self, username: &str, handle: FileSystemHandle);

    /// Resolve `username`, or build and associate a handle with `init`.
    ///
    /// The lookup, construction and association run as one step, so two
    /// sessions for the same user never both construct a handle.
    fn resolve_or_try_insert(
        &self,
        username: &str,
        init: &mut dyn FnMut() -> Result<FileSystemHandle, ProviderError>,
    ) -> Result<FileSystemHandle, ProviderError>;
}

/// Process-wide handle cache guarded by a single lock.
///
/// Contention is one construction per distinct user, so a global lock is
/// enough.
#[derive(Debug, Default)]
pub struct DefaultUserFileSystemResolver {
    handles: Mutex<HashMap<String, FileSystemHandle>>,
}

impl DefaultUserFileSystemResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }
}

impl UserFileSystemResolver for DefaultUserFileSystemResolver {
    fn resolve(&self, username: &str) -> Option<FileSystemHandle> {
        self.handles.lock().get(username).cloned()
    }

    fn associate(&self, username: &str, handle: FileSystemHandle) {
        debug!(username = %username, key = %handle.key(), "associating file system");
        self.handles.lock().insert(username.to_string(), handle);
    }

    fn resolve_or_try_insert(
        &self,
        username: &str,
        init: &mut dyn FnMut() -> Result<FileSystemHandle, ProviderError>,
    ) -> Result<FileSystemHandle, ProviderError> {
        let mut handles = self.handles.lock();
        if let Some(handle) = handles.get(username) {
            return Ok(handle.clone());
        }
        let handle = init()?;
        debug!(username = %username, key = %handle.key(), "associating file system");
        handles.insert(username.to_string(), handle.clone());
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use storage::Storage;

    use super::*;
    use crate::provider::S3FileSystem;

    async fn handle(key: &str) -> FileSystemHandle {
        let storage = Storage::in_memory(["bucket"]).await.unwrap();
        Arc::new(S3FileSystem::new(key, "localhost", Arc::new(storage), Default::default()))
    }

    #[tokio::test]
    async fn test_resolve_returns_same_handle() {
        let resolver = DefaultUserFileSystemResolver::new();
        let fs = handle("bob@localhost").await;
        resolver.associate("bob", fs.clone());

        let first = resolver.resolve("bob").unwrap();
        let second = resolver.resolve("bob").unwrap();
        assert!(Arc::ptr_eq(&first, &fs));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unknown_user_is_empty() {
        let resolver = DefaultUserFileSystemResolver::new();
        assert!(resolver.resolve("nobody").is_none());
        assert!(resolver.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_first_use_constructs_once() {
        let resolver = Arc::new(DefaultUserFileSystemResolver::new());
        let built = Arc::new(AtomicUsize::new(0));
        let template = handle("bob@localhost").await;

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let resolver = resolver.clone();
            let built = built.clone();
            let template = template.clone();
            tasks.push(tokio::spawn(async move {
                resolver
                    .resolve_or_try_insert("bob", &mut || {
                        built.fetch_add(1, Ordering::SeqCst);
                        Ok(Arc::new(template.as_ref().clone()))
                    })
                    .unwrap()
            }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(resolver.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_construction_is_not_cached() {
        let resolver = DefaultUserFileSystemResolver::new();
        let err = resolver
            .resolve_or_try_insert("bob", &mut || Err(ProviderError::UsernameNotSpecified))
            .unwrap_err();
        assert!(matches!(err, ProviderError::UsernameNotSpecified));
        assert!(resolver.resolve("bob").is_none());
    }
}
