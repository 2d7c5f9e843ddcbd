use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use super::{
    endpoint_host, Environment, Properties, ProviderError, SftpFileSystemProvider, USERNAME,
};

/// Keys backend handles by user, so each user gets (and reuses) their own.
#[derive(Debug)]
pub struct PerUserProvider {
    delegate: Arc<dyn SftpFileSystemProvider>,
}

impl PerUserProvider {
    pub fn new(delegate: Arc<dyn SftpFileSystemProvider>) -> Self {
        Self { delegate }
    }
}

#[async_trait]
impl SftpFileSystemProvider for PerUserProvider {
    fn delegate(&self) -> Option<&dyn SftpFileSystemProvider> {
        Some(self.delegate.as_ref())
    }

    fn overload_properties(
        &self,
        properties: &mut Properties,
        env: &Environment,
    ) -> Result<(), ProviderError> {
        let username = env.get(USERNAME).ok_or(ProviderError::UsernameNotAvailable)?;
        properties.insert(USERNAME.to_string(), username.clone());
        self.delegate.overload_properties(properties, env)
    }

    /// `<username>@<host>`
    fn file_system_key(&self, uri: &Url, properties: &Properties) -> Result<String, ProviderError> {
        let username = properties
            .get(USERNAME)
            .ok_or(ProviderError::UsernameNotSpecified)?;
        let host = endpoint_host(uri)?;
        Ok(format!("{username}@{host}"))
    }
}

#[cfg(test)]
mod tests {
    use storage::Storage;

    use super::*;
    use crate::provider::{DelegatableProvider, FileSystemProviderExt};

    async fn provider() -> PerUserProvider {
        let storage = Storage::in_memory(["bucket"]).await.unwrap();
        PerUserProvider::new(Arc::new(DelegatableProvider::new(Arc::new(storage))))
    }

    fn env(username: &str) -> Environment {
        let mut env = Environment::new();
        env.insert(USERNAME.to_string(), username.to_string());
        env
    }

    #[tokio::test]
    async fn test_username_keys_the_handle() {
        let provider = provider().await;
        let uri = Url::parse("s3://host").unwrap();

        let bob = provider.get_file_system(&uri, &env("bob")).unwrap();
        let alice = provider.get_file_system(&uri, &env("alice")).unwrap();
        let bob_again = provider.get_file_system(&uri, &env("bob")).unwrap();

        assert_eq!(bob.key(), "bob@host");
        assert_eq!(alice.key(), "alice@host");
        assert!(Arc::ptr_eq(&bob, &bob_again));
        assert!(!Arc::ptr_eq(&bob, &alice));
    }

    #[tokio::test]
    async fn test_missing_username() {
        let provider = provider().await;
        let uri = Url::parse("s3://host").unwrap();

        let err = provider
            .get_file_system(&uri, &Environment::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "Username not available");

        let err = provider
            .file_system_key(&uri, &Properties::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "Username not specified");
    }

    #[tokio::test]
    async fn test_invalid_uri() {
        let provider = provider().await;
        let uri = Url::parse("s3://uri+22").unwrap();
        let err = provider.get_file_system(&uri, &env("bob")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid base URI: s3://uri+22");
    }
}
