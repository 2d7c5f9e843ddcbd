use std::sync::Arc;

use async_trait::async_trait;

use super::{Environment, Properties, ProviderError, SftpFileSystemProvider, JAIL};

/// Carries the session's jail root into the handle's properties.
///
/// The empty jail is a valid value; only a missing `JAIL` key is an error.
#[derive(Debug)]
pub struct JailedProvider {
    delegate: Arc<dyn SftpFileSystemProvider>,
}

impl JailedProvider {
    pub fn new(delegate: Arc<dyn SftpFileSystemProvider>) -> Self {
        Self { delegate }
    }
}

#[async_trait]
impl SftpFileSystemProvider for JailedProvider {
    fn delegate(&self) -> Option<&dyn SftpFileSystemProvider> {
        Some(self.delegate.as_ref())
    }

    fn overload_properties(
        &self,
        properties: &mut Properties,
        env: &Environment,
    ) -> Result<(), ProviderError> {
        let jail = env.get(JAIL).ok_or(ProviderError::JailNotAvailable)?;
        properties.insert(JAIL.to_string(), jail.clone());
        self.delegate.overload_properties(properties, env)
    }
}

#[cfg(test)]
mod tests {
    use storage::Storage;
    use url::Url;

    use super::*;
    use crate::provider::{DelegatableProvider, FileSystemProviderExt, ACCESS_KEY};

    async fn provider() -> JailedProvider {
        let storage = Storage::in_memory(["bucket"]).await.unwrap();
        JailedProvider::new(Arc::new(DelegatableProvider::new(Arc::new(storage))))
    }

    #[tokio::test]
    async fn test_jail_required() {
        let provider = provider().await;
        let uri = Url::parse("s3://uri").unwrap();
        let err = provider
            .get_file_system(&uri, &Environment::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "Jail not available");
    }

    #[tokio::test]
    async fn test_jail_recorded_and_key_delegated() {
        let provider = provider().await;
        let uri = Url::parse("s3://uri").unwrap();
        let mut env = Environment::new();
        env.insert(JAIL.to_string(), "users".to_string());
        env.insert(ACCESS_KEY.to_string(), "accessKey".to_string());

        let fs = provider.get_file_system(&uri, &env).unwrap();
        assert_eq!(fs.key(), "accessKey@uri");
        assert_eq!(fs.properties().get(JAIL).unwrap(), "users");
    }

    #[tokio::test]
    async fn test_empty_jail_is_accepted() {
        let provider = provider().await;
        let uri = Url::parse("s3://uri").unwrap();
        let mut env = Environment::new();
        env.insert(JAIL.to_string(), String::new());
        assert!(provider.get_file_system(&uri, &env).is_ok());
    }
}
