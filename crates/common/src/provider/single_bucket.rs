use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use super::{
    Environment, FileSystemHandle, Properties, ProviderError, SftpFileSystemProvider, BUCKET,
};

/// Pins the session to one bucket.
///
/// Handles built through this layer are filtered views: listing top-level
/// containers reports only the session's bucket, and other buckets cannot
/// be addressed.
#[derive(Debug)]
pub struct SingleBucketProvider {
    delegate: Arc<dyn SftpFileSystemProvider>,
}

impl SingleBucketProvider {
    pub fn new(delegate: Arc<dyn SftpFileSystemProvider>) -> Self {
        Self { delegate }
    }
}

#[async_trait]
impl SftpFileSystemProvider for SingleBucketProvider {
    fn delegate(&self) -> Option<&dyn SftpFileSystemProvider> {
        Some(self.delegate.as_ref())
    }

    fn overload_properties(
        &self,
        properties: &mut Properties,
        env: &Environment,
    ) -> Result<(), ProviderError> {
        let bucket = env.get(BUCKET).ok_or(ProviderError::BucketNotAvailable)?;
        properties.insert(BUCKET.to_string(), bucket.clone());
        self.delegate.overload_properties(properties, env)
    }

    fn new_file_system(
        &self,
        uri: &Url,
        properties: &Properties,
        key: &str,
    ) -> Result<FileSystemHandle, ProviderError> {
        let bucket = properties
            .get(BUCKET)
            .ok_or(ProviderError::BucketNotSpecified)?;
        let file_system = self.delegate.new_file_system(uri, properties, key)?;
        Ok(Arc::new(file_system.filtered(bucket.as_str())))
    }
}
