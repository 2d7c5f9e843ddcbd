//! Object storage client for the s3sftp gateway.
//!
//! This crate exposes the narrow surface the gateway needs from a backing
//! store: get, put, delete, head and delimiter listing of keys inside a
//! bucket, a server-side copy, and enumeration of the buckets the configured
//! account can see. Backends are provided by the `object_store` crate:
//!
//! - S3 / MinIO via `AmazonS3Builder`
//! - a local directory, where every sub-directory is a bucket
//! - an in-memory store, for tests and ephemeral setups
//!
//! # Example
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use s3sftp_object_store::{ObjectStoreConfig, Storage, StorageClient};
//!
//! # async fn example() -> Result<(), s3sftp_object_store::StorageError> {
//! let storage = Storage::new(ObjectStoreConfig::Memory {
//!     buckets: vec!["bucket".to_string()],
//! })
//! .await?;
//!
//! storage.put("bucket", "home/bob/hello.txt", Bytes::from("hi")).await?;
//! let listing = storage.list("bucket", "home/bob/").await?;
//! assert_eq!(listing.objects.len(), 1);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod storage;

pub use client::{Listing, ObjectInfo, StorageClient};
pub use error::{Result, StorageError};
pub use storage::{ObjectStoreConfig, Storage};
