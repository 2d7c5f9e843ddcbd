//! Shared setup for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use ::common::config::ServerConfiguration;
use ::common::gateway::SftpGateway;
use ::common::session::{SessionId, TransportSession};
use ::common::strategy;
use bytes::Bytes;
use storage::{Storage, StorageClient};
use url::Url;

pub const BUCKET: &str = "bucket";

/// Stand-in for a connection accepted by the SSH layer.
pub struct TestTransport {
    id: SessionId,
    username: String,
}

impl TestTransport {
    pub fn new(username: &str) -> Self {
        Self {
            id: SessionId::generate(),
            username: username.to_string(),
        }
    }
}

impl TransportSession for TestTransport {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn client_address(&self) -> Option<SocketAddr> {
        "127.0.0.1:50022".parse().ok()
    }
}

pub fn configuration(home_subdir: &str, jail: &str) -> ServerConfiguration {
    ServerConfiguration::builder()
        .uri(Url::parse("s3://localhost:9000").unwrap())
        .session_bucket(strategy::simple_session_bucket(BUCKET))
        .session_home(strategy::per_user_home(home_subdir))
        .session_jail(strategy::fixed_jail(jail))
        .build()
        .unwrap()
}

/// In-memory storage with `users/bob` and `users/alice` homes seeded.
pub async fn seeded_storage() -> Arc<Storage> {
    let storage = Arc::new(Storage::in_memory([BUCKET, "other"]).await.unwrap());
    for key in [
        "users/bob/.profile",
        "users/bob/docs/readme.md",
        "users/alice/notes.txt",
        "shared/motd",
    ] {
        storage
            .put(BUCKET, key, Bytes::from(format!("contents of {key}")))
            .await
            .unwrap();
    }
    storage
}

/// A gateway whose sessions live under `users/<name>`, jailed to `jail`.
pub async fn setup_test_env(jail: &str) -> (SftpGateway, Arc<Storage>) {
    let storage = seeded_storage().await;
    let gateway = SftpGateway::builder(configuration("users", jail), storage.clone()).build();
    (gateway, storage)
}
