//! Integration tests for per-session resolution and file operations

mod common;

use std::sync::Arc;

use ::common::attributes::{self, AttributeValue, Attributes, PERMISSIONS};
use ::common::cache::DefaultUserFileSystemResolver;
use ::common::prelude::*;
use ::common::provider::DelegatableProvider;
use ::common::subsystem::JailedSftpSubsystemFactory;
use bytes::Bytes;
use parking_lot::Mutex;
use storage::StorageClient;

use common::{setup_test_env, TestTransport, BUCKET};

#[tokio::test]
async fn test_jailed_session_sees_jail_as_root() {
    let (gateway, _storage) = setup_test_env("users").await;
    let bob = gateway.open_session(&TestTransport::new("bob")).unwrap();

    assert_eq!(bob.resolve_file(".").unwrap().visible(), "/bob/");
    assert_eq!(bob.resolve_file("/").unwrap().visible(), "/bob/");
    assert_eq!(
        bob.resolve_file("/bob/file.txt").unwrap().visible(),
        "/bob/file.txt"
    );
    let resolved = bob.resolve_file("/bucket/users/bob/file.txt").unwrap();
    assert_eq!(resolved.visible(), "/bob/file.txt");
    assert_eq!(resolved.key(), "users/bob/file.txt");
    assert_eq!(resolved.bucket(), BUCKET);
}

#[tokio::test]
async fn test_unjailed_session_sees_bucket() {
    let (gateway, _storage) = setup_test_env("").await;
    let bob = gateway.open_session(&TestTransport::new("bob")).unwrap();

    assert_eq!(bob.resolve_file("").unwrap().visible(), "/bucket/users/bob");
    assert_eq!(
        bob.resolve_file("file.txt").unwrap().visible(),
        "/bucket/users/bob/file.txt"
    );
    assert_eq!(bob.resolve_file("/shared/motd").unwrap().key(), "shared/motd");

    // without a jail the rest of the bucket is reachable
    let motd = bob.read_file("/shared/motd").await.unwrap();
    assert_eq!(motd.as_ref(), b"contents of shared/motd");
}

#[tokio::test]
async fn test_home_outside_jail_rejected_at_open() {
    let (gateway, _storage) = setup_test_env("jail").await;
    let err = gateway
        .open_session(&TestTransport::new("bob"))
        .err()
        .unwrap();
    assert!(matches!(
        err,
        GatewayError::Subsystem(SubsystemError::Resolve(ResolveError::JailViolation { .. }))
    ));
    assert_eq!(
        err.to_string(),
        "User directory is outside jailed path: jail: users/bob"
    );
}

#[tokio::test]
async fn test_resolve_without_handle_is_backend_unavailable() {
    let configuration = Arc::new(common::configuration("users", ""));
    let users = Arc::new(DefaultUserFileSystemResolver::new());
    let storage = common::seeded_storage().await;
    let provider = Arc::new(DelegatableProvider::new(storage));

    let subsystem = JailedSftpSubsystemFactory::new(configuration, users)
        .create(SftpSession::of(&TestTransport::new("bob")), provider);

    let err = subsystem.resolve_file(".").unwrap_err();
    assert!(matches!(
        err,
        SubsystemError::Resolve(ResolveError::BackendUnavailable { .. })
    ));
    assert_eq!(err.to_string(), "Error finding filesystem.");
}

#[tokio::test]
async fn test_file_operations_inside_jail() {
    let (gateway, storage) = setup_test_env("users").await;
    let bob = gateway.open_session(&TestTransport::new("bob")).unwrap();

    bob.write_file("hello.txt", Bytes::from("hi")).await.unwrap();
    assert_eq!(
        storage.get(BUCKET, "users/bob/hello.txt").await.unwrap().as_ref(),
        b"hi"
    );
    assert_eq!(
        bob.read_file("/bob/hello.txt").await.unwrap().as_ref(),
        b"hi"
    );

    let names: Vec<String> = bob
        .read_directory(".")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec![".profile", "docs", "hello.txt"]);

    bob.make_directory("projects").await.unwrap();
    assert!(bob.exists("/bob/projects").await.unwrap());
    bob.rename("hello.txt", "projects/hello.txt").await.unwrap();
    assert!(!bob.exists("hello.txt").await.unwrap());

    assert!(matches!(
        bob.remove_directory("projects").await.unwrap_err(),
        SubsystemError::Provider(ProviderError::DirectoryNotEmpty(_))
    ));
    assert!(matches!(
        bob.remove("projects").await.unwrap_err(),
        SubsystemError::Provider(ProviderError::IsADirectory(_))
    ));
    bob.remove("projects/hello.txt").await.unwrap();
    bob.remove_directory("projects").await.unwrap();
    assert!(!bob.exists("projects").await.unwrap());
}

#[tokio::test]
async fn test_positioned_reads_and_writes() {
    let (gateway, storage) = setup_test_env("users").await;
    let bob = gateway.open_session(&TestTransport::new("bob")).unwrap();

    // seeded as "contents of users/bob/.profile"
    assert_eq!(
        bob.read_at(".profile", 9, 2).await.unwrap().as_ref(),
        b"of"
    );
    assert!(bob.read_at(".profile", 1024, 16).await.unwrap().is_empty());

    bob.write_at(".profile", 0, Bytes::from("CONTENTS"))
        .await
        .unwrap();
    assert_eq!(
        storage.get(BUCKET, "users/bob/.profile").await.unwrap().as_ref(),
        b"CONTENTS of users/bob/.profile"
    );

    // chunked upload the way an SFTP client sends it
    for (offset, chunk) in [(0u64, "abc"), (3, "def"), (6, "g")] {
        bob.write_at("upload.bin", offset, Bytes::from(chunk))
            .await
            .unwrap();
    }
    assert_eq!(bob.read_file("upload.bin").await.unwrap().as_ref(), b"abcdefg");
    assert!(matches!(
        bob.read_at("docs", 0, 1).await.unwrap_err(),
        SubsystemError::Provider(ProviderError::IsADirectory(_))
    ));
}

#[tokio::test]
async fn test_dotdot_stays_literal() {
    let (gateway, storage) = setup_test_env("users").await;
    let bob = gateway.open_session(&TestTransport::new("bob")).unwrap();

    // a literal key, not alice's file
    let resolved = bob.resolve_file("../alice/notes.txt").unwrap();
    assert_eq!(resolved.key(), "users/bob/../alice/notes.txt");
    assert!(!bob.exists("../alice/notes.txt").await.unwrap());
    assert!(storage.head(BUCKET, "users/alice/notes.txt").await.is_ok());
}

#[tokio::test]
async fn test_listed_names_read_back() {
    let (gateway, _storage) = setup_test_env("users").await;
    let bob = gateway.open_session(&TestTransport::new("bob")).unwrap();

    bob.write_file("100%.txt", Bytes::from("percent")).await.unwrap();
    bob.write_file("notes #1.txt", Bytes::from("hash")).await.unwrap();
    bob.write_file("a/../b.txt", Bytes::from("dotdot")).await.unwrap();

    let names: Vec<String> = bob
        .read_directory(".")
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    assert_eq!(
        names,
        vec![".profile", "100%.txt", "a", "docs", "notes #1.txt"]
    );

    for entry in bob.read_directory(".").await.unwrap() {
        if attributes::is_directory(&entry.attributes) {
            assert!(bob.exists(&entry.name).await.unwrap(), "{}", entry.name);
        } else {
            bob.read_file(&entry.name).await.unwrap();
        }
    }
    assert_eq!(bob.read_file("100%.txt").await.unwrap().as_ref(), b"percent");

    let nested: Vec<String> = bob
        .read_directory("a")
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    assert_eq!(nested, vec![".."]);
    assert_eq!(bob.read_file("a/../b.txt").await.unwrap().as_ref(), b"dotdot");
}

#[tokio::test]
async fn test_attribute_reads_carry_permissions() {
    let (gateway, _storage) = setup_test_env("users").await;
    let bob = gateway.open_session(&TestTransport::new("bob")).unwrap();

    let file = bob.read_attributes(".profile").await.unwrap();
    assert_eq!(
        file.get(PERMISSIONS),
        Some(&AttributeValue::Permissions(attributes::FILE_PERMISSIONS))
    );
    let dir = bob.read_attributes("docs").await.unwrap();
    assert_eq!(
        dir.get(PERMISSIONS),
        Some(&AttributeValue::Permissions(attributes::DIRECTORY_PERMISSIONS))
    );
    for entry in bob.read_directory("/").await.unwrap() {
        assert!(entry.attributes.contains_key(PERMISSIONS), "{}", entry.name);
    }
}

#[derive(Default)]
struct RecordingListener {
    modifying: Mutex<Vec<Attributes>>,
    modified: Mutex<Vec<(Attributes, bool)>>,
}

impl SftpEventListener for RecordingListener {
    fn modifying_attributes(
        &self,
        _session: &SftpSession,
        _path: &BackingPath,
        attributes: &Attributes,
    ) {
        self.modifying.lock().push(attributes.clone());
    }

    fn modified_attributes(
        &self,
        _session: &SftpSession,
        _path: &BackingPath,
        attributes: &Attributes,
        error: Option<&ProviderError>,
    ) {
        self.modified.lock().push((attributes.clone(), error.is_some()));
    }
}

#[tokio::test]
async fn test_set_attributes_drops_permissions() {
    let storage = common::seeded_storage().await;
    let listener = Arc::new(RecordingListener::default());
    let gateway = SftpGateway::builder(common::configuration("users", "users"), storage)
        .listener(listener.clone())
        .build();
    let bob = gateway.open_session(&TestTransport::new("bob")).unwrap();

    // permissions alone: nothing left to apply, succeeds
    let mut request = Attributes::new();
    request.insert(PERMISSIONS.to_string(), AttributeValue::Permissions(0o600));
    bob.set_attributes(".profile", &request).await.unwrap();

    // permissions plus another key: the other key is forwarded
    request.insert(attributes::SIZE.to_string(), AttributeValue::Size(0));
    let err = bob.set_attributes(".profile", &request).await.unwrap_err();
    assert!(matches!(
        err,
        SubsystemError::Provider(ProviderError::Unsupported(_))
    ));

    let modifying = listener.modifying.lock();
    assert_eq!(modifying.len(), 2);
    assert!(modifying[0].is_empty());
    assert_eq!(modifying[1].len(), 1);
    assert!(modifying[1].contains_key(attributes::SIZE));
    assert!(!modifying[1].contains_key(PERMISSIONS));

    let modified = listener.modified.lock();
    assert_eq!(modified.len(), 2);
    assert!(!modified[0].1);
    assert!(modified[1].1);
    assert_eq!(modified[1].0, modifying[1]);
}

#[tokio::test]
async fn test_unsupported_operations_fail() {
    let (gateway, _storage) = setup_test_env("users").await;
    let bob = gateway.open_session(&TestTransport::new("bob")).unwrap();

    assert!(bob.create_link("link", ".profile").await.is_err());
    assert!(bob.create_symbolic_link("link", ".profile").await.is_err());
    assert!(bob.lock(".profile").await.is_err());
}

#[tokio::test]
async fn test_file_stores_filtered_to_session_bucket() {
    let (gateway, storage) = setup_test_env("users").await;
    assert_eq!(storage.list_buckets().await.unwrap(), vec![BUCKET, "other"]);

    let bob = gateway.open_session(&TestTransport::new("bob")).unwrap();
    assert_eq!(bob.file_stores().await.unwrap(), vec![BUCKET]);
}

#[tokio::test]
async fn test_sessions_of_same_user_share_backend_handle() {
    let (gateway, _storage) = setup_test_env("users").await;
    let first = gateway.open_session(&TestTransport::new("bob")).unwrap();
    let second = gateway.open_session(&TestTransport::new("bob")).unwrap();
    assert_ne!(first.session().id(), second.session().id());

    let handle = gateway.users().resolve("bob").unwrap();
    assert_eq!(handle.key(), "bob@localhost:9000");
    assert_eq!(gateway.registry().len(), 1);

    gateway.open_session(&TestTransport::new("alice")).unwrap();
    assert_eq!(gateway.registry().len(), 2);
    assert!(gateway.users().resolve("carol").is_none());
}
