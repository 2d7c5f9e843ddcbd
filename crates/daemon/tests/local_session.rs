//! Integration tests for sessions opened from a config file
//!
//! These use the local filesystem backend in a temp directory, so state
//! survives between sessions the same way it does between CLI invocations.

use std::collections::BTreeMap;

use bytes::Bytes;
use storage::ObjectStoreConfig;
use tempfile::TempDir;

use s3sftp_daemon::{open_local_session, AppConfig, ConfigError, SessionError, StorageConfig};

/// Config with homes under `home/`, jailed to `home`, data in a temp dir.
fn setup_test_config() -> (AppConfig, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let data = temp_dir.path().join("data");
    std::fs::create_dir_all(data.join("sftp/home/bob")).unwrap();
    std::fs::write(data.join("sftp/home/bob/.profile"), b"export PS1='$ '").unwrap();

    let config = AppConfig {
        uri: "s3://localhost:9000".parse().unwrap(),
        bucket: "sftp".to_string(),
        home: "home".to_string(),
        jail: "home".to_string(),
        path_prefix: None,
        storage: StorageConfig::Backend(ObjectStoreConfig::Local { path: data }),
        users: BTreeMap::new(),
        authorized_keys: BTreeMap::new(),
    };
    (config, temp_dir)
}

#[tokio::test]
async fn test_config_file_drives_session() {
    let (config, temp_dir) = setup_test_config();
    let path = temp_dir.path().join("config.toml");
    config.save(&path).unwrap();

    let loaded = AppConfig::load(&path).unwrap();
    let bob = open_local_session(&loaded, "bob").await.unwrap();
    assert_eq!(bob.resolve_file(".").unwrap().visible(), "/bob/");
    assert_eq!(
        bob.read_file(".profile").await.unwrap().as_ref(),
        b"export PS1='$ '"
    );
}

#[tokio::test]
async fn test_writes_persist_across_sessions() {
    let (config, temp_dir) = setup_test_config();

    let bob = open_local_session(&config, "bob").await.unwrap();
    bob.make_directory("projects").await.unwrap();
    bob.write_file("projects/plan.txt", Bytes::from("step one"))
        .await
        .unwrap();
    assert!(temp_dir
        .path()
        .join("data/sftp/home/bob/projects/plan.txt")
        .is_file());

    let again = open_local_session(&config, "bob").await.unwrap();
    let names: Vec<String> = again
        .read_directory("/bob/projects")
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    assert_eq!(names, vec!["plan.txt"]);

    again.rename("projects/plan.txt", "plan.txt").await.unwrap();
    again.remove("plan.txt").await.unwrap();
    again.remove_directory("projects").await.unwrap();
    assert!(!again.exists("projects").await.unwrap());
}

#[tokio::test]
async fn test_positioned_io_on_disk() {
    let (config, temp_dir) = setup_test_config();
    let bob = open_local_session(&config, "bob").await.unwrap();

    assert_eq!(bob.read_at(".profile", 7, 3).await.unwrap().as_ref(), b"PS1");
    bob.write_at(".profile", 7, Bytes::from("PS2")).await.unwrap();
    assert_eq!(
        std::fs::read(temp_dir.path().join("data/sftp/home/bob/.profile")).unwrap(),
        b"export PS2='$ '"
    );
}

#[tokio::test]
async fn test_path_prefix_applies_to_keys() {
    let (mut config, temp_dir) = setup_test_config();
    config.path_prefix = Some("tenant".to_string());

    let bob = open_local_session(&config, "bob").await.unwrap();
    bob.write_file("notes.txt", Bytes::from("x")).await.unwrap();

    // the client still sees its own path
    assert_eq!(bob.resolve_file("notes.txt").unwrap().visible(), "/bob/notes.txt");
    assert!(temp_dir
        .path()
        .join("data/sftp/tenant/home/bob/notes.txt")
        .is_file());
}

#[tokio::test]
async fn test_home_outside_jail_fails_to_open() {
    let (mut config, _temp_dir) = setup_test_config();
    config.jail = "restricted".to_string();

    let err = open_local_session(&config, "bob").await.err().unwrap();
    assert!(matches!(err, SessionError::Gateway(_)));
    assert_eq!(
        err.to_string(),
        "User directory is outside jailed path: restricted: home/bob"
    );
}

#[tokio::test]
async fn test_missing_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let err = AppConfig::load(&temp_dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
}
