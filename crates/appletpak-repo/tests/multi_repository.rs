//! Lookup, search and publish policies across several repositories

use appletpak_core::{Manifest, Package};
use appletpak_repo::{
    AppletQuery, FileRepository, RepoError, RepositoryBackend, RepositoryConfig,
    RepositoryDescriptor, RepositoryManager,
};
use std::collections::BTreeMap;
use tempfile::TempDir;

const UNREACHABLE: &str = "http://127.0.0.1:1/";

fn location(dir: &TempDir) -> String {
    format!("file://{}", dir.path().display())
}

fn package(id: &str, version: &str) -> Package {
    Package::seal(&Manifest::new(id, id, version)).unwrap()
}

async fn open(dir: &TempDir) -> FileRepository {
    let mut repo = FileRepository::new();
    repo.initialize(&location(dir), &BTreeMap::new())
        .await
        .unwrap();
    repo
}

#[tokio::test]
async fn test_fetched_package_is_cached() {
    let cache = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    open(&remote).await.put(&package("app", "1.2.0")).await.unwrap();

    let manager = RepositoryManager::new(RepositoryConfig::new(
        location(&cache),
        vec![
            RepositoryDescriptor::new(UNREACHABLE),
            RepositoryDescriptor::new(location(&remote)),
        ],
    ));
    let found = manager.get_from_any("app", Some("1.2.0")).await.unwrap();
    assert_eq!(found.meta.version, "1.2.0");
    assert!(cache.path().join("app-1.2.0.pak").is_file());

    // Only the cache is left
    drop(remote);
    let cache_only = RepositoryManager::new(RepositoryConfig::new(location(&cache), vec![]));
    let again = cache_only.get_from_any("app", Some("1.2.0")).await.unwrap();
    assert_eq!(again, found);
}

#[tokio::test]
async fn test_fuzzy_match_is_not_cached() {
    let cache = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    open(&remote).await.put(&package("app", "1.2.5")).await.unwrap();

    let manager = RepositoryManager::new(RepositoryConfig::new(
        location(&cache),
        vec![RepositoryDescriptor::new(location(&remote))],
    ));
    let found = manager.get_from_any("app", Some("1.2.3")).await.unwrap();
    assert_eq!(found.meta.version, "1.2.5");
    assert!(!cache.path().join("app-1.2.5.pak").exists());
}

#[tokio::test]
async fn test_fuzzy_match_from_cache_alone() {
    let cache = TempDir::new().unwrap();
    open(&cache).await.put(&package("app", "1.2.5")).await.unwrap();

    let manager = RepositoryManager::new(RepositoryConfig::new(
        location(&cache),
        vec![RepositoryDescriptor::new(UNREACHABLE)],
    ));
    let found = manager.get_from_any("app", Some("1.2.3")).await.unwrap();
    assert_eq!(found.meta.version, "1.2.5");

    let files = std::fs::read_dir(cache.path()).unwrap().count();
    assert_eq!(files, 1);
}

#[tokio::test]
async fn test_not_found_anywhere() {
    let cache = TempDir::new().unwrap();
    let manager = RepositoryManager::new(RepositoryConfig::new(
        location(&cache),
        vec![RepositoryDescriptor::new(UNREACHABLE)],
    ));
    assert!(manager.get_from_any("app", None).await.is_none());
}

#[tokio::test]
async fn test_find_unions_and_skips_failures() {
    let cache = TempDir::new().unwrap();
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    open(&first).await.put(&package("app", "1.0.0")).await.unwrap();
    open(&second).await.put(&package("app", "1.0.0")).await.unwrap();
    open(&second).await.put(&package("other", "2.0.0")).await.unwrap();

    let manager = RepositoryManager::new(RepositoryConfig::new(
        location(&cache),
        vec![
            RepositoryDescriptor::new(location(&first)),
            RepositoryDescriptor::new(UNREACHABLE),
            RepositoryDescriptor::new(location(&second)),
        ],
    ));

    let all = manager.find_from_any(&AppletQuery::all(), 0, 100).await;
    assert_eq!(all.len(), 3);
    let apps = manager.find_from_any(&AppletQuery::by_id("app"), 0, 100).await;
    assert_eq!(apps.len(), 2);
}

#[tokio::test]
async fn test_publish_to_all_aborts_on_first_failure() {
    let cache = TempDir::new().unwrap();
    let first = TempDir::new().unwrap();
    let last = TempDir::new().unwrap();

    let manager = RepositoryManager::new(RepositoryConfig::new(
        location(&cache),
        vec![
            RepositoryDescriptor::new(location(&first)),
            RepositoryDescriptor::new(UNREACHABLE),
            RepositoryDescriptor::new(location(&last)),
        ],
    ));

    let err = manager.publish(None, &package("app", "1.0.0")).await.unwrap_err();
    assert!(matches!(err, RepoError::Rest(_)));
    assert!(cache.path().join("app-1.0.0.pak").is_file());
    assert!(first.path().join("app-1.0.0.pak").is_file());
    assert!(!last.path().join("app-1.0.0.pak").exists());
}

#[tokio::test]
async fn test_publish_to_all() {
    let cache = TempDir::new().unwrap();
    let mirror = TempDir::new().unwrap();
    let manager = RepositoryManager::new(RepositoryConfig::new(
        location(&cache),
        vec![RepositoryDescriptor::new(location(&mirror))],
    ));

    let published = manager.publish(None, &package("app", "1.0.0")).await.unwrap();
    assert_eq!(published.len(), 2);
    assert!(mirror.path().join("app-1.0.0.pak").is_file());
}

#[tokio::test]
async fn test_publish_to_explicit_target() {
    let cache = TempDir::new().unwrap();
    let mirror = TempDir::new().unwrap();
    let manager = RepositoryManager::new(RepositoryConfig::new(
        location(&cache),
        vec![
            RepositoryDescriptor::new(location(&mirror)),
            RepositoryDescriptor::new(UNREACHABLE),
        ],
    ));

    let published = manager
        .publish(Some(format!("{}/", location(&mirror)).as_str()), &package("app", "1.0.0"))
        .await
        .unwrap();
    assert_eq!(published.len(), 1);
    assert!(mirror.path().join("app-1.0.0.pak").is_file());
    assert!(!cache.path().join("app-1.0.0.pak").exists());

    // The transport error of an explicit target reaches the caller
    let err = manager
        .publish(Some(UNREACHABLE), &package("app", "1.0.0"))
        .await
        .unwrap_err();
    match err {
        RepoError::Rest(rest) => {
            assert_eq!(rest.verb, "PUT");
            assert!(rest.uri.starts_with(UNREACHABLE));
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = manager
        .publish(Some("https://elsewhere.example.test/"), &package("app", "1.0.0"))
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::ConfigNotFound { .. }));
}
