//! Integration tests for the full fixture lifecycle
//!
//! Drives setup → setup-test → teardown-test → teardown against mock proxy
//! servers and checks the repository, shared config and process state.

use super::common::git_fixtures::RepoInspector;
use super::common::mock_server::{
    pid_alive, settings_for, CRASHING_SERVER, HEALTHY_SERVER, SILENT_SERVER,
};
use proxy_fixture::{FixtureError, ProcessState, ProxyFixture};
use serde_json::json;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tempfile::TempDir;

#[tokio::test]
async fn test_end_to_end_lifecycle() {
    let root = TempDir::new().unwrap();
    let mut fixture = ProxyFixture::new(settings_for(root.path(), HEALTHY_SERVER)).unwrap();

    // setup_proxy: name only, nothing on disk yet
    let task = fixture.setup_proxy(&json!({})).await.unwrap();
    let name = task.temp_dir.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("proxy-test-repo-"), "unexpected name {name}");
    assert_eq!(
        task.temp_dir.parent().unwrap().file_name().unwrap(),
        ".temp"
    );

    // setup_proxy_test: repository, server and proxy URL
    fixture.setup_proxy_test(&task).await.unwrap();

    let repo = RepoInspector::new(&task.temp_dir);
    assert!(repo.is_repo());
    assert_eq!(repo.commit_count(), 1);
    assert_eq!(repo.tracked_files(), vec!["README.md"]);
    assert_eq!(repo.head_subject(), "initial commit");
    assert!(!repo.is_dirty());

    let server = fixture.context().server().expect("server should be supervised");
    assert_eq!(server.state(), ProcessState::Ready);
    let port = server.port();
    let pid = server.pid().unwrap();
    assert_eq!(
        fixture.config().proxy_url(),
        Some(format!("http://localhost:{port}/api/v1").as_str())
    );
    assert!(fixture.is_server_running());

    // teardown_proxy_test: directory gone, process gone
    fixture.teardown_proxy_test(&task).await.unwrap();
    assert!(!task.temp_dir.exists());
    assert!(fixture.context().server().is_none());
    assert!(!pid_alive(pid));

    fixture.teardown_proxy(&task).await.unwrap();
    assert!(fixture.config().proxy_url().is_none());
    assert!(fixture.context().temp_dir().is_none());
}

#[tokio::test]
async fn test_setup_options_merge_into_config() {
    let root = TempDir::new().unwrap();
    let mut fixture = ProxyFixture::new(settings_for(root.path(), HEALTHY_SERVER)).unwrap();

    let task = fixture
        .setup_proxy(&json!({ "backend": { "name": "proxy", "branch": "main" } }))
        .await
        .unwrap();
    fixture.setup_proxy_test(&task).await.unwrap();

    let config = fixture.config();
    assert_eq!(config.get("backend.name"), Some(&json!("proxy")));
    assert_eq!(config.get("backend.branch"), Some(&json!("main")));
    assert!(config.proxy_url().is_some());

    fixture.teardown_proxy_test(&task).await.unwrap();
    fixture.teardown_proxy(&task).await.unwrap();
}

#[tokio::test]
async fn test_config_file_receives_proxy_url() {
    let root = TempDir::new().unwrap();
    let config_path = root.path().join("dev-test").join("config.json");
    std::fs::create_dir_all(config_path.parent().unwrap()).unwrap();
    std::fs::write(&config_path, r#"{"backend":{"name":"test-repo"}}"#).unwrap();

    let mut settings = settings_for(root.path(), HEALTHY_SERVER);
    settings.config_path = Some(config_path.clone());
    let mut fixture = ProxyFixture::new(settings).unwrap();

    let task = fixture
        .setup_proxy(&json!({ "backend": { "name": "proxy" } }))
        .await
        .unwrap();
    fixture.setup_proxy_test(&task).await.unwrap();

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&config_path).unwrap()).unwrap();
    assert_eq!(saved["backend"]["name"], json!("proxy"));
    assert_eq!(
        saved["backend"]["proxy_url"].as_str(),
        fixture.config().proxy_url()
    );

    fixture.teardown_proxy_test(&task).await.unwrap();
    fixture.teardown_proxy(&task).await.unwrap();
}

#[tokio::test]
async fn test_stderr_before_ready_aborts_setup() {
    let root = TempDir::new().unwrap();
    let mut fixture = ProxyFixture::new(settings_for(root.path(), CRASHING_SERVER)).unwrap();
    let task = fixture.setup_proxy(&json!({})).await.unwrap();

    let err = fixture.setup_proxy_test(&task).await.unwrap_err();
    match &err {
        FixtureError::StartupFailure(reason) => assert!(reason.contains("EADDRINUSE")),
        other => panic!("expected startup failure, got {other:?}"),
    }
    assert!(fixture.config().proxy_url().is_none());

    // The failed server is still released by teardown
    let pid = fixture.context().server().unwrap().pid().unwrap();
    fixture.teardown_proxy_test(&task).await.unwrap();
    assert!(!pid_alive(pid));
    assert!(!task.temp_dir.exists());
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let root = TempDir::new().unwrap();
    let mut settings = settings_for(root.path(), SILENT_SERVER);
    settings.startup_timeout = Duration::from_millis(500);
    let mut fixture = ProxyFixture::new(settings).unwrap();
    let task = fixture.setup_proxy(&json!({})).await.unwrap();

    let started = Instant::now();
    let err = fixture.setup_proxy_test(&task).await.unwrap_err();
    assert!(matches!(err, FixtureError::StartupTimeout(d) if d == Duration::from_millis(500)));
    assert!(started.elapsed() < Duration::from_secs(10));

    let server = fixture.context().server().unwrap();
    assert_eq!(server.state(), ProcessState::TimedOut);
    assert!(!pid_alive(server.pid().unwrap()));

    fixture.teardown_proxy(&task).await.unwrap();
    assert!(!task.temp_dir.exists());
}

#[tokio::test]
async fn test_teardown_tolerates_setup_never_run() {
    let root = TempDir::new().unwrap();
    let mut fixture = ProxyFixture::new(settings_for(root.path(), HEALTHY_SERVER)).unwrap();
    let task = fixture.setup_proxy(&json!({})).await.unwrap();

    fixture.teardown_proxy_test(&task).await.unwrap();
    fixture.teardown_proxy(&task).await.unwrap();
    assert!(!task.temp_dir.exists());
}

#[tokio::test]
async fn test_consecutive_tests_get_fresh_repositories() {
    let root = TempDir::new().unwrap();
    let mut fixture = ProxyFixture::new(settings_for(root.path(), HEALTHY_SERVER)).unwrap();
    let task = fixture.setup_proxy(&json!({})).await.unwrap();

    let mut pids = Vec::new();
    for _ in 0..2 {
        fixture.setup_proxy_test(&task).await.unwrap();

        // Leftovers from the previous test must not survive
        let repo = RepoInspector::new(&task.temp_dir);
        assert!(!task.temp_dir.join("scratch.txt").exists());
        assert_eq!(repo.commit_count(), 1);
        assert!(!repo.is_dirty());

        std::fs::write(task.temp_dir.join("scratch.txt"), "dirty").unwrap();
        pids.push(fixture.context().server().unwrap().pid().unwrap());
        fixture.teardown_proxy_test(&task).await.unwrap();
        assert!(!task.temp_dir.exists());
    }
    assert_ne!(pids[0], pids[1]);

    fixture.teardown_proxy(&task).await.unwrap();
}

#[tokio::test]
async fn test_missing_server_dir_is_spawn_error() {
    let root = TempDir::new().unwrap();
    let mut settings = settings_for(root.path(), HEALTHY_SERVER);
    settings.server_dir = PathBuf::from("/nonexistent/proxy-server");
    let mut fixture = ProxyFixture::new(settings).unwrap();
    let task = fixture.setup_proxy(&json!({})).await.unwrap();

    let err = fixture.setup_proxy_test(&task).await.unwrap_err();
    assert!(matches!(err, FixtureError::Spawn { .. }));

    fixture.teardown_proxy(&task).await.unwrap();
    assert!(!task.temp_dir.exists());
}
