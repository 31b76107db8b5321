//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for a CI server and run full sync
//! runs against an in-memory catalog.

use crate::support::*;
use atlas_discovery::crawler::{run_unit, CrawlTask};
use atlas_discovery::state::UnitState;
use atlas_discovery::storage::{RunStatus, SqliteStorage, Storage};
use std::sync::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_listing(mock_server: &MockServer, at: &str, items: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(items)))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_unit_upserts_pipelines_and_returns_folders() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    mount_listing(
        &mock_server,
        "/api/json",
        vec![
            item(FOLDER_CLASS, "team-a", &format!("{}/job/team-a", base)),
            item(MULTIBRANCH_CLASS, "service", &format!("{}/job/service", base)),
            item(PIPELINE_CLASS, "build", &format!("{}/job/build", base)),
            item(FREESTYLE_CLASS, "legacy", &format!("{}/job/legacy", base)),
        ],
    )
    .await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let server_id = storage.sync_server("main", &base, Some("bot")).unwrap();
    let storage = Mutex::new(storage);

    let mut server = test_server(&base, true);
    server.id = server_id;

    let outcome = run_unit(&test_client(), &storage, &server, &CrawlTask::root())
        .await
        .expect("unit should succeed");

    assert_eq!(outcome.jobs_upserted, 1);
    assert_eq!(outcome.ignored, 1);
    let children: Vec<_> = outcome
        .children
        .iter()
        .map(|c| (c.folder_url.clone().unwrap(), c.depth))
        .collect();
    assert_eq!(
        children,
        vec![
            (format!("{}/job/team-a", base), 1),
            (format!("{}/job/service", base), 1),
        ]
    );

    let storage = storage.lock().unwrap();
    let jobs = storage.list_workflow_jobs(server_id).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].url, format!("{}/job/build", base));
    assert_eq!(jobs[0].discovery_source, "jenkins_sync");
    assert!(jobs[0].enabled);
    assert!(storage
        .get_server(server_id)
        .unwrap()
        .last_synced_at
        .is_some());
}

#[tokio::test]
async fn test_sync_discovers_nested_pipelines() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    mount_listing(
        &mock_server,
        "/api/json",
        vec![
            item(FOLDER_CLASS, "team-a", &format!("{}/job/team-a", base)),
            item(PIPELINE_CLASS, "build", &format!("{}/job/build", base)),
        ],
    )
    .await;
    mount_listing(
        &mock_server,
        "/job/team-a/api/json",
        vec![
            item(MULTIBRANCH_CLASS, "service", &format!("{}/job/team-a/job/service", base)),
            item(PIPELINE_CLASS, "deploy", &format!("{}/job/team-a/job/deploy", base)),
        ],
    )
    .await;
    mount_listing(
        &mock_server,
        "/job/team-a/job/service/api/json",
        vec![item(
            PIPELINE_CLASS,
            "main",
            &format!("{}/job/team-a/job/service/job/main", base),
        )],
    )
    .await;

    let coordinator = test_coordinator(&base, 8);
    let report = coordinator.sync("main", None).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.totals.units_succeeded, 3);
    assert_eq!(report.totals.units_failed, 0);
    assert_eq!(report.totals.jobs_upserted, 3);

    let server = coordinator.load_server("main").unwrap();
    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    let urls: Vec<_> = storage
        .list_workflow_jobs(server.id)
        .unwrap()
        .into_iter()
        .map(|j| j.url)
        .collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/job/build", base),
            format!("{}/job/team-a/job/deploy", base),
            format!("{}/job/team-a/job/service/job/main", base),
        ]
    );

    let run = storage.get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_pipelines_only_makes_one_request() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![
            item(PIPELINE_CLASS, "a", &format!("{}/job/a", base)),
            item(PIPELINE_CLASS, "b", &format!("{}/job/b", base)),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let coordinator = test_coordinator(&base, 8);
    let report = coordinator.sync("main", None).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.totals.units_succeeded, 1);
    assert_eq!(report.totals.jobs_upserted, 2);
}

#[tokio::test]
async fn test_folders_only_upserts_nothing() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    mount_listing(
        &mock_server,
        "/api/json",
        vec![
            item(FOLDER_CLASS, "a", &format!("{}/job/a", base)),
            item(FOLDER_CLASS, "b", &format!("{}/job/b", base)),
        ],
    )
    .await;
    mount_listing(&mock_server, "/job/a/api/json", vec![]).await;
    mount_listing(&mock_server, "/job/b/api/json", vec![]).await;

    let coordinator = test_coordinator(&base, 8);
    let report = coordinator.sync("main", None).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.totals.units_succeeded, 3);
    assert_eq!(report.totals.jobs_upserted, 0);

    let storage = coordinator.storage();
    assert_eq!(storage.lock().unwrap().count_workflow_jobs(None).unwrap(), 0);
}

#[tokio::test]
async fn test_resync_is_idempotent() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    mount_listing(
        &mock_server,
        "/api/json",
        vec![
            item(PIPELINE_CLASS, "a", &format!("{}/job/a", base)),
            item(PIPELINE_CLASS, "b", &format!("{}/job/b", base)),
        ],
    )
    .await;

    let coordinator = test_coordinator(&base, 8);
    coordinator.sync("main", None).await.unwrap();

    let server = coordinator.load_server("main").unwrap();
    let first = coordinator
        .storage()
        .lock()
        .unwrap()
        .list_workflow_jobs(server.id)
        .unwrap();
    let first_synced = server.last_synced_at.clone().unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let report = coordinator.sync("main", None).await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);

    let server = coordinator.load_server("main").unwrap();
    let second = coordinator
        .storage()
        .lock()
        .unwrap()
        .list_workflow_jobs(server.id)
        .unwrap();

    assert_eq!(second.len(), 2);
    for (before, after) in first.iter().zip(&second) {
        assert_eq!(before.id, after.id);
        assert_eq!(before.url, after.url);
        assert_eq!(before.created_at, after.created_at);
    }
    assert_ne!(server.last_synced_at.unwrap(), first_synced);
}

#[tokio::test]
async fn test_failing_folder_does_not_block_siblings() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    mount_listing(
        &mock_server,
        "/api/json",
        vec![
            item(FOLDER_CLASS, "broken", &format!("{}/job/broken", base)),
            item(FOLDER_CLASS, "healthy", &format!("{}/job/healthy", base)),
        ],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/job/broken/api/json"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;
    mount_listing(
        &mock_server,
        "/job/healthy/api/json",
        vec![item(PIPELINE_CLASS, "deploy", &format!("{}/job/healthy/job/deploy", base))],
    )
    .await;

    let coordinator = test_coordinator(&base, 8);
    let report = coordinator.sync("main", None).await.unwrap();

    assert_eq!(report.status, RunStatus::Partial);
    assert_eq!(report.totals.units_succeeded, 2);
    assert_eq!(report.totals.units_failed, 1);
    assert_eq!(report.failed_folders, vec![format!("{}/job/broken", base)]);

    let server = coordinator.load_server("main").unwrap();
    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    assert!(storage
        .get_workflow_job(server.id, &format!("{}/job/healthy/job/deploy", base))
        .unwrap()
        .is_some());

    let failed = storage.get_failed_units(report.run_id).unwrap();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].error_message.as_deref().unwrap().contains("HTTP 500"));
}

#[tokio::test]
async fn test_root_failure_fails_run() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/json"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    let coordinator = test_coordinator(&mock_server.uri(), 8);
    let report = coordinator.sync("main", None).await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.failed_folders, vec!["<root>".to_string()]);
    assert!(coordinator
        .load_server("main")
        .unwrap()
        .last_synced_at
        .is_none());
}

#[tokio::test]
async fn test_cyclic_folders_crawled_once() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    mount_listing(
        &mock_server,
        "/api/json",
        vec![item(FOLDER_CLASS, "a", &format!("{}/job/a", base))],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/job/a/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![
            item(FOLDER_CLASS, "b", &format!("{}/job/b", base)),
            item(FOLDER_CLASS, "home", &base),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/job/b/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![item(
            FOLDER_CLASS,
            "a",
            &format!("{}/job/a", base),
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let coordinator = test_coordinator(&base, 8);
    let report = coordinator.sync("main", None).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.totals.units_succeeded, 3);
}

#[tokio::test]
async fn test_depth_limit_skips_deep_folders() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    mount_listing(
        &mock_server,
        "/api/json",
        vec![item(FOLDER_CLASS, "a", &format!("{}/job/a", base))],
    )
    .await;
    mount_listing(
        &mock_server,
        "/job/a/api/json",
        vec![item(FOLDER_CLASS, "b", &format!("{}/job/a/job/b", base))],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/job/a/job/b/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let coordinator = test_coordinator(&base, 1);
    let report = coordinator.sync("main", None).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.totals.units_succeeded, 2);
    assert_eq!(report.totals.units_skipped, 1);

    let storage = coordinator.storage();
    let counts = storage
        .lock()
        .unwrap()
        .count_units_by_state(report.run_id)
        .unwrap();
    assert_eq!(counts.get(&UnitState::Skipped), Some(&1));
}

#[tokio::test]
async fn test_folder_sync_leaves_server_timestamp() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    mount_listing(
        &mock_server,
        "/job/team-a/api/json",
        vec![item(PIPELINE_CLASS, "deploy", &format!("{}/job/team-a/job/deploy", base))],
    )
    .await;

    let coordinator = test_coordinator(&base, 8);
    let folder = format!("{}/job/team-a/", base);
    let report = coordinator.sync("main", Some(&folder)).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.totals.jobs_upserted, 1);

    let server = coordinator.load_server("main").unwrap();
    assert!(server.last_synced_at.is_none());

    let storage = coordinator.storage();
    let run = storage.lock().unwrap().get_run(report.run_id).unwrap();
    assert_eq!(run.root_folder, Some(format!("{}/job/team-a", base)));
}

#[tokio::test]
async fn test_folder_sync_at_server_url_lists_root() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![item(
            PIPELINE_CLASS,
            "build",
            &format!("{}/job/build", base),
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let coordinator = test_coordinator(&base, 8);
    let report = coordinator
        .sync("main", Some(&format!("{}/", base)))
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.totals.units_succeeded, 1);
    assert_eq!(report.totals.jobs_upserted, 1);

    let server = coordinator.load_server("main").unwrap();
    assert!(server.last_synced_at.is_some());

    let storage = coordinator.storage();
    let run = storage.lock().unwrap().get_run(report.run_id).unwrap();
    assert_eq!(run.root_folder, None);
}

#[tokio::test]
async fn test_resync_keeps_component_link() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    mount_listing(
        &mock_server,
        "/api/json",
        vec![item(PIPELINE_CLASS, "build", &format!("{}/job/build", base))],
    )
    .await;

    let coordinator = test_coordinator(&base, 8);
    coordinator.sync("main", None).await.unwrap();

    let server = coordinator.load_server("main").unwrap();
    let job_url = format!("{}/job/build", base);
    {
        let storage = coordinator.storage();
        let mut storage = storage.lock().unwrap();
        let job = storage.get_workflow_job(server.id, &job_url).unwrap().unwrap();
        storage.link_component(job.id, Some(42)).unwrap();
    }

    coordinator.sync("main", None).await.unwrap();

    let storage = coordinator.storage();
    let job = storage
        .lock()
        .unwrap()
        .get_workflow_job(server.id, &job_url)
        .unwrap()
        .unwrap();
    assert_eq!(job.component_id, Some(42));
}

#[tokio::test]
async fn test_trigger_through_coordinator() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/job/build/build"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let coordinator = test_coordinator(&mock_server.uri(), 8);
    let job = format!("{}/job/build", mock_server.uri());
    let response = coordinator
        .trigger("main", &job, &Default::default())
        .await
        .unwrap();

    assert!(response.is_none());
}
