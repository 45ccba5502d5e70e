use anyhow::Result;
use ci_dashboard::{Dashboard, DashboardConfig, ErrorKind, Status};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

const QUEUE_FIXTURE: &str = include_str!("fixtures/queue.json");
const BASIC_BOARD: &str = "Basic Ym9hcmQ6aHVudGVyMg==";

async fn mount_job_server(server: &MockServer, jobs: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/queue/api/json"))
        .and(header("Authorization", BASIC_BOARD))
        .respond_with(ResponseTemplate::new(200).set_body_raw(QUEUE_FIXTURE, "application/json"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/computer/api/json"))
        .and(header("Authorization", BASIC_BOARD))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"busyExecutors": 3})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/view/Broken/api/json"))
        .and(header("Authorization", BASIC_BOARD))
        .respond_with(jobs)
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn job_server_failures_stay_with_their_instance() -> Result<()> {
    let failing = MockServer::start().await;
    let healthy = MockServer::start().await;
    mount_job_server(&failing, ResponseTemplate::new(500)).await;
    mount_job_server(
        &healthy,
        ResponseTemplate::new(200).set_body_json(json!({
            "jobs": [
                {"name": "core", "color": "red", "url": "https://ci/job/core/"},
                {"name": "docs", "color": "yellow_anime", "url": "https://ci/job/docs/"}
            ]
        })),
    )
    .await;

    let loaded = DashboardConfig::from_json_str(
        &json!({
            "username": "board",
            "password": "hunter2",
            "jobServers": [
                {"name": "Failing", "url": failing.uri()},
                {"name": "Healthy", "url": healthy.uri(), "publicUrl": "https://ci.public"}
            ]
        })
        .to_string(),
    )?;
    assert!(loaded.warnings.is_empty());
    let dashboard = Dashboard::from_config(&loaded.config)?;

    let records = dashboard.broken_job_server_builds().await;

    assert_eq!(records.len(), 2);
    let failing_record = &records[0];
    assert_eq!(failing_record.aggregation.name, "Failing");
    assert_eq!(failing_record.aggregation.status, Status::Unavailable);
    assert_eq!(failing_record.build_queue_size, 28);
    assert_eq!(failing_record.busy_executor_count, 3);
    assert!(failing_record.jobs.is_empty());

    let healthy_record = &records[1];
    assert_eq!(healthy_record.aggregation.status, Status::Ok);
    assert_eq!(healthy_record.jobs.len(), 2);
    assert_eq!(healthy_record.broken_view_url, healthy.uri());

    let snapshot = serde_json::to_value(&records)?;
    assert_eq!(snapshot[0]["type"], "jobserver");
    assert_eq!(snapshot[0]["status"], "unavailable");
    assert_eq!(snapshot[1]["buildQueueSize"], 28);
    assert_eq!(snapshot[1]["busyExecutorCount"], 3);
    assert_eq!(snapshot[1]["publicUrl"], "https://ci.public");
    assert!(snapshot[0].get("publicUrl").is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn override_url_narrows_the_broken_view() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/view/team/view/Broken/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobs": [{"name": "team-core", "color": "red", "url": "https://ci/job/team-core/"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/queue/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/computer/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"busyExecutors": 0})))
        .mount(&server)
        .await;

    let override_url = format!("{}/view/team", server.uri());
    let loaded = DashboardConfig::from_json_str(
        &json!({
            "jobServers": [{"name": "Team", "url": server.uri(), "overrideUrl": override_url}]
        })
        .to_string(),
    )?;
    let dashboard = Dashboard::from_config(&loaded.config)?;

    let records = dashboard.broken_job_server_builds().await;

    assert_eq!(records[0].aggregation.status, Status::Ok);
    assert_eq!(records[0].broken_view_url, override_url);
    assert_eq!(records[0].jobs[0].name, "team-core");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn escaped_override_url_is_not_encoded_twice() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/view/My%20Team/view/Broken/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobs": [{"name": "team-core", "color": "red", "url": "https://ci/job/team-core/"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/queue/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/computer/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"busyExecutors": 1})))
        .mount(&server)
        .await;

    let loaded = DashboardConfig::from_json_str(
        &json!({
            "jobServers": [{
                "name": "Team",
                "url": server.uri(),
                "overrideUrl": format!("{}/view/My%20Team/", server.uri())
            }]
        })
        .to_string(),
    )?;
    let dashboard = Dashboard::from_config(&loaded.config)?;

    let records = dashboard.broken_job_server_builds().await;

    assert_eq!(records[0].aggregation.status, Status::Ok);
    assert_eq!(records[0].jobs.len(), 1);
    assert_eq!(records[0].busy_executor_count, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hosted_build_lists_only_unsuccessful_repositories() -> Result<()> {
    let server = MockServer::start().await;
    for (repo, response) in [
        ("engine", ResponseTemplate::new(200).set_body_json(json!({
            "name": "master", "last_build": {"state": "passed"}
        }))),
        ("web", ResponseTemplate::new(200).set_body_json(json!({
            "name": "master", "last_build": {"state": "failed"}
        }))),
        ("docs", ResponseTemplate::new(503)),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/repo/acme%2F{repo}/branch/master")))
            .and(header("Authorization", "token org-token"))
            .respond_with(response)
            .mount(&server)
            .await;
    }

    let loaded = DashboardConfig::from_json_str(
        &json!({
            "hostedBuild": {
                "accessToken": "shared-token",
                "apiUrl": server.uri(),
                "webUrl": "https://builds.example.org",
                "organizations": [{
                    "name": "acme",
                    "accessToken": "org-token",
                    "repos": [{"name": "engine"}, {"name": "web"}, {"name": "docs", "branch": ""}]
                }]
            }
        })
        .to_string(),
    )?;
    let dashboard = Dashboard::from_config(&loaded.config)?;

    let records = dashboard.broken_hosted_build_builds().await;

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.aggregation.status, Status::Ok);
    assert_eq!(record.aggregation.url, "https://builds.example.org/acme");
    let jobs: Vec<_> = record
        .jobs
        .iter()
        .map(|j| (j.name.as_str(), j.color.as_str()))
        .collect();
    assert_eq!(jobs, [("web", "red"), ("docs", "grey")]);

    let snapshot = serde_json::to_value(record)?;
    assert_eq!(snapshot["type"], "hostedbuild");
    assert_eq!(
        snapshot["jobs"][0],
        json!({"name": "web", "url": "https://builds.example.org/acme/web", "color": "red"})
    );
    Ok(())
}

#[test]
fn override_url_outside_base_fails_construction() -> Result<()> {
    let loaded = DashboardConfig::from_json_str(
        &json!({
            "jobServers": [{
                "name": "Broken",
                "url": "https://ci.example.com",
                "overrideUrl": "https://other.example.com/view/x"
            }]
        })
        .to_string(),
    )?;

    let err = Dashboard::from_config(&loaded.config).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    assert!(err.to_string().contains("must be part of override URL"));
    Ok(())
}
