//! `start` and `stop` end to end against a mock Compute API.

#![cfg(unix)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use docker_cloud::application::services::orchestrator::{self, StartOutcome};
use docker_cloud::application::services::tunnel::open_secure_tunnel;
use docker_cloud::domain::{TunnelError, is_not_found};
use docker_cloud::infra::gce::GceClient;
use docker_cloud::infra::network::TokioNetworkProbe;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{
    ADDRESS, INSTANCE, PROJECT, Reachable, Silent, SshRecorder, fast_settings, instance_body,
    not_found, operation, zone_path,
};

fn client(server: &MockServer) -> GceClient {
    GceClient::new(PROJECT, "token")
        .expect("client builds")
        .with_base_url(server.uri())
}

async fn mount_done(server: &MockServer, op: &str) {
    Mock::given(method("GET"))
        .and(path(zone_path(&format!("operations/{op}"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(operation(op, "DONE")))
        .mount(server)
        .await;
}

async fn requests(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .expect("recording enabled")
        .iter()
        .map(|r| format!("{} {}", r.method, r.url.path()))
        .collect()
}

// ── start ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_creates_disk_and_instance_then_tunnels() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(zone_path(&format!("instances/{INSTANCE}"))))
        .respond_with(ResponseTemplate::new(404).set_body_json(not_found(INSTANCE)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(zone_path(&format!("instances/{INSTANCE}"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(instance_body(INSTANCE, ADDRESS)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(zone_path("disks/docker-root")))
        .respond_with(ResponseTemplate::new(404).set_body_json(not_found("docker-root")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(zone_path("disks")))
        .respond_with(ResponseTemplate::new(200).set_body_json(operation("op-disk", "PENDING")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(zone_path("instances")))
        .respond_with(ResponseTemplate::new(200).set_body_json(operation("op-vm", "PENDING")))
        .expect(1)
        .mount(&server)
        .await;
    mount_done(&server, "op-disk").await;
    mount_done(&server, "op-vm").await;

    let runner = SshRecorder::default();
    let started = orchestrator::start(
        &client(&server),
        &runner,
        &Reachable,
        &Silent,
        &fast_settings(),
    )
    .await
    .expect("start succeeds");

    assert_eq!(
        started.outcome,
        StartOutcome::Created {
            address: ADDRESS.to_string()
        }
    );
    let instance = zone_path(&format!("instances/{INSTANCE}"));
    let disk = zone_path("disks/docker-root");
    assert_eq!(
        requests(&server).await,
        vec![
            format!("GET {instance}"),
            format!("GET {disk}"),
            format!("POST {}", zone_path("disks")),
            format!("GET {}", zone_path("operations/op-disk")),
            format!("POST {}", zone_path("instances")),
            format!("GET {}", zone_path("operations/op-vm")),
            format!("GET {instance}"),
            format!("GET {instance}"),
        ]
    );

    let spawned = runner.spawned.borrow();
    assert_eq!(spawned.len(), 1);
    let (program, args) = &spawned[0];
    assert_eq!(program, "ssh");
    assert!(args.contains(&format!("alice@{ADDRESS}")), "args: {args:?}");
    assert!(args.contains(&"8001:localhost:8000".to_string()), "args: {args:?}");
    drop(spawned);

    started.tunnel.shutdown().await.expect("tunnel stops");
}

#[tokio::test]
async fn test_insert_request_carries_startup_script_and_boot_disk() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(zone_path(&format!("instances/{INSTANCE}"))))
        .respond_with(ResponseTemplate::new(404).set_body_json(not_found(INSTANCE)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(zone_path(&format!("instances/{INSTANCE}"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(instance_body(INSTANCE, ADDRESS)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(zone_path("disks/docker-root")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "docker-root",
            "selfLink": "https://www.googleapis.com/compute/v1/projects/demo-project/zones/us-central1-a/disks/docker-root",
            "sizeGb": "100",
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(zone_path("instances")))
        .respond_with(ResponseTemplate::new(200).set_body_json(operation("op-vm", "PENDING")))
        .mount(&server)
        .await;
    mount_done(&server, "op-vm").await;

    let started = orchestrator::start(
        &client(&server),
        &SshRecorder::default(),
        &Reachable,
        &Silent,
        &fast_settings(),
    )
    .await
    .expect("start succeeds");
    started.tunnel.shutdown().await.expect("tunnel stops");

    let received = server.received_requests().await.expect("recording enabled");
    assert!(
        received.iter().all(|r| r.url.path() != zone_path("disks")),
        "existing disk must be reused"
    );
    let insert = received
        .iter()
        .find(|r| r.method.as_str() == "POST" && r.url.path() == zone_path("instances"))
        .expect("instance insert");
    let body: serde_json::Value = serde_json::from_slice(&insert.body).expect("json body");
    assert_eq!(body["disks"][0]["autoDelete"], false);
    assert!(
        body["disks"][0]["source"]
            .as_str()
            .is_some_and(|s| s.ends_with("/disks/docker-root"))
    );
    let script = body["metadata"]["items"][0]["value"].as_str().expect("script");
    assert!(script.contains("-H tcp://127.0.0.1:8000"), "script: {script}");
}

#[tokio::test]
async fn test_start_reuses_running_instance() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(zone_path(&format!("instances/{INSTANCE}"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(instance_body(INSTANCE, ADDRESS)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let started = orchestrator::start(
        &client(&server),
        &SshRecorder::default(),
        &Reachable,
        &Silent,
        &fast_settings(),
    )
    .await
    .expect("start succeeds");

    assert_eq!(started.outcome.address(), ADDRESS);
    assert!(matches!(started.outcome, StartOutcome::Reused { .. }));
    started.tunnel.shutdown().await.expect("tunnel stops");
}

#[tokio::test]
async fn test_start_during_outage_creates_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .mount(&server)
        .await;

    let runner = SshRecorder::default();
    let err = orchestrator::start(
        &client(&server),
        &runner,
        &Reachable,
        &Silent,
        &fast_settings(),
    )
    .await
    .unwrap_err();

    assert!(format!("{err:#}").contains("503: backend unavailable"), "{err:#}");
    assert!(
        requests(&server).await.iter().all(|r| r.starts_with("GET ")),
        "only lookups expected"
    );
    assert!(runner.spawned.borrow().is_empty());
}

#[tokio::test]
async fn test_tunnel_refuses_local_port_with_existing_listener() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(zone_path(&format!("instances/{INSTANCE}"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(instance_body(INSTANCE, ADDRESS)))
        .mount(&server)
        .await;
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let busy = listener.local_addr().expect("local addr").port();
    let mut settings = fast_settings();
    settings.tunnel_port = busy;
    settings.verify_timeout = std::time::Duration::from_secs(2);

    let runner = SshRecorder::default();
    let err = open_secure_tunnel(
        &client(&server),
        &runner,
        &TokioNetworkProbe,
        &settings,
        INSTANCE,
        &settings.zone,
        settings.tunnel_port,
        settings.docker_port,
    )
    .await
    .unwrap_err();

    assert_eq!(
        err.downcast_ref::<TunnelError>(),
        Some(&TunnelError::PortInUse { local_port: busy })
    );
    assert!(runner.spawned.borrow().is_empty());
}

// ── stop ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stop_twice_reports_missing_instance() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(zone_path(&format!("instances/{INSTANCE}"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(operation("op-del", "PENDING")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(zone_path(&format!("instances/{INSTANCE}"))))
        .respond_with(ResponseTemplate::new(404).set_body_json(not_found(INSTANCE)))
        .mount(&server)
        .await;
    mount_done(&server, "op-del").await;

    let api = client(&server);
    let settings = fast_settings();
    orchestrator::stop(&api, &Silent, &settings)
        .await
        .expect("first stop deletes");
    let err = orchestrator::stop(&api, &Silent, &settings)
        .await
        .unwrap_err();

    assert!(is_not_found(&err), "{err:#}");
    assert!(
        requests(&server).await.iter().all(|r| !r.contains("/disks")),
        "stop must never touch the root disk"
    );
}
