// End-to-end CLI checks: argument surface and the --once snapshot path.

use assert_cmd::Command;
use predicates::prelude::*;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn help_lists_the_flag_surface() {
    let mut cmd = Command::cargo_bin("rfsight").expect("binary builds");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--server"))
        .stdout(predicate::str::contains("--org"))
        .stdout(predicate::str::contains("--network"))
        .stdout(predicate::str::contains("--once"));
}

#[test]
fn missing_required_flags_fail_fast() {
    let mut cmd = Command::cargo_bin("rfsight").expect("binary builds");
    cmd.env_remove("RFSIGHT_SERVER")
        .env_remove("RFSIGHT_TOKEN")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--server"));
}

#[test]
fn once_prints_a_seeded_snapshot() {
    // Keep the runtime alive for the duration of the subprocess run --
    // the mock server serves the listing request from it.
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let server = rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devices/list"))
            .and(query_param("organizationId", "org1"))
            .and(query_param("networkId", "net1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "devices": [
                    { "id": "d1", "name": "core-sw" },
                    { "id": "d2", "name": "ap-1" }
                ]
            })))
            .mount(&server)
            .await;
        server
    });

    let mut cmd = Command::cargo_bin("rfsight").expect("binary builds");
    cmd.args([
        "--server",
        &server.uri(),
        "--org",
        "org1",
        "--network",
        "net1",
        "--once",
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("health"))
    .stdout(predicate::str::contains("0/0 online"));
}
