//! End-to-end pipeline tests over the HTTP API.
//!
//! Boots the daemon against the simulated device network and drives the
//! full submit → parse → validate → dispatch → monitor → complete flow
//! the way an operator console would.

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{json, Value};
use torusd::{Config, Daemon};

async fn start_daemon(config: Config) -> (Daemon, SocketAddr) {
    let daemon = Daemon::new_sim(config);
    let addr = daemon.start_api_server().await.expect("server must start");
    (daemon, addr)
}

async fn post_command(
    client: &reqwest::Client,
    addr: SocketAddr,
    body: Value,
) -> (reqwest::StatusCode, Value) {
    let response = client
        .post(format!("http://{}/commands", addr))
        .json(&body)
        .send()
        .await
        .expect("request must reach the daemon");
    let status = response.status();
    let body = response.json().await.expect("response must be JSON");
    (status, body)
}

#[tokio::test]
async fn test_command_round_trip_completes() {
    let (_daemon, addr) = start_daemon(Config::test()).await;
    let client = reqwest::Client::new();

    let (status, execution) = post_command(
        &client,
        addr,
        json!({"command": "Set temperature to 12 keV"}),
    )
    .await;

    assert!(status.is_success());
    assert_eq!(execution["status"], "completed");
    assert_eq!(execution["progress"], 100);
    assert_eq!(execution["steps"].as_array().unwrap().len(), 4);
    assert!(execution["error"].is_null());

    // Demo parse: two operations, both dispatched successfully
    let results = execution["operation_results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["target_id"], "TOK:COIL:CURR");
    assert_eq!(results[0]["new_value"], 1600.0);
    assert_eq!(results[1]["target_id"], "TOK:HEATER:POW");
    assert_eq!(results[1]["new_value"], 70.0);

    // The record can be fetched again by id
    let id = execution["execution_id"].as_str().unwrap();
    let fetched: Value = client
        .get(format!("http://{}/executions/{}", addr, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["status"], "completed");
}

#[tokio::test]
async fn test_command_moves_the_simulated_setpoint() {
    let (_daemon, addr) = start_daemon(Config::test()).await;
    let client = reqwest::Client::new();

    post_command(&client, addr, json!({"command": "Set temperature to 12 keV"})).await;

    let status: Value = client
        .get(format!("http://{}/system/status", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(status["demo_mode"], true);
    assert_eq!(status["values"]["TOK:PCS:TE:SP"], 12.0);
    assert_eq!(status["values"]["TOK:COIL:CURR"], 1600.0);
}

#[tokio::test]
async fn test_empty_command_is_rejected() {
    let (_daemon, addr) = start_daemon(Config::test()).await;
    let client = reqwest::Client::new();

    let (status, body) = post_command(&client, addr, json!({"command": "  "})).await;

    assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("required"));
}

#[tokio::test]
async fn test_unsafe_command_fails_with_step_history() {
    let (_daemon, addr) = start_daemon(Config::test()).await;
    let client = reqwest::Client::new();

    // 25 keV derives a coil current far outside the limit table
    let (status, execution) =
        post_command(&client, addr, json!({"command": "set temperature to 25 keV"})).await;

    assert!(status.is_success());
    assert_eq!(execution["status"], "failed");
    assert_eq!(execution["progress"], 100);
    assert!(execution["error"]
        .as_str()
        .unwrap()
        .contains("Safety violation"));

    // Partial step history: parsing completed, safety_check failed
    let steps = execution["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0]["step_id"], "parsing");
    assert_eq!(steps[0]["status"], "completed");
    assert_eq!(steps[1]["step_id"], "safety_check");
    assert_eq!(steps[1]["status"], "failed");
}

#[tokio::test]
async fn test_cancel_during_monitoring() {
    let mut config = Config::test();
    config.engine.monitoring_window = Duration::from_secs(3);
    config.engine.sample_interval = Duration::from_millis(30);
    let (_daemon, addr) = start_daemon(config).await;
    let client = reqwest::Client::new();

    let submit_client = client.clone();
    let submit = tokio::spawn(async move {
        post_command(
            &submit_client,
            addr,
            json!({"command": "set temperature to 10 keV", "execution_id": "e2e-cancel"}),
        )
        .await
    });

    // Give the pipeline time to reach the monitoring stage
    tokio::time::sleep(Duration::from_millis(250)).await;

    let cancel: Value = client
        .post(format!("http://{}/executions/e2e-cancel/cancel", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cancel["cancelled"], true);

    let (_, execution) = submit.await.unwrap();
    assert_eq!(execution["status"], "cancelled");
    assert_eq!(execution["progress"], 100);

    // A cancelled execution never reports completed afterwards
    let fetched: Value = client
        .get(format!("http://{}/executions/e2e-cancel", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["status"], "cancelled");
}

#[tokio::test]
async fn test_cleanup_purges_terminal_executions() {
    let (_daemon, addr) = start_daemon(Config::test()).await;
    let client = reqwest::Client::new();

    post_command(
        &client,
        addr,
        json!({"command": "set temperature to 9 keV", "execution_id": "e2e-done"}),
    )
    .await;

    let listed: Value = client
        .get(format!("http://{}/executions", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["count"], 1);

    let cleaned: Value = client
        .post(format!("http://{}/executions/cleanup", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleaned["removed"], 1);

    let missing = client
        .get(format!("http://{}/executions/e2e-done", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_execution_id_conflicts() {
    let (_daemon, addr) = start_daemon(Config::test()).await;
    let client = reqwest::Client::new();

    post_command(
        &client,
        addr,
        json!({"command": "set temperature to 9 keV", "execution_id": "e2e-dup"}),
    )
    .await;

    let (status, body) = post_command(
        &client,
        addr,
        json!({"command": "set temperature to 10 keV", "execution_id": "e2e-dup"}),
    )
    .await;

    assert_eq!(status, reqwest::StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already exists"));
}
