// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use common::helpers::{
    local_job, post_drain, post_drain_chunked, receive, send_request, start_jobs,
    SCALE_FRAME, STATE_CHANGE_FRAME,
};
use hyper::StatusCode;
use log_pipeline::logplex::{
    LOGPLEX_APP_FIELD, LOGPLEX_HOST_FIELD, LOGPLEX_LOG_ID_FIELD, LOGPLEX_MSG_FIELD,
    LOGPLEX_PROC_FIELD, LOGPLEX_TIMESTAMP_FIELD,
};
use logplex_drain::DRAIN_ENDPOINT_PATH;
use serde_json::json;

#[tokio::test]
async fn test_batch_becomes_records() {
    let (manager, mut rx) = start_jobs(json!([local_job(
        "heroku",
        json!({"logplex": {
            "server": {"http_listen_address": "127.0.0.1"},
            "labels": {"env": "test"}
        }})
    )]))
    .await
    .unwrap();
    let addr = manager.get("heroku").unwrap().local_addr();

    let response = post_drain(addr, &[STATE_CHANGE_FRAME, SCALE_FRAME])
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(response.body.is_empty());

    let records = receive(&mut rx, 2).await;
    assert_eq!(records.len(), 2);

    let first = &records[0];
    assert_eq!(first.line, "State changed from starting to up");
    assert_eq!(first.labels.get("env"), Some("test"));
    assert_eq!(first.labels.get(LOGPLEX_HOST_FIELD), Some("host"));
    assert_eq!(first.labels.get(LOGPLEX_APP_FIELD), Some("app"));
    assert_eq!(first.labels.get(LOGPLEX_PROC_FIELD), Some("web.3"));
    assert_eq!(first.labels.get(LOGPLEX_LOG_ID_FIELD), Some("-"));
    assert_eq!(first.extracted[LOGPLEX_TIMESTAMP_FIELD], json!("2012-11-30T06:45:29Z"));
    assert_eq!(
        first.extracted[LOGPLEX_MSG_FIELD],
        json!("State changed from starting to up")
    );
    // arrival time, not the time carried in the message
    assert!(first.timestamp.timestamp() > 1_354_257_929);

    let second = &records[1];
    assert_eq!(second.line, "Scale to web=1");
    assert_eq!(second.labels.get(LOGPLEX_APP_FIELD), Some("heroku"));
    assert_eq!(second.labels.get(LOGPLEX_PROC_FIELD), Some("api"));

    let stats = manager.get("heroku").unwrap().handler().stats();
    assert_eq!(stats.submitted(), 2);
    manager.stop().await;
}

#[tokio::test]
async fn test_malformed_mid_batch_keeps_earlier_records() {
    let (manager, mut rx) = start_jobs(json!([local_job("heroku", json!({}))]))
        .await
        .unwrap();
    let endpoint = manager.get("heroku").unwrap();

    let response = post_drain(endpoint.local_addr(), &[STATE_CHANGE_FRAME, "garbage"])
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.content_type.as_deref(),
        Some("text/plain; charset=utf-8")
    );
    assert!(response.body.starts_with("malformed frame"), "{}", response.body);

    assert_eq!(endpoint.handler().stats().submitted(), 1);
    let records = receive(&mut rx, 1).await;
    assert_eq!(records[0].line, "State changed from starting to up");

    manager.stop().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_truncated_frame_is_bad_request() {
    let (manager, mut rx) = start_jobs(json!([local_job("heroku", json!({}))]))
        .await
        .unwrap();
    let addr = manager.get("heroku").unwrap().local_addr();

    let response = post_drain(addr, &[STATE_CHANGE_FRAME, "83 <40>1 2012"])
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body,
        "truncated frame: expected 83 bytes, 10 remaining"
    );
    assert_eq!(receive(&mut rx, 1).await.len(), 1);
    manager.stop().await;
}

#[tokio::test]
async fn test_bad_message_is_bad_request() {
    let (manager, _rx) = start_jobs(json!([local_job("heroku", json!({}))]))
        .await
        .unwrap();
    let endpoint = manager.get("heroku").unwrap();

    let response = post_drain(endpoint.local_addr(), &["11 <40>1 short"])
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body.starts_with("malformed message"), "{}", response.body);
    assert_eq!(endpoint.handler().stats().submitted(), 0);
    manager.stop().await;
}

#[tokio::test]
async fn test_unknown_route_and_method() {
    let (manager, _rx) = start_jobs(json!([local_job("heroku", json!({}))]))
        .await
        .unwrap();
    let addr = manager.get("heroku").unwrap().local_addr();

    let response = send_request(addr, "POST", "/heroku/api/v1/other", STATE_CHANGE_FRAME.into())
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = send_request(addr, "GET", DRAIN_ENDPOINT_PATH, Vec::new())
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    manager.stop().await;
}

#[tokio::test]
async fn test_payload_over_limit() {
    let (manager, _rx) = start_jobs(json!([local_job(
        "heroku",
        json!({"logplex": {"server": {
            "http_listen_address": "127.0.0.1",
            "max_request_content_length": 64
        }}})
    )]))
    .await
    .unwrap();
    let endpoint = manager.get("heroku").unwrap();

    let response = post_drain(endpoint.local_addr(), &[STATE_CHANGE_FRAME])
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(endpoint.handler().stats().submitted(), 0);
    manager.stop().await;
}

#[tokio::test]
async fn test_declared_frame_length_over_limit() {
    let (manager, _rx) = start_jobs(json!([local_job(
        "heroku",
        json!({"logplex": {"server": {
            "http_listen_address": "127.0.0.1",
            "max_request_content_length": 1024
        }}})
    )]))
    .await
    .unwrap();
    let endpoint = manager.get("heroku").unwrap();

    // a short body whose prefix claims far more than the request may carry
    let response = post_drain(endpoint.local_addr(), &["999999999 x"])
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body,
        "malformed frame: frame length 999999999 exceeds maximum 1024"
    );
    assert_eq!(endpoint.handler().stats().submitted(), 0);
    manager.stop().await;
}

#[tokio::test]
async fn test_chunked_body() {
    let (manager, mut rx) = start_jobs(json!([local_job("heroku", json!({}))]))
        .await
        .unwrap();
    let addr = manager.get("heroku").unwrap().local_addr();

    // a frame split across chunks still decodes
    let response = post_drain_chunked(
        addr,
        vec![
            &STATE_CHANGE_FRAME[..20],
            &STATE_CHANGE_FRAME[20..],
            SCALE_FRAME,
        ],
    )
    .await
    .unwrap();
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    let lines: Vec<_> = receive(&mut rx, 2)
        .await
        .into_iter()
        .map(|r| r.line)
        .collect();
    assert_eq!(lines, ["State changed from starting to up", "Scale to web=1"]);
    manager.stop().await;
}

#[tokio::test]
async fn test_chunked_body_over_limit() {
    let (manager, _rx) = start_jobs(json!([local_job(
        "heroku",
        json!({"logplex": {"server": {
            "http_listen_address": "127.0.0.1",
            "max_request_content_length": 100
        }}})
    )]))
    .await
    .unwrap();
    let addr = manager.get("heroku").unwrap().local_addr();

    let response = post_drain_chunked(addr, vec![STATE_CHANGE_FRAME, STATE_CHANGE_FRAME])
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    manager.stop().await;
}

#[tokio::test]
async fn test_job_stages_apply_to_records() {
    let (manager, mut rx) = start_jobs(json!([local_job(
        "heroku",
        json!({"pipeline_stages": [
            {"labels": {"app": "__logplex_app"}},
            {"timestamp": {"source": "__logplex_ts", "format": "RFC3339"}},
            {"drop": {"expression": "^Scale"}},
            {"output": {"source": "__logplex_msg"}}
        ]})
    )]))
    .await
    .unwrap();
    let endpoint = manager.get("heroku").unwrap();
    assert_eq!(endpoint.handler().pipeline_name(), "push_pipeline_heroku");

    let response = post_drain(endpoint.local_addr(), &[SCALE_FRAME, STATE_CHANGE_FRAME])
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let records = receive(&mut rx, 1).await;
    assert_eq!(records[0].line, "State changed from starting to up");
    assert_eq!(records[0].labels.get("app"), Some("app"));
    assert_eq!(records[0].timestamp.to_rfc3339(), "2012-11-30T06:45:29+00:00");

    manager.stop().await;
    // the scale record was filtered, nothing else arrives
    assert!(rx.try_recv().is_err());
    assert_eq!(endpoint.handler().stats().submitted(), 2);
    assert_eq!(endpoint.handler().stats().forwarded(), 1);
}

#[tokio::test]
async fn test_jobs_are_isolated() {
    let job = |name: &str| {
        local_job(
            name,
            json!({"logplex": {
                "server": {"http_listen_address": "127.0.0.1"},
                "labels": {"job": name}
            }}),
        )
    };
    let (manager, mut rx) = start_jobs(json!([job("a"), job("b")])).await.unwrap();

    let response = post_drain(manager.get("b").unwrap().local_addr(), &[SCALE_FRAME])
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let records = receive(&mut rx, 1).await;
    assert_eq!(records[0].labels.get("job"), Some("b"));
    assert_eq!(manager.get("a").unwrap().handler().stats().submitted(), 0);
    manager.stop().await;
}

#[tokio::test]
async fn test_stop_drains_and_closes_listener() {
    let (manager, mut rx) = start_jobs(json!([local_job("heroku", json!({}))]))
        .await
        .unwrap();
    let addr = manager.get("heroku").unwrap().local_addr();
    assert!(manager.ready());

    let response = post_drain(addr, &[STATE_CHANGE_FRAME, SCALE_FRAME])
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    manager.stop().await;
    assert!(!manager.ready());
    assert!(!manager.details()[0].ready);

    // everything accepted before the stop reached the sink
    let mut delivered = 0;
    while rx.try_recv().is_ok() {
        delivered += 1;
    }
    assert_eq!(delivered, 2);

    assert!(post_drain(addr, &[SCALE_FRAME]).await.is_err());
}
