// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Body, Frame};
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use log_pipeline::{Record, RecordSink, StageRegistry};
use logplex_drain::{EndpointManager, JobConfig, DRAIN_ENDPOINT_PATH};
use tokio::sync::mpsc;
use tokio::time::timeout;

pub const STATE_CHANGE_FRAME: &str =
    "83 <40>1 2012-11-30T06:45:29+00:00 host app web.3 - State changed from starting to up\n";
pub const SCALE_FRAME: &str =
    "66 <190>1 2012-11-30T06:45:26+00:00 host heroku api - Scale to web=1\n";

pub struct DrainResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

/// Starts one endpoint per job, all delivering into the returned receiver.
pub async fn start_jobs(
    jobs: serde_json::Value,
) -> Result<(EndpointManager, mpsc::Receiver<Record>), Box<dyn std::error::Error>> {
    let jobs: Vec<JobConfig> = serde_json::from_value(jobs)?;
    let (tx, rx) = mpsc::channel::<Record>(64);
    let sink: Arc<dyn RecordSink> = Arc::new(tx);
    let manager = EndpointManager::new(&jobs, &StageRegistry::default(), sink).await?;
    Ok((manager, rx))
}

/// A job listening on an ephemeral loopback port.
pub fn local_job(name: &str, extra: serde_json::Value) -> serde_json::Value {
    let mut job = serde_json::json!({
        "job_name": name,
        "logplex": {"server": {"http_listen_address": "127.0.0.1"}}
    });
    if let (Some(job), serde_json::Value::Object(extra)) = (job.as_object_mut(), extra) {
        job.extend(extra);
    }
    job
}

/// Waits for `count` records to reach the sink.
pub async fn receive(rx: &mut mpsc::Receiver<Record>, count: usize) -> Vec<Record> {
    let mut records = Vec::with_capacity(count);
    while records.len() < count {
        match timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(record)) => records.push(record),
            Ok(None) | Err(_) => break,
        }
    }
    records
}

async fn send<B>(
    addr: SocketAddr,
    request: Request<B>,
) -> Result<DrainResponse, Box<dyn std::error::Error>>
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let stream = timeout(Duration::from_secs(2), tokio::net::TcpStream::connect(addr)).await??;

    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

    tokio::spawn(async move {
        let _ = conn.await;
    });

    let response = timeout(Duration::from_secs(2), sender.send_request(request)).await??;
    let status = response.status();
    let content_type = response
        .headers()
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = timeout(Duration::from_secs(2), response.into_body().collect())
        .await??
        .to_bytes();

    Ok(DrainResponse {
        status,
        content_type,
        body: String::from_utf8(body.to_vec())?,
    })
}

/// Sends an HTTP request with a fixed-length body to `uri`.
pub async fn send_request(
    addr: SocketAddr,
    method: &str,
    uri: &str,
    body: Vec<u8>,
) -> Result<DrainResponse, Box<dyn std::error::Error>> {
    let request = Request::builder()
        .uri(uri)
        .method(method)
        .header("Content-Length", body.len().to_string())
        .body(Full::new(Bytes::from(body)))?;
    send(addr, request).await
}

/// Posts a logplex batch the way the Heroku router does.
pub async fn post_drain(
    addr: SocketAddr,
    frames: &[&str],
) -> Result<DrainResponse, Box<dyn std::error::Error>> {
    let body = frames.concat().into_bytes();
    let request = Request::builder()
        .uri(DRAIN_ENDPOINT_PATH)
        .method("POST")
        .header("Content-Type", "application/logplex-1")
        .header("Content-Length", body.len().to_string())
        .header("Logplex-Msg-Count", frames.len().to_string())
        .header("Logplex-Frame-Id", "09C557EAFCFB6CF2740EE62F62971098")
        .header("Logplex-Drain-Token", "d.fc6b856b-3332-4546-93de-7d0ee272c3bd")
        .body(Full::new(Bytes::from(body)))?;
    send(addr, request).await
}

/// Posts a batch with `Transfer-Encoding: chunked`, one chunk per element.
pub async fn post_drain_chunked(
    addr: SocketAddr,
    chunks: Vec<&'static str>,
) -> Result<DrainResponse, Box<dyn std::error::Error>> {
    let frames = chunks
        .into_iter()
        .map(|chunk| Ok::<_, Infallible>(Frame::data(Bytes::from_static(chunk.as_bytes()))));
    let request = Request::builder()
        .uri(DRAIN_ENDPOINT_PATH)
        .method("POST")
        .header("Content-Type", "application/logplex-1")
        .body(StreamBody::new(futures::stream::iter(frames)))?;
    send(addr, request).await
}
