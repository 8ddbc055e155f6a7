// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The HTTP drain endpoint.
//!
//! Each `POST /heroku/api/v1/drain` body is a run of logplex frames. Frames are
//! decoded as the body streams in; every decoded message becomes a [`Record`]
//! that is submitted to the job's pipeline before the next frame is read. A
//! decode error stops the request with `400`, keeping the records already
//! submitted. A fully decoded body gets `204`.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{http, Method, Request, StatusCode};
use log_pipeline::logplex::{scan_stream, DecodeError, PositionalMessage};
use log_pipeline::{EntryHandler, LabelSet, Record, SubmissionError};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::LogplexTargetConfig;
use crate::error::EndpointError;
use crate::http_utils::{
    empty_response, header_str, log_and_create_http_response, verify_request_content_length,
    HttpResponse,
};

pub const DRAIN_ENDPOINT_PATH: &str = "/heroku/api/v1/drain";

const LOGPLEX_DRAIN_TOKEN_HEADER: &str = "logplex-drain-token";
const LOGPLEX_FRAME_ID_HEADER: &str = "logplex-frame-id";
const LOGPLEX_MSG_COUNT_HEADER: &str = "logplex-msg-count";

/// Status snapshot of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointDetails {
    pub job_name: String,
    pub address: SocketAddr,
    pub route: &'static str,
    pub ready: bool,
}

pub struct IngestionEndpoint {
    job_name: String,
    labels: LabelSet,
    local_addr: SocketAddr,
    handler: Arc<EntryHandler>,
    shutdown: CancellationToken,
    serving: Arc<AtomicBool>,
    server: Mutex<Option<JoinHandle<Result<(), EndpointError>>>>,
}

impl std::fmt::Debug for IngestionEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionEndpoint")
            .field("job_name", &self.job_name)
            .field("local_addr", &self.local_addr)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

/// Per-endpoint state shared by every request.
struct DrainContext {
    job_name: String,
    labels: LabelSet,
    handler: Arc<EntryHandler>,
    max_request_content_length: usize,
    submit_timeout: Duration,
    shutdown: CancellationToken,
}

impl IngestionEndpoint {
    /// Binds the listener and starts serving. Records go to `handler`.
    pub async fn bind(
        job_name: impl Into<String>,
        config: &LogplexTargetConfig,
        handler: EntryHandler,
    ) -> Result<Self, EndpointError> {
        let job_name = job_name.into();
        let addr = config.server.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| EndpointError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| EndpointError::Bind { addr, source })?;

        let handler = Arc::new(handler);
        let shutdown = CancellationToken::new();
        let context = Arc::new(DrainContext {
            job_name: job_name.clone(),
            labels: config.labels.clone(),
            handler: Arc::clone(&handler),
            max_request_content_length: config.server.max_request_content_length,
            submit_timeout: config.server.submit_timeout(),
            shutdown: shutdown.clone(),
        });
        let service = service_fn(move |req| {
            let context = Arc::clone(&context);
            async move { context.handle(req).await }
        });

        let serving = Arc::new(AtomicBool::new(true));
        let server = {
            let shutdown = shutdown.clone();
            let serving = Arc::clone(&serving);
            tokio::spawn(async move {
                let result = serve_tcp(listener, service, shutdown).await;
                serving.store(false, Ordering::Release);
                result
            })
        };

        info!(job = %job_name, address = %local_addr, "logplex drain endpoint listening");
        Ok(Self {
            job_name,
            labels: config.labels.clone(),
            local_addr,
            handler,
            shutdown,
            serving,
            server: Mutex::new(Some(server)),
        })
    }

    #[must_use]
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Static labels added to every record.
    #[must_use]
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// True while the listener accepts requests and the pipeline accepts records.
    #[must_use]
    pub fn ready(&self) -> bool {
        !self.shutdown.is_cancelled()
            && !self.handler.is_stopped()
            && self.serving.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn details(&self) -> EndpointDetails {
        EndpointDetails {
            job_name: self.job_name.clone(),
            address: self.local_addr,
            route: DRAIN_ENDPOINT_PATH,
            ready: self.ready(),
        }
    }

    #[must_use]
    pub fn handler(&self) -> &EntryHandler {
        &self.handler
    }

    /// Stops accepting requests, fails pending submissions, drains the
    /// pipeline into the sink and waits for the listener task to exit.
    pub async fn stop(&self) -> Result<(), EndpointError> {
        self.shutdown.cancel();
        let drained = self.handler.stop().await;

        let server = self.server.lock().await.take();
        if let Some(server) = server {
            server.await.map_err(|source| EndpointError::Join {
                job: self.job_name.clone(),
                source,
            })??;
        }
        drained.map_err(|source| EndpointError::Join {
            job: self.job_name.clone(),
            source,
        })?;
        info!(job = %self.job_name, "logplex drain endpoint stopped");
        Ok(())
    }
}

async fn serve_tcp<S>(
    listener: TcpListener,
    service: S,
    shutdown: CancellationToken,
) -> Result<(), EndpointError>
where
    S: hyper::service::Service<Request<Incoming>, Response = HttpResponse>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let server = hyper::server::conn::http1::Builder::new();
    let mut joinset = JoinSet::new();

    loop {
        let conn = tokio::select! {
            () = shutdown.cancelled() => break,
            con_res = listener.accept() => match con_res {
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionAborted
                            | io::ErrorKind::ConnectionReset
                            | io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    error!("Server error: {e}");
                    return Err(EndpointError::Serve(e));
                }
                Ok((conn, _)) => conn,
            },
            finished = async {
                match joinset.join_next().await {
                    Some(finished) => finished,
                    None => std::future::pending().await,
                }
            } => match finished {
                Err(e) if e.is_panic() => {
                    error!("Connection handler panicked: {e:?}");
                    continue;
                }
                Ok(()) | Err(_) => continue,
            },
        };
        let conn = hyper_util::rt::TokioIo::new(conn);
        let server = server.clone();
        let service = service.clone();
        let shutdown = shutdown.clone();
        joinset.spawn(async move {
            let conn = server.serve_connection(conn, service);
            tokio::pin!(conn);
            let result = tokio::select! {
                result = conn.as_mut() => result,
                () = shutdown.cancelled() => {
                    conn.as_mut().graceful_shutdown();
                    conn.as_mut().await
                }
            };
            if let Err(e) = result {
                debug!("Connection error: {e}");
            }
        });
    }

    // let in-flight requests finish
    while joinset.join_next().await.is_some() {}
    Ok(())
}

impl DrainContext {
    async fn handle(&self, req: Request<Incoming>) -> http::Result<HttpResponse> {
        match (req.method(), req.uri().path()) {
            (&Method::POST, DRAIN_ENDPOINT_PATH) => self.drain(req).await,
            (_, DRAIN_ENDPOINT_PATH) => log_and_create_http_response(
                &format!("Method {} not allowed on {DRAIN_ENDPOINT_PATH}", req.method()),
                StatusCode::METHOD_NOT_ALLOWED,
            ),
            _ => empty_response(StatusCode::NOT_FOUND),
        }
    }

    async fn drain(&self, req: Request<Incoming>) -> http::Result<HttpResponse> {
        let (parts, body) = req.into_parts();
        if let Some(response) = verify_request_content_length(
            &parts.headers,
            self.max_request_content_length,
            "Error processing drain request",
        ) {
            return response;
        }

        let expected_count =
            header_str(&parts.headers, LOGPLEX_MSG_COUNT_HEADER).and_then(|v| v.parse::<usize>().ok());
        debug!(
            job = %self.job_name,
            drain_token = header_str(&parts.headers, LOGPLEX_DRAIN_TOKEN_HEADER).unwrap_or_default(),
            frame_id = header_str(&parts.headers, LOGPLEX_FRAME_ID_HEADER).unwrap_or_default(),
            msg_count = ?expected_count,
            "received drain request"
        );

        let body = Limited::new(body, self.max_request_content_length)
            .into_data_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let mut messages = std::pin::pin!(scan_stream(
            StreamReader::new(body),
            self.max_request_content_length
        ));

        let mut submitted = 0usize;
        while let Some(message) = messages.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => return self.decode_failure(&e, submitted),
            };
            if let Err(e) = self.submit(&message).await {
                return log_and_create_http_response(
                    &format!("Error submitting record for job {}: {e}", self.job_name),
                    StatusCode::SERVICE_UNAVAILABLE,
                );
            }
            submitted += 1;
        }

        if let Some(expected) = expected_count.filter(|expected| *expected != submitted) {
            debug!(
                job = %self.job_name,
                expected,
                submitted,
                "logplex message count does not match decoded frames"
            );
        }
        empty_response(StatusCode::NO_CONTENT)
    }

    /// Bounded by the submit timeout and by the endpoint shutting down.
    async fn submit(&self, message: &PositionalMessage) -> Result<(), SubmissionError> {
        let record = self.build_record(message);
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(SubmissionError::Cancelled),
            result = tokio::time::timeout(self.submit_timeout, self.handler.submit(record)) => {
                result.unwrap_or(Err(SubmissionError::Timeout))
            }
        }
    }

    fn build_record(&self, message: &PositionalMessage) -> Record {
        let mut record =
            Record::new(message.message.clone()).with_labels(self.labels.merge(&message.labels()));
        message.write_extracted(&mut record.extracted);
        record
    }

    fn decode_failure(&self, error: &DecodeError, submitted: usize) -> http::Result<HttpResponse> {
        if let DecodeError::Io(e) = error {
            let too_large = e
                .get_ref()
                .is_some_and(|inner| inner.is::<LengthLimitError>());
            if too_large {
                return log_and_create_http_response(
                    "Error processing drain request: Payload too large",
                    StatusCode::PAYLOAD_TOO_LARGE,
                );
            }
        }
        warn!(job = %self.job_name, submitted, "stopped decoding drain request");
        log_and_create_http_response(&error.to_string(), StatusCode::BAD_REQUEST)
    }
}
