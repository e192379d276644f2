//! In-process fake Prometheus for integration tests.
//!
//! Serves `/-/ready` and `/api/v1/query`, answering queries from a table of
//! canned bodies keyed by the exact PromQL expression and recording every
//! expression it receives.

#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tokio::net::TcpListener;

#[derive(Default)]
struct State {
    responses: HashMap<String, (StatusCode, String)>,
    queries: Vec<String>,
    ready: bool,
    delay: Option<Duration>,
}

#[derive(Clone)]
pub struct FakePrometheus {
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
}

impl FakePrometheus {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(State {
            ready: true,
            ..Default::default()
        }));

        let server_state = state.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let io = TokioIo::new(stream);
                let state = server_state.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req| handle(state.clone(), req));
                    let _ = http1::Builder::new().serve_connection(io, service).await;
                });
            }
        });

        Self { addr, state }
    }

    /// `host:port`, without scheme, as a registry would list it.
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().ready = ready;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = Some(delay);
    }

    /// Answer `expr` with a success envelope around `data`.
    pub fn respond(&self, expr: &str, data: serde_json::Value) {
        self.respond_raw(
            expr,
            StatusCode::OK,
            serde_json::json!({"status": "success", "data": data}).to_string(),
        );
    }

    pub fn respond_raw(&self, expr: &str, status: StatusCode, body: String) {
        self.state
            .lock()
            .responses
            .insert(expr.to_string(), (status, body));
    }

    /// Answer `expr` with a single-sample vector.
    pub fn respond_value(&self, expr: &str, value: &str) {
        self.respond(expr, vector(vec![(serde_json::json!({}), value)]));
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().queries.clone()
    }
}

/// Vector `data` block from (labels, value) pairs.
pub fn vector(samples: Vec<(serde_json::Value, &str)>) -> serde_json::Value {
    let result: Vec<_> = samples
        .into_iter()
        .map(|(metric, value)| serde_json::json!({"metric": metric, "value": [1700000000.0, value]}))
        .collect();
    serde_json::json!({"resultType": "vector", "result": result})
}

/// An address nothing listens on.
pub async fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

async fn handle(
    state: Arc<Mutex<State>>,
    req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match req.uri().path() {
        "/-/ready" => {
            let ready = state.lock().ready;
            let status = if ready {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            reply(status, "ready".to_string())
        }
        "/api/v1/query" => {
            let expr = query_param(req.uri().query().unwrap_or(""), "query");
            let (delay, canned) = {
                let mut state = state.lock();
                state.queries.push(expr.clone());
                (state.delay, state.responses.get(&expr).cloned())
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match canned {
                Some((status, body)) => reply(status, body),
                None => reply(
                    StatusCode::OK,
                    serde_json::json!({
                        "status": "success",
                        "data": {"resultType": "vector", "result": []}
                    })
                    .to_string(),
                ),
            }
        }
        _ => reply(StatusCode::NOT_FOUND, "not found".to_string()),
    };
    Ok(response)
}

fn reply(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

fn query_param(query: &str, name: &str) -> String {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| {
            urlencoding::decode(&value.replace('+', " "))
                .map(|v| v.into_owned())
                .unwrap_or_default()
        })
        .unwrap_or_default()
}
