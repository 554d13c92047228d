//! Local axum server for adapter tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use axum::Router;
use tokio::net::TcpListener;

/// A request as seen by the server.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// A canned response.
#[derive(Debug, Clone)]
pub struct Canned {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Canned {
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".into(), "application/json".into())],
            body: body.to_string().into_bytes(),
        }
    }

    pub fn bytes(status: u16, body: &[u8]) -> Self {
        Self {
            status,
            headers: vec![("content-type".into(), "image/jpeg".into())],
            body: body.to_vec(),
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self { status: 302, headers: vec![("location".into(), location.into())], body: Vec::new() }
    }
}

#[derive(Clone)]
struct ServerState {
    routes: Arc<HashMap<String, Canned>>,
    requests: Arc<Mutex<Vec<Captured>>>,
}

pub struct TestServer {
    pub base: String,
    requests: Arc<Mutex<Vec<Captured>>>,
}

impl TestServer {
    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }
}

/// Serve `routes` (keyed by raw path without query) until the test ends.
///
/// Unknown paths answer 404.
pub async fn serve(routes: Vec<(&str, Canned)>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = ServerState {
        routes: Arc::new(routes.into_iter().map(|(p, c)| (p.to_string(), c)).collect()),
        requests: Arc::default(),
    };
    let requests = Arc::clone(&state.requests);

    // A fallback sees the undecoded path, which the URL-encoding tests rely on.
    let app = Router::new().fallback(respond).with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestServer { base: format!("http://{addr}"), requests }
}

async fn respond(
    State(state): State<ServerState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let canned = state
        .routes
        .get(uri.path())
        .cloned()
        .unwrap_or_else(|| Canned::bytes(404, b"not found"));

    let path = uri.path_and_query().map_or_else(|| uri.path().to_string(), ToString::to_string);
    let headers = headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect();
    state.requests.lock().unwrap().push(Captured {
        method: method.to_string(),
        path,
        headers,
        body: body.to_vec(),
    });

    let mut response = Response::builder().status(canned.status);
    for (name, value) in &canned.headers {
        response = response.header(name.as_str(), value.as_str());
    }
    response.body(Body::from(canned.body)).unwrap()
}

/// An address nothing listens on.
pub async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
