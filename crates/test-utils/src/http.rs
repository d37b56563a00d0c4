//! A local HTTP/1.1 server standing in for the remote archives.
//!
//! Routes map a request path (query string ignored) to a canned response.
//! Unknown paths answer 404. Every request is recorded so tests can assert
//! what was fetched, in which order, and with which headers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A canned response.
#[derive(Debug, Clone)]
pub struct StubResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl StubResponse {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// 200 with an opaque body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::status(200)
            .header("Content-Type", "application/octet-stream")
            .body(body)
    }

    /// 200 with an HTML page, as served by directory listings and login
    /// redirects.
    pub fn html(body: &str) -> Self {
        Self::status(200)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(body)
    }

    pub fn json(body: &str) -> Self {
        Self::status(200)
            .header("Content-Type", "application/json")
            .body(body)
    }

    /// 200 with the contents of a file on disk.
    pub fn file(path: &Path) -> Self {
        let body = std::fs::read(path).expect("Failed to read stub response file");
        Self::ok(body)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason(self.status));
        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        let body: &[u8] = if self.status == 304 { &[] } else { &self.body };
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        head.push_str("Connection: close\r\n\r\n");
        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(body);
        bytes
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        304 => "Not Modified",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// One request as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Path without the query string.
    pub path: String,
    pub query: Option<String>,
    /// Header names lowercased.
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    fn parse(head: &str) -> Option<Self> {
        let mut lines = head.split("\r\n");
        let target = lines.next()?.split_whitespace().nth(1)?;
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };
        let headers = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(n, v)| (n.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect();
        Some(Self {
            path,
            query,
            headers,
        })
    }
}

type Routes = Arc<Mutex<HashMap<String, StubResponse>>>;
type Log = Arc<Mutex<Vec<RecordedRequest>>>;

/// Serves canned routes on an ephemeral local port until dropped.
pub struct StubServer {
    addr: SocketAddr,
    routes: Routes,
    requests: Log,
    handle: JoinHandle<()>,
}

impl StubServer {
    pub async fn start<I, P>(routes: I) -> Self
    where
        I: IntoIterator<Item = (P, StubResponse)>,
        P: Into<String>,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind stub server");
        let addr = listener.local_addr().expect("Stub server has no address");
        let routes: Routes = Arc::new(Mutex::new(
            routes.into_iter().map(|(p, r)| (p.into(), r)).collect(),
        ));
        let requests: Log = Arc::new(Mutex::new(Vec::new()));

        let (table, log) = (routes.clone(), requests.clone());
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, table.clone(), log.clone()));
            }
        });

        Self {
            addr,
            routes,
            requests,
            handle,
        }
    }

    /// `http://127.0.0.1:<port>`
    pub fn base(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base(), path)
    }

    /// Add or replace a route. Useful when a body has to name the server's
    /// own URLs.
    pub fn respond(&self, path: impl Into<String>, response: StubResponse) {
        self.routes
            .lock()
            .expect("route table poisoned")
            .insert(path.into(), response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("request log poisoned").clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, routes: Routes, log: Log) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let head = String::from_utf8_lossy(&buf).into_owned();
    let Some(request) = RecordedRequest::parse(&head) else {
        return;
    };
    let response = routes
        .lock()
        .expect("route table poisoned")
        .get(&request.path)
        .cloned()
        .unwrap_or_else(|| StubResponse::status(404));
    log.lock().expect("request log poisoned").push(request);

    let _ = stream.write_all(&response.to_bytes()).await;
    let _ = stream.shutdown().await;
}
