//! Canned HTTP/1.1 responder used by the client tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A canned response, chosen when the request line contains `pattern`
#[derive(Debug, Clone)]
pub struct Route {
    pattern: String,
    status: u16,
    body: String,
    required_header: Option<String>,
}

impl Route {
    pub fn new(pattern: &str, status: u16, body: &str) -> Self {
        Route {
            pattern: pattern.to_string(),
            status,
            body: body.to_string(),
            required_header: None,
        }
    }

    /// Only match when the request headers contain `header` (case-insensitive)
    pub fn with_header(mut self, header: &str) -> Self {
        self.required_header = Some(header.to_lowercase());
        self
    }

    fn matches(&self, request: &str) -> bool {
        let request_line = request.lines().next().unwrap_or("");
        request_line.contains(&self.pattern)
            && self
                .required_header
                .as_ref()
                .map_or(true, |header| request.to_lowercase().contains(header))
    }
}

/// Serve `routes` on an ephemeral local port and return its base URL
///
/// Unmatched requests get a 404. Every response closes its connection.
pub async fn serve(routes: Vec<Route>) -> String {
    serve_counted(routes).await.0
}

/// Like `serve`, also returning the number of requests answered so far
pub async fn serve_counted(routes: Vec<Route>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&requests);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = routes.clone();
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let response = respond(&routes, &request);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}", addr), requests)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}

fn respond(routes: &[Route], request: &str) -> String {
    let (status, body) = routes
        .iter()
        .find(|route| route.matches(request))
        .map_or((404, "not found"), |route| (route.status, route.body.as_str()));

    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason(status),
        body.len(),
        body
    )
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
