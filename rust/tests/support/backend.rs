//! In-process mock of the chat backend: a hand-rolled HTTP/1.1 responder for
//! the REST surface and a websocket endpoint for the real-time channel.
//! Responses are configured per `METHOD path`; individual endpoints can be
//! gated so tests control the order in which in-flight calls resolve.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Notify};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use huddle_core::ServerEvent;

pub struct MockBackend {
    pub api_url: String,
    pub socket_url: String,
    state: Arc<BackendState>,
    // Keeps the accept loops alive for the backend's lifetime.
    _runtime: tokio::runtime::Runtime,
}

struct BackendState {
    responses: Mutex<HashMap<String, (u16, String)>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    requests: Mutex<Vec<(String, String)>>,
    ws_frames: Mutex<Vec<serde_json::Value>>,
    ws_connections: AtomicUsize,
    broadcast: broadcast::Sender<String>,
}

/// Handle to a gated endpoint; the pending request is answered on `release`.
pub struct Gate {
    notify: Arc<Notify>,
}

impl Gate {
    pub fn release(&self) {
        self.notify.notify_one();
    }
}

impl MockBackend {
    pub fn start() -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let (broadcast_tx, _) = broadcast::channel(64);
        let state = Arc::new(BackendState {
            responses: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            requests: Mutex::new(vec![]),
            ws_frames: Mutex::new(vec![]),
            ws_connections: AtomicUsize::new(0),
            broadcast: broadcast_tx,
        });

        let (http_addr, ws_addr) = runtime.block_on(async {
            let http = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let ws = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let http_addr = http.local_addr().unwrap();
            let ws_addr = ws.local_addr().unwrap();
            tokio::spawn(serve_http(http, state.clone()));
            tokio::spawn(serve_ws(ws, state.clone()));
            (http_addr, ws_addr)
        });

        Self {
            api_url: format!("http://{http_addr}"),
            socket_url: format!("ws://{ws_addr}"),
            state,
            _runtime: runtime,
        }
    }

    pub fn respond(&self, method: &str, path: &str, status: u16, body: serde_json::Value) {
        self.state
            .responses
            .lock()
            .unwrap()
            .insert(format!("{method} {path}"), (status, body.to_string()));
    }

    /// Hold every request to `METHOD path` until the returned gate is released.
    pub fn gate(&self, method: &str, path: &str) -> Gate {
        let notify = Arc::new(Notify::new());
        self.state
            .gates
            .lock()
            .unwrap()
            .insert(format!("{method} {path}"), notify.clone());
        Gate { notify }
    }

    pub fn requests(&self) -> Vec<(String, String)> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn saw_request(&self, method: &str, path: &str) -> bool {
        self.requests()
            .iter()
            .any(|(m, p)| m == method && p == path)
    }

    /// Text frames received from the client, parsed as JSON envelopes.
    pub fn ws_frames(&self) -> Vec<serde_json::Value> {
        self.state.ws_frames.lock().unwrap().clone()
    }

    pub fn saw_ws_event(&self, event: &str) -> bool {
        self.ws_frames().iter().any(|f| f["event"] == event)
    }

    pub fn ws_connections(&self) -> usize {
        self.state.ws_connections.load(Ordering::SeqCst)
    }

    /// Broadcast a push event to every connected socket client.
    pub fn push(&self, event: &ServerEvent) {
        let _ = self
            .state
            .broadcast
            .send(serde_json::to_string(event).unwrap());
    }

    /// Broadcast a raw frame, for wire shapes the typed model can't produce.
    pub fn push_json(&self, frame: serde_json::Value) {
        let _ = self.state.broadcast.send(frame.to_string());
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

async fn serve_http(listener: TcpListener, state: Arc<BackendState>) {
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        tokio::spawn(handle_http(stream, state.clone()));
    }
}

async fn handle_http(mut stream: TcpStream, state: Arc<BackendState>) {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
                    break pos;
                }
            }
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("").to_string();
    let content_length = lines
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .next()
        .unwrap_or(0);

    // Drain the body so the connection isn't reset under the client.
    let total = header_end + 4 + content_length;
    while buf.len() < total {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    // Recorded before any gate, so tests can observe a request in flight.
    state
        .requests
        .lock()
        .unwrap()
        .push((method.clone(), path.clone()));

    let key = format!("{method} {path}");
    let gate = state.gates.lock().unwrap().get(&key).cloned();
    if let Some(gate) = gate {
        gate.notified().await;
    }

    let (status, body) = state
        .responses
        .lock()
        .unwrap()
        .get(&key)
        .cloned()
        .unwrap_or((404, r#"{"error":"not found"}"#.to_string()));
    let reason = match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

async fn serve_ws(listener: TcpListener, state: Arc<BackendState>) {
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let state = state.clone();
        tokio::spawn(async move {
            let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                return;
            };
            state.ws_connections.fetch_add(1, Ordering::SeqCst);
            let (mut write, mut read) = ws.split();
            let mut rx = state.broadcast.subscribe();
            loop {
                tokio::select! {
                    frame = read.next() => match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            if let Ok(v) = serde_json::from_str::<serde_json::Value>(text.as_str()) {
                                state.ws_frames.lock().unwrap().push(v);
                            }
                        }
                        Some(Ok(_)) => {}
                        _ => break,
                    },
                    out = rx.recv() => match out {
                        Ok(text) => {
                            if write.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
    }
}
