#![allow(dead_code)]

pub mod backend;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use huddle_core::{AppReconciler, AppUpdate, ClientEvent, Transport};

pub fn wait_until(what: &str, timeout: Duration, mut f: impl FnMut() -> bool) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("{what}: condition not met within {timeout:?}");
}

pub fn write_config(data_dir: &std::path::Path, api_url: &str, socket_url: &str) {
    let v = serde_json::json!({
        "api_url": api_url,
        "socket_url": socket_url,
    });
    std::fs::write(
        data_dir.join("huddle_config.json"),
        serde_json::to_vec(&v).unwrap(),
    )
    .unwrap();
}

pub struct TestReconciler {
    updates: Arc<Mutex<Vec<AppUpdate>>>,
}

impl TestReconciler {
    pub fn new() -> (Self, Arc<Mutex<Vec<AppUpdate>>>) {
        let updates = Arc::new(Mutex::new(vec![]));
        (
            Self {
                updates: updates.clone(),
            },
            updates,
        )
    }
}

impl AppReconciler for TestReconciler {
    fn reconcile(&self, update: AppUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

/// In-process stand-in for the websocket transport: same single-room swap
/// semantics, but every operation is recorded instead of hitting a socket.
#[derive(Default)]
pub struct FakeTransport {
    room: Mutex<Option<String>>,
    log: Mutex<Vec<String>>,
    events: Mutex<Vec<ClientEvent>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<ClientEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn join_room(&self, chat_id: &str) {
        let mut room = self.room.lock().unwrap();
        if room.as_deref() == Some(chat_id) {
            return;
        }
        let mut log = self.log.lock().unwrap();
        if let Some(previous) = room.take() {
            log.push(format!("leave:{previous}"));
        }
        *room = Some(chat_id.to_string());
        log.push(format!("join:{chat_id}"));
    }

    fn leave_room(&self, chat_id: &str) {
        let mut room = self.room.lock().unwrap();
        if room.as_deref() != Some(chat_id) {
            return;
        }
        *room = None;
        self.log.lock().unwrap().push(format!("leave:{chat_id}"));
    }

    fn emit(&self, event: ClientEvent) {
        self.log
            .lock()
            .unwrap()
            .push(format!("emit:{}", event.name()));
        self.events.lock().unwrap().push(event);
    }

    fn current_room(&self) -> Option<String> {
        self.room.lock().unwrap().clone()
    }
}
