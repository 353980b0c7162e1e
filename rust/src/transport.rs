//! Real-time channel: one process-wide socket connection shared by every
//! consumer, exposed behind the [`Transport`] trait so tests can substitute a
//! recording fake.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::state::MessageId;
use crate::updates::{CoreMsg, InternalEvent};

/// Wire shape of a chat message, shared by push events, optimistic broadcast
/// and history responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub is_edited: bool,
}

/// Outbound media, carried over the socket with full sender/chat context so
/// other participants see it without waiting for durable storage.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUploadPayload {
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub file_name: String,
    pub file_type: String,
    /// Base64-encoded bytes.
    pub data: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinChat(String),
    LeaveChat(String),
    NewMessage(MessagePayload),
    MessageEdited(MessagePayload),
    UploadMedia(MediaUploadPayload),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinChat(_) => "joinChat",
            ClientEvent::LeaveChat(_) => "leaveChat",
            ClientEvent::NewMessage(_) => "newMessage",
            ClientEvent::MessageEdited(_) => "messageEdited",
            ClientEvent::UploadMedia(_) => "uploadMedia",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    MessageReceived(MessagePayload),
    MessageEdited(MessagePayload),
    MediaReceived(MessagePayload),
}

/// The subscribe/unsubscribe/emit surface of the real-time channel.
///
/// Push-event delivery is not part of this trait: every decoded server event
/// is forwarded into the core inbox the adapter was constructed with, so
/// handlers are bound to the adapter's lifetime rather than registered (and
/// re-registered) by screens.
pub trait Transport: Send + Sync {
    /// Join `chat_id`, leaving any previously joined room first. Joining the
    /// room already joined is a no-op. The leave/join pair is issued under one
    /// lock, so the membership set is never observed holding two rooms.
    fn join_room(&self, chat_id: &str);

    /// Leave `chat_id` if it is the joined room; otherwise a no-op.
    fn leave_room(&self, chat_id: &str);

    fn emit(&self, event: ClientEvent);

    fn current_room(&self) -> Option<String>;
}

/// Slot holding the process-wide transport. Filled once at session start (or
/// up front by tests); consumers only ever see the trait object.
pub type SharedTransport = Arc<RwLock<Option<Arc<dyn Transport>>>>;

fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}

/// Websocket-backed transport. Owns a single connection task for the lifetime
/// of the process: it reconnects with jittered backoff, re-joins the current
/// room after every (re)connect, and forwards decoded server events into the
/// core inbox. Events emitted while disconnected are dropped, not buffered.
pub struct WsTransport {
    outbound: tokio::sync::mpsc::UnboundedSender<ClientEvent>,
    connected: Arc<AtomicBool>,
    room: Arc<Mutex<Option<String>>>,
}

impl WsTransport {
    pub fn spawn(
        url: String,
        sink: flume::Sender<CoreMsg>,
        handle: &tokio::runtime::Handle,
    ) -> Arc<Self> {
        let (outbound, outbound_rx) = tokio::sync::mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            outbound,
            connected: Arc::new(AtomicBool::new(false)),
            room: Arc::new(Mutex::new(None)),
        });
        handle.spawn(run_connection(
            url,
            sink,
            outbound_rx,
            transport.connected.clone(),
            transport.room.clone(),
        ));
        transport
    }

    #[cfg(test)]
    fn detached() -> (Self, tokio::sync::mpsc::UnboundedReceiver<ClientEvent>) {
        let (outbound, outbound_rx) = tokio::sync::mpsc::unbounded_channel();
        let transport = Self {
            outbound,
            connected: Arc::new(AtomicBool::new(true)),
            room: Arc::new(Mutex::new(None)),
        };
        (transport, outbound_rx)
    }

    fn send(&self, event: ClientEvent) {
        if !self.connected.load(Ordering::SeqCst) {
            tracing::debug!(event = event.name(), "socket not connected; event dropped");
            return;
        }
        let _ = self.outbound.send(event);
    }
}

impl Transport for WsTransport {
    fn join_room(&self, chat_id: &str) {
        let mut room = lock(&self.room);
        if room.as_deref() == Some(chat_id) {
            return;
        }
        if let Some(previous) = room.take() {
            self.send(ClientEvent::LeaveChat(previous));
        }
        *room = Some(chat_id.to_string());
        self.send(ClientEvent::JoinChat(chat_id.to_string()));
    }

    fn leave_room(&self, chat_id: &str) {
        let mut room = lock(&self.room);
        if room.as_deref() != Some(chat_id) {
            return;
        }
        *room = None;
        self.send(ClientEvent::LeaveChat(chat_id.to_string()));
    }

    fn emit(&self, event: ClientEvent) {
        self.send(event);
    }

    fn current_room(&self) -> Option<String> {
        lock(&self.room).clone()
    }
}

async fn run_connection(
    url: String,
    sink: flume::Sender<CoreMsg>,
    mut outbound_rx: tokio::sync::mpsc::UnboundedReceiver<ClientEvent>,
    connected: Arc<AtomicBool>,
    room: Arc<Mutex<Option<String>>>,
) {
    let mut attempt: u32 = 0;
    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                attempt = 0;
                connected.store(true, Ordering::SeqCst);
                tracing::info!(%url, "socket connected");
                let (mut write, mut read) = stream.split();

                // Re-join the active room so a reconnect keeps receiving push
                // events for it (at-least-once; the server may redeliver).
                let active_room = lock(&room).clone();
                if let Some(chat_id) = active_room {
                    if let Ok(text) = serde_json::to_string(&ClientEvent::JoinChat(chat_id)) {
                        let _ = write.send(WsMessage::Text(text.into())).await;
                    }
                }

                loop {
                    tokio::select! {
                        out = outbound_rx.recv() => match out {
                            Some(event) => {
                                let Ok(text) = serde_json::to_string(&event) else {
                                    continue;
                                };
                                if write.send(WsMessage::Text(text.into())).await.is_err() {
                                    break;
                                }
                            }
                            // Transport handle dropped; nothing left to do.
                            None => return,
                        },
                        frame = read.next() => match frame {
                            Some(Ok(WsMessage::Text(text))) => {
                                match serde_json::from_str::<ServerEvent>(text.as_str()) {
                                    Ok(event) => {
                                        let _ = sink.send(CoreMsg::Internal(Box::new(
                                            InternalEvent::ServerEvent(event),
                                        )));
                                    }
                                    Err(e) => {
                                        tracing::debug!(%e, "unrecognized socket frame ignored");
                                    }
                                }
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::warn!(%e, "socket read error");
                                break;
                            }
                            None => {
                                tracing::info!("socket closed by server");
                                break;
                            }
                        },
                    }
                }
                connected.store(false, Ordering::SeqCst);
            }
            Err(e) => {
                tracing::warn!(%e, %url, "socket connect failed");
            }
        }

        // Jittered exponential backoff, bounded at ~8s.
        attempt = attempt.saturating_add(1);
        let base = 250u64.saturating_mul(1u64 << attempt.min(5));
        let jitter = rand::thread_rng().gen_range(0..=base / 2);
        tokio::time::sleep(Duration::from_millis(base + jitter)).await;
    }
}
