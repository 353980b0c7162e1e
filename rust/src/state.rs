use serde::{Deserialize, Serialize};

/// Message identifier as it travels on the wire. Locally minted ids and most
/// server responses are plain strings, but some backend paths return the id
/// wrapped in an object. Comparisons must always go through [`MessageId::canonical`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Plain(String),
    Wrapped { id: String },
}

impl MessageId {
    /// The single canonical form used for every identity comparison.
    pub fn canonical(&self) -> &str {
        match self {
            MessageId::Plain(id) => id,
            MessageId::Wrapped { id } => id,
        }
    }
}

impl PartialEq for MessageId {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for MessageId {}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        MessageId::Plain(id.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "chatName", default)]
    pub name: String,
    #[serde(rename = "isGroupChat", default)]
    pub is_group: bool,
    #[serde(default)]
    pub avatar: Option<String>,
    /// Group owner; `None` for 1:1 chats.
    #[serde(default)]
    pub admin: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "memberCount", default)]
    pub member_count: Option<u32>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A message body is text or media, never both.
#[derive(Clone, Debug, PartialEq)]
pub enum MessageBody {
    Text(String),
    Media(MediaDescriptor),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MediaDescriptor {
    pub file_name: String,
    pub file_type: String,
    /// Server-resolved location, once the upload has been processed.
    pub file_url: Option<String>,
    /// Raw payload for locally originated attachments awaiting the server echo.
    pub data_base64: Option<String>,
    pub uploaded_at: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub body: MessageBody,
    pub created_at: i64,
    pub edited: bool,
    pub edited_at: Option<i64>,
}

#[derive(Clone, Debug)]
pub enum AuthState {
    LoggedOut,
    LoggedIn { user: UserProfile },
}

impl AuthState {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, AuthState::LoggedIn { .. })
    }

    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            AuthState::LoggedOut => None,
            AuthState::LoggedIn { user } => Some(user),
        }
    }
}

/// "In flight" flags for long-ish operations that the UI should reflect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusyState {
    pub registering: bool,
    pub logging_in: bool,
    pub loading_chats: bool,
    pub creating_group: bool,
    pub updating_avatar: bool,
}

impl BusyState {
    pub fn idle() -> Self {
        Self {
            registering: false,
            logging_in: false,
            loading_chats: false,
            creating_group: false,
            updating_avatar: false,
        }
    }
}

/// One entry in the chat directory.
#[derive(Clone, Debug)]
pub struct ChatSummary {
    pub chat: Chat,
    pub unread_count: u32,
}

/// The chat the user currently has open: directory entry, roster, and the
/// projected timeline.
#[derive(Clone, Debug)]
pub struct ChatViewState {
    pub chat: Chat,
    pub participants: Vec<Participant>,
    pub messages: Vec<Message>,
    /// False until the first history fetch for this visit has been applied.
    pub history_loaded: bool,
}

#[derive(Clone, Debug)]
pub struct AppState {
    pub rev: u64,
    pub auth: AuthState,
    pub busy: BusyState,
    pub chat_list: Vec<ChatSummary>,
    pub current_chat: Option<ChatViewState>,
    pub toast: Option<String>,
}

impl AppState {
    pub fn empty() -> Self {
        Self {
            rev: 0,
            auth: AuthState::LoggedOut,
            busy: BusyState::idle(),
            chat_list: vec![],
            current_chat: None,
            toast: None,
        }
    }
}

pub fn now_seconds() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
