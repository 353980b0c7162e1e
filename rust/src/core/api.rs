//! HTTP boundary client. Thin typed wrapper over the backend's REST surface;
//! every call carries the session bearer credential and maps the status codes
//! the rest of the core cares about (401, 404) to distinct error variants.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::state::{Chat, Participant, UserProfile};
use crate::transport::MessagePayload;

#[derive(Clone, Debug)]
pub(crate) enum ApiError {
    /// Bearer credential rejected. The one error with a global side effect:
    /// the caller must drop the session.
    Unauthorized,
    /// Endpoint (or resource) not there. Optional endpoints degrade on this.
    NotFound,
    /// Any other non-2xx, with the server's error message when it sent one.
    Api { status: u16, message: String },
    /// Request never produced a response (connect/timeout/decode).
    Transport(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthorized => write!(f, "not authorized"),
            ApiError::NotFound => write!(f, "not found"),
            ApiError::Api { status, message } => write!(f, "{message} ({status})"),
            ApiError::Transport(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct AuthResponse {
    pub user: UserProfile,
    pub token: String,
}

/// `GET /chats/chat/{chatId}`: chat detail plus the member roster.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ChatDetail {
    pub chat: Chat,
    pub members: Vec<Participant>,
}

/// Mutating chat endpoints answer with the updated chat wrapped in an envelope.
#[derive(Debug, Deserialize)]
struct ChatEnvelope {
    chat: Chat,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: UserProfile,
}

#[derive(Debug, Deserialize)]
struct MembersEnvelope {
    added: Vec<Participant>,
}

#[derive(Debug, Deserialize)]
struct MessageEnvelope {
    #[serde(default)]
    message: Option<String>,
}

/// History comes back either bare or wrapped in `{ "messages": [...] }`
/// depending on the backend version; accept both.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoryResponse {
    Wrapped { messages: Vec<MessagePayload> },
    Bare(Vec<MessagePayload>),
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub(crate) struct ApiClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: String, token: Option<String>) -> Self {
        Self {
            base_url,
            token,
            http: reqwest::Client::new(),
        }
    }

    async fn send<B, T>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, &url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !status.is_success() {
            let body = response.json::<ErrorBody>().await.unwrap_or_default();
            let message = body
                .error
                .or(body.message)
                .unwrap_or_else(|| format!("request failed with status {status}"));
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Transport(format!("invalid response body: {e}")))
    }

    async fn send_ignoring_body<B>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let _: serde_json::Value = self.send(method, path, body).await?;
        Ok(())
    }

    // Auth

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let body = serde_json::json!({ "email": email, "password": password });
        self.send(reqwest::Method::POST, "/users/login", Some(&body))
            .await
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        let body = serde_json::json!({ "name": name, "email": email, "password": password });
        self.send(reqwest::Method::POST, "/users/register", Some(&body))
            .await
    }

    // Directory

    pub async fn chats(&self, user_id: &str) -> Result<Vec<Chat>, ApiError> {
        self.send::<(), _>(reqwest::Method::GET, &format!("/chats/{user_id}"), None)
            .await
    }

    pub async fn chat_detail(&self, chat_id: &str) -> Result<ChatDetail, ApiError> {
        self.send::<(), _>(reqwest::Method::GET, &format!("/chats/chat/{chat_id}"), None)
            .await
    }

    pub async fn create_chat(
        &self,
        name: &str,
        member_emails: &[String],
        created_by: &str,
        creator_email: &str,
    ) -> Result<Chat, ApiError> {
        let body = serde_json::json!({
            "chatName": name,
            "memberEmails": member_emails,
            "createdBy": created_by,
            "creatorEmail": creator_email,
        });
        let envelope: ChatEnvelope = self
            .send(reqwest::Method::POST, "/chats", Some(&body))
            .await?;
        Ok(envelope.chat)
    }

    pub async fn update_chat(
        &self,
        chat_id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Chat, ApiError> {
        let body = serde_json::json!({ "chatName": name, "description": description });
        let envelope: ChatEnvelope = self
            .send(reqwest::Method::PUT, &format!("/chats/{chat_id}"), Some(&body))
            .await?;
        Ok(envelope.chat)
    }

    /// `avatar: None` clears the avatar (the endpoint treats null as removal).
    pub async fn set_chat_avatar(
        &self,
        chat_id: &str,
        avatar: Option<&str>,
    ) -> Result<Chat, ApiError> {
        let body = serde_json::json!({ "avatar": avatar });
        let envelope: ChatEnvelope = self
            .send(
                reqwest::Method::PUT,
                &format!("/chats/{chat_id}/avatar"),
                Some(&body),
            )
            .await?;
        Ok(envelope.chat)
    }

    pub async fn delete_chat_avatar(&self, chat_id: &str) -> Result<Chat, ApiError> {
        let envelope: ChatEnvelope = self
            .send::<(), _>(
                reqwest::Method::DELETE,
                &format!("/chats/{chat_id}/avatar"),
                None,
            )
            .await?;
        Ok(envelope.chat)
    }

    // Membership

    pub async fn add_members(
        &self,
        chat_id: &str,
        emails: &[String],
    ) -> Result<Vec<Participant>, ApiError> {
        let body = serde_json::json!({ "emails": emails });
        let envelope: MembersEnvelope = self
            .send(
                reqwest::Method::POST,
                &format!("/chats/{chat_id}/members"),
                Some(&body),
            )
            .await?;
        Ok(envelope.added)
    }

    pub async fn invite(
        &self,
        chat_id: &str,
        email: &str,
        invited_by: &str,
    ) -> Result<String, ApiError> {
        let body = serde_json::json!({ "email": email, "invitedBy": invited_by });
        let envelope: MessageEnvelope = self
            .send(
                reqwest::Method::POST,
                &format!("/chats/{chat_id}/invite"),
                Some(&body),
            )
            .await?;
        Ok(envelope
            .message
            .unwrap_or_else(|| "Invitation sent".to_string()))
    }

    pub async fn remove_member(&self, chat_id: &str, user_id: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({ "userId": user_id });
        self.send_ignoring_body(
            reqwest::Method::POST,
            &format!("/chats/{chat_id}/remove"),
            Some(&body),
        )
        .await
    }

    pub async fn leave_chat(&self, chat_id: &str, user_id: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({ "userId": user_id });
        self.send_ignoring_body(
            reqwest::Method::POST,
            &format!("/chats/{chat_id}/leave"),
            Some(&body),
        )
        .await
    }

    pub async fn delete_chat(&self, chat_id: &str) -> Result<(), ApiError> {
        self.send_ignoring_body::<()>(reqwest::Method::DELETE, &format!("/chats/{chat_id}"), None)
            .await
    }

    // Messages

    pub async fn history(&self, chat_id: &str) -> Result<Vec<MessagePayload>, ApiError> {
        let response: HistoryResponse = self
            .send::<(), _>(reqwest::Method::GET, &format!("/messages/{chat_id}"), None)
            .await?;
        Ok(match response {
            HistoryResponse::Wrapped { messages } => messages,
            HistoryResponse::Bare(messages) => messages,
        })
    }

    pub async fn post_message(&self, payload: &MessagePayload) -> Result<(), ApiError> {
        self.send_ignoring_body(reqwest::Method::POST, "/messages/message", Some(payload))
            .await
    }

    pub async fn edit_message(&self, message_id: &str, content: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({ "content": content });
        self.send_ignoring_body(
            reqwest::Method::PUT,
            &format!("/messages/{message_id}"),
            Some(&body),
        )
        .await
    }

    pub async fn delete_message(&self, message_id: &str) -> Result<(), ApiError> {
        self.send_ignoring_body::<()>(
            reqwest::Method::DELETE,
            &format!("/messages/{message_id}"),
            None,
        )
        .await
    }

    // Profile

    pub async fn set_my_avatar(
        &self,
        user_id: &str,
        avatar: &str,
    ) -> Result<UserProfile, ApiError> {
        let body = serde_json::json!({ "avatar": avatar });
        let envelope: UserEnvelope = self
            .send(
                reqwest::Method::PUT,
                &format!("/users/{user_id}/avatar"),
                Some(&body),
            )
            .await?;
        Ok(envelope.user)
    }

    pub async fn delete_my_avatar(&self, user_id: &str) -> Result<UserProfile, ApiError> {
        let envelope: UserEnvelope = self
            .send::<(), _>(
                reqwest::Method::DELETE,
                &format!("/users/{user_id}/avatar"),
                None,
            )
            .await?;
        Ok(envelope.user)
    }
}
