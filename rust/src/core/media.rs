// Media attachment pipeline: validate before any network call, encode for
// the wire, and normalize inbound payloads into timeline entries.

use base64::Engine;
use sha2::{Digest, Sha256};

use crate::state::{
    AuthState, MediaDescriptor, Message, MessageBody, MessageId, UserProfile,
};
use crate::transport::{ClientEvent, MediaUploadPayload, MessagePayload};
use crate::updates::{CoreMsg, InternalEvent};

use super::api::ApiError;
use super::AppCore;

const MAX_MEDIA_BYTES: usize = 5 * 1024 * 1024;

const AVATAR_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Fallback when the picker supplied no MIME type.
fn mime_type_for_filename(filename: &str) -> String {
    let ext = filename.rsplit('.').next().unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Chat media is images and video, broadly.
fn is_chat_media_mime(mime_type: &str) -> bool {
    mime_type.starts_with("image/") || mime_type.starts_with("video/")
}

/// Decode and size-check an outgoing payload. Runs before anything touches
/// the network.
fn decode_media_payload(data_base64: &str) -> Result<Vec<u8>, String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data_base64.trim())
        .map_err(|e| format!("Invalid media data: {e}"))?;
    if bytes.is_empty() {
        return Err("Pick a file first".to_string());
    }
    if bytes.len() > MAX_MEDIA_BYTES {
        return Err("File is too large (max 5 MB)".to_string());
    }
    Ok(bytes)
}

/// Avatars have a strict allow-list and the bytes must really be an image of
/// the declared format.
fn validate_avatar_payload(bytes: &[u8], mime_type: &str) -> Result<(), String> {
    if !AVATAR_MIME_TYPES.contains(&mime_type) {
        return Err("Please choose a JPEG, PNG, GIF or WebP image".to_string());
    }
    let format = image::guess_format(bytes)
        .map_err(|_| "That file does not look like an image".to_string())?;
    if format.to_mime_type() != mime_type {
        return Err("Image data does not match its declared type".to_string());
    }
    Ok(())
}

fn data_url(mime_type: &str, data_base64: &str) -> String {
    format!("data:{mime_type};base64,{data_base64}")
}

/// Normalize a wire payload into a timeline entry. A payload carrying a file
/// URL becomes a media message; anything else is text. The two are exclusive
/// by construction.
pub(super) fn message_from_payload(chat_id: &str, payload: MessagePayload) -> Message {
    let created_at = payload.created_at.timestamp();
    let body = if let Some(url) = payload.file_url {
        MessageBody::Media(MediaDescriptor {
            file_name: payload.file_name.unwrap_or_else(|| "file".to_string()),
            file_type: payload
                .file_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            file_url: Some(url),
            data_base64: None,
            uploaded_at: created_at,
        })
    } else {
        MessageBody::Text(payload.content.unwrap_or_default())
    };
    Message {
        id: payload
            .id
            .unwrap_or_else(|| MessageId::Plain(uuid::Uuid::new_v4().to_string())),
        chat_id: chat_id.to_string(),
        sender_id: payload.sender_id,
        sender_name: payload.sender_name,
        body,
        created_at,
        edited: payload.is_edited,
        edited_at: None,
    }
}

pub(super) fn payload_from_message(message: &Message) -> MessagePayload {
    let (content, file_url, file_type, file_name) = match &message.body {
        MessageBody::Text(text) => (Some(text.clone()), None, None, None),
        MessageBody::Media(media) => (
            None,
            media.file_url.clone(),
            Some(media.file_type.clone()),
            Some(media.file_name.clone()),
        ),
    };
    MessagePayload {
        id: Some(message.id.clone()),
        chat_id: message.chat_id.clone(),
        sender_id: message.sender_id.clone(),
        sender_name: message.sender_name.clone(),
        content,
        file_url,
        file_type,
        file_name,
        created_at: chrono::DateTime::from_timestamp(message.created_at, 0)
            .unwrap_or_else(chrono::Utc::now),
        is_edited: message.edited,
    }
}

impl AppCore {
    /// Outgoing chat media goes over the real-time channel with full sender
    /// and chat context, not through the message-persistence endpoint, so
    /// other participants see it without waiting for durable storage.
    pub(super) fn send_media(
        &mut self,
        chat_id: String,
        data_base64: String,
        mime_type: String,
        file_name: String,
    ) {
        if !self.is_logged_in() {
            self.toast("Please log in first");
            return;
        }
        let file_name = file_name.trim().to_string();
        if file_name.is_empty() {
            self.toast("File name is required");
            return;
        }
        let mime_type = if mime_type.trim().is_empty() {
            mime_type_for_filename(&file_name)
        } else {
            mime_type.trim().to_string()
        };

        let bytes = match decode_media_payload(&data_base64) {
            Ok(bytes) => bytes,
            Err(msg) => {
                self.toast(msg);
                return;
            }
        };
        if !is_chat_media_mime(&mime_type) {
            self.toast("Only image and video files can be shared");
            return;
        }

        let Some(sess) = self.session.as_ref() else {
            return;
        };
        let sender_id = sess.user.id.clone();
        let sender_name = sess.user.name.clone();

        // Content hash doubles as the local attachment id until the server
        // echoes back a resolved URL.
        let content_hash = hex::encode(Sha256::digest(&bytes));
        let ts = self.next_outgoing_ts();

        let message = Message {
            id: MessageId::Plain(content_hash),
            chat_id: chat_id.clone(),
            sender_id: sender_id.clone(),
            sender_name: sender_name.clone(),
            body: MessageBody::Media(MediaDescriptor {
                file_name: file_name.clone(),
                file_type: mime_type.clone(),
                file_url: None,
                data_base64: Some(data_base64.clone()),
                uploaded_at: ts,
            }),
            created_at: ts,
            edited: false,
            edited_at: None,
        };

        self.timelines.append(&chat_id, message);
        self.project_active_timeline();
        self.emit_state();

        let payload = MediaUploadPayload {
            chat_id,
            sender_id,
            sender_name,
            file_name,
            file_type: mime_type,
            data: data_base64,
            created_at: chrono::DateTime::from_timestamp(ts, 0).unwrap_or_else(chrono::Utc::now),
        };
        self.emit_event(ClientEvent::UploadMedia(payload));
    }

    // Avatars

    pub(super) fn set_chat_avatar(
        &mut self,
        chat_id: String,
        data_base64: String,
        mime_type: String,
    ) {
        if !self.is_logged_in() {
            self.toast("Please log in first");
            return;
        }
        let Some(avatar) = self.validated_avatar_data_url(&data_base64, &mime_type) else {
            return;
        };
        let Some(sess) = self.session.as_ref() else {
            return;
        };
        let api = sess.api.clone();
        let tx = self.core_sender.clone();
        self.set_busy(|b| b.updating_avatar = true);
        self.runtime.spawn(async move {
            let result = api.set_chat_avatar(&chat_id, Some(&avatar)).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::ChatAvatarUpdated {
                    chat_id,
                    removed: false,
                    result,
                },
            )));
        });
    }

    pub(super) fn remove_chat_avatar(&mut self, chat_id: String) {
        if !self.is_logged_in() {
            self.toast("Please log in first");
            return;
        }
        let Some(sess) = self.session.as_ref() else {
            return;
        };
        let api = sess.api.clone();
        let tx = self.core_sender.clone();
        self.set_busy(|b| b.updating_avatar = true);
        self.runtime.spawn(async move {
            let result = api.delete_chat_avatar(&chat_id).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::ChatAvatarUpdated {
                    chat_id,
                    removed: true,
                    result,
                },
            )));
        });
    }

    pub(super) fn handle_chat_avatar_updated(
        &mut self,
        chat_id: String,
        removed: bool,
        result: Result<crate::state::Chat, ApiError>,
    ) {
        self.set_busy(|b| b.updating_avatar = false);
        match result {
            Ok(chat) => {
                tracing::info!(%chat_id, removed, "chat avatar updated");
                self.apply_chat_update(chat);
                self.emit_state();
            }
            // The avatar endpoint is optional on older backends; degrade
            // with a specific message instead of a generic failure.
            Err(ApiError::NotFound) => self.toast("Avatar updates are not available yet"),
            Err(err) => self.report_api_error("Updating avatar", err),
        }
    }

    pub(super) fn set_my_avatar(&mut self, data_base64: String, mime_type: String) {
        if !self.is_logged_in() {
            self.toast("Please log in first");
            return;
        }
        let Some(avatar) = self.validated_avatar_data_url(&data_base64, &mime_type) else {
            return;
        };
        let Some(sess) = self.session.as_ref() else {
            return;
        };
        let api = sess.api.clone();
        let user_id = sess.user.id.clone();
        let tx = self.core_sender.clone();
        self.set_busy(|b| b.updating_avatar = true);
        self.runtime.spawn(async move {
            let result = api.set_my_avatar(&user_id, &avatar).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::MyAvatarUpdated {
                removed: false,
                result,
            })));
        });
    }

    pub(super) fn remove_my_avatar(&mut self) {
        if !self.is_logged_in() {
            self.toast("Please log in first");
            return;
        }
        let Some(sess) = self.session.as_ref() else {
            return;
        };
        let api = sess.api.clone();
        let user_id = sess.user.id.clone();
        let tx = self.core_sender.clone();
        self.set_busy(|b| b.updating_avatar = true);
        self.runtime.spawn(async move {
            let result = api.delete_my_avatar(&user_id).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::MyAvatarUpdated {
                removed: true,
                result,
            })));
        });
    }

    pub(super) fn handle_my_avatar_updated(
        &mut self,
        removed: bool,
        result: Result<UserProfile, ApiError>,
    ) {
        self.set_busy(|b| b.updating_avatar = false);
        match result {
            Ok(user) => {
                tracing::info!(removed, "profile avatar updated");
                if let Some(sess) = self.session.as_mut() {
                    sess.user = user.clone();
                }
                self.state.auth = AuthState::LoggedIn { user };
                // Keep the durable session in step so a reload shows the
                // new avatar.
                if let Some(sess) = self.session.as_ref() {
                    let (user, token) = (sess.user.clone(), sess.token.clone());
                    self.persist_session(&user, &token);
                }
                self.emit_state();
            }
            Err(ApiError::NotFound) => self.toast("Avatar updates are not available yet"),
            Err(err) => self.report_api_error("Updating avatar", err),
        }
    }

    /// Shared avatar validation; returns the ready-to-upload data URL or
    /// toasts and returns `None`.
    fn validated_avatar_data_url(&mut self, data_base64: &str, mime_type: &str) -> Option<String> {
        let bytes = match decode_media_payload(data_base64) {
            Ok(bytes) => bytes,
            Err(msg) => {
                self.toast(msg);
                return None;
            }
        };
        if let Err(msg) = validate_avatar_payload(&bytes, mime_type) {
            self.toast(msg);
            return None;
        }
        Some(data_url(mime_type, data_base64))
    }
}
