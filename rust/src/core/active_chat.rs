// Active-chat orchestration: room switching, history + roster fetches, push
// event application, and the optimistic message paths.

use crate::state::{now_seconds, ChatViewState, Message, MessageBody, MessageId};
use crate::transport::{ClientEvent, MessagePayload, ServerEvent};
use crate::updates::{CoreMsg, InternalEvent};

use super::api::{ApiError, ChatDetail};
use super::media;
use super::timeline::MessagePatch;
use super::AppCore;

impl AppCore {
    /// Activate a chat: swap room membership (the transport leaves the old
    /// room and joins the new one atomically), then start the history and
    /// roster fetches as two independent tasks. Each applies its own result
    /// whenever it lands; there is no join barrier between them.
    pub(super) fn open_chat(&mut self, chat_id: String) {
        if !self.is_logged_in() {
            self.toast("Please log in first");
            return;
        }
        let chat = {
            let Some(entry) = self
                .state
                .chat_list
                .iter_mut()
                .find(|s| s.chat.id == chat_id)
            else {
                self.toast("Chat not found");
                return;
            };
            entry.unread_count = 0;
            entry.chat.clone()
        };

        self.join_room(&chat_id);

        // Anything already streamed for this chat renders immediately; the
        // history fetch below overwrites it on arrival.
        let messages = self.timelines.messages(&chat_id).to_vec();
        self.state.current_chat = Some(ChatViewState {
            chat,
            participants: vec![],
            messages,
            history_loaded: false,
        });
        self.emit_state();

        let Some(sess) = self.session.as_ref() else {
            return;
        };
        let api = sess.api.clone();
        let tx = self.core_sender.clone();
        let id = chat_id.clone();
        self.runtime.spawn(async move {
            let result = api.history(&id).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::HistoryFetched {
                chat_id: id,
                result,
            })));
        });

        let api = sess.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.chat_detail(&chat_id).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::RosterFetched {
                chat_id,
                result,
            })));
        });
    }

    pub(super) fn close_chat(&mut self) {
        let Some(current) = self.state.current_chat.take() else {
            return;
        };
        self.leave_room(&current.chat.id);
        self.emit_state();
    }

    pub(super) fn handle_history_fetched(
        &mut self,
        chat_id: String,
        result: Result<Vec<MessagePayload>, ApiError>,
    ) {
        match result {
            Ok(payloads) => {
                let messages: Vec<Message> = payloads
                    .into_iter()
                    .map(|p| media::message_from_payload(&chat_id, p))
                    .collect();
                tracing::debug!(%chat_id, count = messages.len(), "history applied");
                // Overwrite, not merge: push events that raced this fetch are
                // dropped here. A late result for a chat the user already
                // left still lands in that chat's timeline.
                self.timelines.replace(&chat_id, messages);
                if self.is_active_chat(&chat_id) {
                    if let Some(current) = self.state.current_chat.as_mut() {
                        current.history_loaded = true;
                    }
                    self.project_active_timeline();
                }
                self.emit_state();
            }
            Err(err) => self.report_api_error("Loading messages", err),
        }
    }

    pub(super) fn handle_roster_fetched(
        &mut self,
        chat_id: String,
        result: Result<ChatDetail, ApiError>,
    ) {
        match result {
            Ok(detail) => {
                // Unlike timelines, the roster belongs to the chat view; a
                // stale result for a chat no longer active is dropped.
                if !self.is_active_chat(&chat_id) {
                    tracing::debug!(%chat_id, "stale roster result discarded");
                    return;
                }
                // Fetch supersedes the roster wholesale.
                if let Some(current) = self.state.current_chat.as_mut() {
                    current.participants = detail.members;
                }
                self.apply_chat_update(detail.chat);
                self.emit_state();
            }
            Err(err) => self.report_api_error("Loading members", err),
        }
    }

    /// Push events are chat-agnostic: they land in whichever timeline their
    /// payload names, whether or not that chat is on screen. The chat view is
    /// only re-projected when its own chat was touched.
    pub(super) fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::MessageReceived(payload) | ServerEvent::MediaReceived(payload) => {
                let chat_id = payload.chat_id.clone();
                tracing::debug!(%chat_id, "push message received");
                let message = media::message_from_payload(&chat_id, payload);
                self.timelines.append(&chat_id, message);
                if self.is_active_chat(&chat_id) {
                    self.project_active_timeline();
                } else {
                    self.bump_unread(&chat_id);
                }
                self.emit_state();
            }
            ServerEvent::MessageEdited(payload) => {
                let Some(id) = payload.id else {
                    tracing::debug!("edit event without id ignored");
                    return;
                };
                let chat_id = payload.chat_id;
                self.timelines.update(
                    &chat_id,
                    MessagePatch {
                        id,
                        content: payload.content,
                        edited: Some(true),
                        edited_at: Some(now_seconds()),
                    },
                );
                if self.is_active_chat(&chat_id) {
                    self.project_active_timeline();
                }
                self.emit_state();
            }
        }
    }

    // Optimistic local paths. All three apply locally first, then broadcast
    // and persist; a failed persistence call leaves the local state as-is
    // and surfaces a toast.

    pub(super) fn send_message(&mut self, chat_id: String, content: String) {
        if !self.is_logged_in() {
            self.toast("Please log in first");
            return;
        }
        let content = content.trim().to_string();
        if content.is_empty() {
            return;
        }
        let Some(sess) = self.session.as_ref() else {
            return;
        };
        let api = sess.api.clone();
        let sender_id = sess.user.id.clone();
        let sender_name = sess.user.name.clone();

        let ts = self.next_outgoing_ts();

        let message = Message {
            id: MessageId::Plain(uuid::Uuid::new_v4().to_string()),
            chat_id: chat_id.clone(),
            sender_id,
            sender_name,
            body: MessageBody::Text(content),
            created_at: ts,
            edited: false,
            edited_at: None,
        };
        let message_id = message.id.canonical().to_string();
        let payload = media::payload_from_message(&message);

        self.timelines.append(&chat_id, message);
        self.project_active_timeline();
        self.emit_state();

        self.emit_event(ClientEvent::NewMessage(payload.clone()));

        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.post_message(&payload).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::MessagePersisted {
                    chat_id,
                    message_id,
                    result,
                },
            )));
        });
    }

    pub(super) fn edit_message(&mut self, chat_id: String, message_id: String, content: String) {
        if !self.is_logged_in() {
            self.toast("Please log in first");
            return;
        }
        let content = content.trim().to_string();
        if content.is_empty() {
            return;
        }

        self.timelines.update(
            &chat_id,
            MessagePatch {
                id: MessageId::Plain(message_id.clone()),
                content: Some(content.clone()),
                edited: Some(true),
                edited_at: Some(now_seconds()),
            },
        );
        let Some(message) = self
            .timelines
            .messages(&chat_id)
            .iter()
            .find(|m| m.id.canonical() == message_id)
            .cloned()
        else {
            // Nothing matched locally; don't broadcast an edit of nothing.
            return;
        };
        self.project_active_timeline();
        self.emit_state();

        let payload = media::payload_from_message(&message);
        self.emit_event(ClientEvent::MessageEdited(payload));

        let Some(sess) = self.session.as_ref() else {
            return;
        };
        let api = sess.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.edit_message(&message_id, &content).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::EditPersisted {
                chat_id,
                message_id,
                result,
            })));
        });
    }

    pub(super) fn delete_message(&mut self, chat_id: String, message_id: String) {
        if !self.is_logged_in() {
            self.toast("Please log in first");
            return;
        }
        self.timelines
            .remove(&chat_id, &MessageId::Plain(message_id.clone()));
        self.project_active_timeline();
        self.emit_state();

        let Some(sess) = self.session.as_ref() else {
            return;
        };
        let api = sess.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.delete_message(&message_id).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::DeletePersisted {
                chat_id,
                message_id,
                result,
            })));
        });
    }

    pub(super) fn handle_persist_result(
        &mut self,
        op: &str,
        chat_id: String,
        message_id: String,
        result: Result<(), ApiError>,
    ) {
        match result {
            Ok(()) => {
                tracing::debug!(%chat_id, %message_id, op, "message persisted");
            }
            // The optimistic state stays; retry is on the user.
            Err(err) => self.report_api_error(&format!("Message {op}"), err),
        }
    }

    /// Re-project the active chat's timeline into the view state. Cheap: the
    /// per-chat store is the source of truth, the view holds a copy.
    pub(super) fn project_active_timeline(&mut self) {
        let Some(current) = self.state.current_chat.as_mut() else {
            return;
        };
        current.messages = self.timelines.messages(&current.chat.id).to_vec();
    }
}
