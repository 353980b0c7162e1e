// Chat directory: the set of chats visible to the user, group management,
// and membership changes.

use crate::state::{Chat, ChatSummary, Participant};
use crate::updates::{CoreMsg, InternalEvent};

use super::api::ApiError;
use super::AppCore;

impl AppCore {
    pub(super) fn refresh_chats(&mut self) {
        let Some(sess) = self.session.as_ref() else {
            return;
        };
        let api = sess.api.clone();
        let user_id = sess.user.id.clone();
        let tx = self.core_sender.clone();
        self.set_busy(|b| b.loading_chats = true);
        self.runtime.spawn(async move {
            let result = api.chats(&user_id).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::ChatsFetched {
                result,
            })));
        });
    }

    pub(super) fn handle_chats_fetched(&mut self, result: Result<Vec<Chat>, ApiError>) {
        self.set_busy(|b| b.loading_chats = false);
        match result {
            Ok(chats) => {
                // The fetch supersedes the list wholesale, but unread counts
                // are client-side bookkeeping and carry over.
                let previous: Vec<(String, u32)> = self
                    .state
                    .chat_list
                    .iter()
                    .map(|s| (s.chat.id.clone(), s.unread_count))
                    .collect();
                self.state.chat_list = chats
                    .into_iter()
                    .map(|chat| {
                        let unread_count = previous
                            .iter()
                            .find(|(id, _)| *id == chat.id)
                            .map(|(_, n)| *n)
                            .unwrap_or(0);
                        ChatSummary { chat, unread_count }
                    })
                    .collect();
                self.emit_state();
            }
            Err(err) => self.report_api_error("Loading chats", err),
        }
    }

    pub(super) fn create_group(&mut self, name: String, member_emails: Vec<String>) {
        if !self.is_logged_in() {
            self.toast("Please log in first");
            return;
        }
        let name = name.trim().to_string();
        if name.is_empty() {
            self.toast("Group name is required");
            return;
        }
        let emails: Vec<String> = member_emails
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();

        let Some(sess) = self.session.as_ref() else {
            return;
        };
        let api = sess.api.clone();
        let created_by = sess.user.id.clone();
        let creator_email = sess.user.email.clone();
        let tx = self.core_sender.clone();
        self.set_busy(|b| b.creating_group = true);
        self.runtime.spawn(async move {
            let result = api
                .create_chat(&name, &emails, &created_by, &creator_email)
                .await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::ChatCreated {
                result,
            })));
        });
    }

    pub(super) fn handle_chat_created(&mut self, result: Result<Chat, ApiError>) {
        self.set_busy(|b| b.creating_group = false);
        match result {
            Ok(chat) => {
                let chat_id = chat.id.clone();
                self.state.chat_list.insert(
                    0,
                    ChatSummary {
                        chat,
                        unread_count: 0,
                    },
                );
                // Land the user in the new group right away.
                self.open_chat(chat_id);
            }
            Err(err) => self.report_api_error("Creating group", err),
        }
    }

    pub(super) fn update_chat(
        &mut self,
        chat_id: String,
        name: Option<String>,
        description: Option<String>,
    ) {
        if !self.is_logged_in() {
            self.toast("Please log in first");
            return;
        }
        if name.is_none() && description.is_none() {
            return;
        }
        let Some(sess) = self.session.as_ref() else {
            return;
        };
        let api = sess.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api
                .update_chat(&chat_id, name.as_deref(), description.as_deref())
                .await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::ChatUpdated {
                chat_id,
                result,
            })));
        });
    }

    pub(super) fn handle_chat_updated(&mut self, _chat_id: String, result: Result<Chat, ApiError>) {
        match result {
            Ok(chat) => {
                self.apply_chat_update(chat);
                self.emit_state();
            }
            Err(err) => self.report_api_error("Updating chat", err),
        }
    }

    /// Replace the directory entry (and the open chat view, if it is the same
    /// chat) with the server's updated copy. Unread count is preserved.
    pub(super) fn apply_chat_update(&mut self, chat: Chat) {
        if let Some(entry) = self
            .state
            .chat_list
            .iter_mut()
            .find(|s| s.chat.id == chat.id)
        {
            entry.chat = chat.clone();
        }
        if let Some(current) = self.state.current_chat.as_mut() {
            if current.chat.id == chat.id {
                current.chat = chat;
            }
        }
    }

    // Membership

    pub(super) fn add_members(&mut self, chat_id: String, emails: Vec<String>) {
        if !self.is_logged_in() {
            self.toast("Please log in first");
            return;
        }
        let emails: Vec<String> = emails
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if emails.is_empty() {
            self.toast("Enter at least one email address");
            return;
        }
        let Some(sess) = self.session.as_ref() else {
            return;
        };
        let api = sess.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.add_members(&chat_id, &emails).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::MembersAdded {
                chat_id,
                result,
            })));
        });
    }

    pub(super) fn handle_members_added(
        &mut self,
        chat_id: String,
        result: Result<Vec<Participant>, ApiError>,
    ) {
        match result {
            Ok(added) => {
                // Explicit adds mutate the local roster in place; the next
                // roster fetch supersedes it wholesale anyway.
                let count = added.len() as u32;
                if let Some(current) = self.state.current_chat.as_mut() {
                    if current.chat.id == chat_id {
                        for member in added {
                            if !current.participants.iter().any(|p| p.id == member.id) {
                                current.participants.push(member);
                            }
                        }
                    }
                }
                if let Some(entry) = self
                    .state
                    .chat_list
                    .iter_mut()
                    .find(|s| s.chat.id == chat_id)
                {
                    if let Some(n) = entry.chat.member_count.as_mut() {
                        *n += count;
                    }
                }
                self.emit_state();
            }
            Err(err) => self.report_api_error("Adding members", err),
        }
    }

    pub(super) fn invite_user(&mut self, chat_id: String, email: String) {
        if !self.is_logged_in() {
            self.toast("Please log in first");
            return;
        }
        let email = email.trim().to_string();
        if email.is_empty() {
            self.toast("Please enter an email address");
            return;
        }
        let Some(sess) = self.session.as_ref() else {
            return;
        };
        let api = sess.api.clone();
        let invited_by = sess.user.id.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.invite(&chat_id, &email, &invited_by).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::InviteSent {
                chat_id,
                result,
            })));
        });
    }

    pub(super) fn handle_invite_sent(&mut self, chat_id: String, result: Result<String, ApiError>) {
        match result {
            Ok(message) => {
                tracing::info!(%chat_id, "invite sent");
                self.toast(message);
            }
            Err(err) => self.report_api_error("Sending invite", err),
        }
    }

    pub(super) fn remove_member(&mut self, chat_id: String, user_id: String) {
        if !self.is_logged_in() {
            self.toast("Please log in first");
            return;
        }
        let Some(sess) = self.session.as_ref() else {
            return;
        };
        let api = sess.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.remove_member(&chat_id, &user_id).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::MemberRemoved {
                chat_id,
                user_id,
                result,
            })));
        });
    }

    pub(super) fn handle_member_removed(
        &mut self,
        chat_id: String,
        user_id: String,
        result: Result<(), ApiError>,
    ) {
        match result {
            Ok(()) => {
                if let Some(current) = self.state.current_chat.as_mut() {
                    if current.chat.id == chat_id {
                        current.participants.retain(|p| p.id != user_id);
                    }
                }
                if let Some(entry) = self
                    .state
                    .chat_list
                    .iter_mut()
                    .find(|s| s.chat.id == chat_id)
                {
                    if let Some(n) = entry.chat.member_count.as_mut() {
                        *n = n.saturating_sub(1);
                    }
                }
                self.emit_state();
            }
            Err(err) => self.report_api_error("Removing member", err),
        }
    }

    pub(super) fn leave_chat(&mut self, chat_id: String) {
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
        self.runtime.spawn(async move {
            let result = api.leave_chat(&chat_id, &user_id).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::ChatLeft {
                chat_id,
                result,
            })));
        });
    }

    pub(super) fn handle_chat_left(&mut self, chat_id: String, result: Result<(), ApiError>) {
        match result {
            Ok(()) => {
                self.remove_chat_locally(&chat_id);
                self.emit_state();
            }
            Err(err) => self.report_api_error("Leaving group", err),
        }
    }

    pub(super) fn delete_chat(&mut self, chat_id: String) {
        if !self.is_logged_in() {
            self.toast("Please log in first");
            return;
        }
        let Some(sess) = self.session.as_ref() else {
            return;
        };
        let api = sess.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.delete_chat(&chat_id).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::ChatDeleted {
                chat_id,
                result,
            })));
        });
    }

    pub(super) fn handle_chat_deleted(&mut self, chat_id: String, result: Result<(), ApiError>) {
        match result {
            Ok(()) => {
                self.remove_chat_locally(&chat_id);
                self.toast("Chat deleted");
            }
            Err(err) => self.report_api_error("Deleting chat", err),
        }
    }

    /// A chat that is gone (left or deleted) disappears from the directory
    /// and its timeline is discarded.
    fn remove_chat_locally(&mut self, chat_id: &str) {
        self.state.chat_list.retain(|s| s.chat.id != chat_id);
        self.timelines.discard(chat_id);
        if self.is_active_chat(chat_id) {
            self.leave_room(chat_id);
            self.state.current_chat = None;
        }
    }

    pub(super) fn bump_unread(&mut self, chat_id: &str) {
        if let Some(entry) = self
            .state
            .chat_list
            .iter_mut()
            .find(|s| s.chat.id == chat_id)
        {
            entry.unread_count += 1;
        }
    }
}
