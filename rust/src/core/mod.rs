mod active_chat;
pub(crate) mod api;
mod config;
mod directory;
mod media;
mod session;
mod timeline;

use std::sync::{Arc, RwLock};

use flume::Sender;

use crate::actions::AppAction;
use crate::state::{AppState, BusyState, UserProfile};
use crate::transport::{SharedTransport, Transport};
use crate::updates::{AppUpdate, CoreMsg, InternalEvent};

use api::{ApiClient, ApiError};
use timeline::TimelineStore;

/// Live authenticated session: identity, bearer credential, and the HTTP
/// client configured with both.
struct Session {
    user: UserProfile,
    token: String,
    api: ApiClient,
}

/// The app actor. Owns every piece of mutable state; runs on its own thread
/// and processes one message to completion before the next, so there is no
/// parallel mutation anywhere. Network calls run on the embedded tokio
/// runtime and come back as `InternalEvent`s in completion order.
pub(crate) struct AppCore {
    pub state: AppState,
    rev: u64,
    last_outgoing_ts: i64,

    update_sender: Sender<AppUpdate>,
    core_sender: Sender<CoreMsg>,
    shared_state: Arc<RwLock<AppState>>,

    data_dir: String,
    config: config::AppConfig,
    runtime: tokio::runtime::Runtime,

    session: Option<Session>,
    transport: SharedTransport,
    timelines: TimelineStore,
}

impl AppCore {
    pub fn new(
        update_sender: Sender<AppUpdate>,
        core_sender: Sender<CoreMsg>,
        data_dir: String,
        shared_state: Arc<RwLock<AppState>>,
        transport: SharedTransport,
    ) -> Self {
        let config = config::load_app_config(&data_dir);
        let state = AppState::empty();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .enable_io()
            .build()
            .expect("tokio runtime");

        let mut this = Self {
            state,
            rev: 0,
            last_outgoing_ts: 0,
            update_sender,
            core_sender,
            shared_state,
            data_dir,
            config,
            runtime,
            session: None,
            transport,
            timelines: TimelineStore::default(),
        };

        // A reload comes back logged in without a network round-trip.
        this.restore_persisted_session();

        // Ensure App::state() has an immediately-available snapshot.
        let snapshot = this.state.clone();
        this.commit_state_snapshot(&snapshot);
        this
    }

    pub fn handle_message(&mut self, msg: CoreMsg) {
        match msg {
            CoreMsg::Action(ref action) => {
                // Never log `?action` directly: it can contain credentials.
                tracing::info!(action = action.tag(), "dispatch");
                self.handle_action(action.clone());
            }
            CoreMsg::Internal(internal) => self.handle_internal(*internal),
        }
    }

    fn handle_action(&mut self, action: AppAction) {
        match action {
            // Auth
            AppAction::Register {
                name,
                email,
                password,
            } => self.register(name, email, password),
            AppAction::Login { email, password } => self.login(email, password),
            AppAction::Logout => self.logout(),

            // Directory
            AppAction::RefreshChats => self.refresh_chats(),
            AppAction::CreateGroup {
                name,
                member_emails,
            } => self.create_group(name, member_emails),
            AppAction::UpdateChat {
                chat_id,
                name,
                description,
            } => self.update_chat(chat_id, name, description),
            AppAction::SetChatAvatar {
                chat_id,
                data_base64,
                mime_type,
            } => self.set_chat_avatar(chat_id, data_base64, mime_type),
            AppAction::RemoveChatAvatar { chat_id } => self.remove_chat_avatar(chat_id),

            // Active chat
            AppAction::OpenChat { chat_id } => self.open_chat(chat_id),
            AppAction::CloseChat => self.close_chat(),
            AppAction::SendMessage { chat_id, content } => self.send_message(chat_id, content),
            AppAction::EditMessage {
                chat_id,
                message_id,
                content,
            } => self.edit_message(chat_id, message_id, content),
            AppAction::DeleteMessage {
                chat_id,
                message_id,
            } => self.delete_message(chat_id, message_id),
            AppAction::SendMedia {
                chat_id,
                data_base64,
                mime_type,
                file_name,
            } => self.send_media(chat_id, data_base64, mime_type, file_name),

            // Membership
            AppAction::AddMembers { chat_id, emails } => self.add_members(chat_id, emails),
            AppAction::InviteUser { chat_id, email } => self.invite_user(chat_id, email),
            AppAction::RemoveMember { chat_id, user_id } => self.remove_member(chat_id, user_id),
            AppAction::LeaveChat { chat_id } => self.leave_chat(chat_id),
            AppAction::DeleteChat { chat_id } => self.delete_chat(chat_id),

            // Profile
            AppAction::SetMyAvatar {
                data_base64,
                mime_type,
            } => self.set_my_avatar(data_base64, mime_type),
            AppAction::RemoveMyAvatar => self.remove_my_avatar(),

            // UI
            AppAction::ClearToast => {
                if self.state.toast.is_some() {
                    self.state.toast = None;
                    self.emit_state();
                }
            }
        }
    }

    fn handle_internal(&mut self, internal: InternalEvent) {
        match internal {
            InternalEvent::ServerEvent(event) => self.handle_server_event(event),

            InternalEvent::AuthFinished {
                registering,
                result,
            } => self.handle_auth_finished(registering, result),

            InternalEvent::ChatsFetched { result } => self.handle_chats_fetched(result),
            InternalEvent::ChatCreated { result } => self.handle_chat_created(result),
            InternalEvent::ChatUpdated { chat_id, result } => {
                self.handle_chat_updated(chat_id, result)
            }
            InternalEvent::ChatAvatarUpdated {
                chat_id,
                removed,
                result,
            } => self.handle_chat_avatar_updated(chat_id, removed, result),
            InternalEvent::MyAvatarUpdated { removed, result } => {
                self.handle_my_avatar_updated(removed, result)
            }

            InternalEvent::HistoryFetched { chat_id, result } => {
                self.handle_history_fetched(chat_id, result)
            }
            InternalEvent::RosterFetched { chat_id, result } => {
                self.handle_roster_fetched(chat_id, result)
            }
            InternalEvent::MessagePersisted {
                chat_id,
                message_id,
                result,
            } => self.handle_persist_result("send", chat_id, message_id, result),
            InternalEvent::EditPersisted {
                chat_id,
                message_id,
                result,
            } => self.handle_persist_result("edit", chat_id, message_id, result),
            InternalEvent::DeletePersisted {
                chat_id,
                message_id,
                result,
            } => self.handle_persist_result("delete", chat_id, message_id, result),

            InternalEvent::MembersAdded { chat_id, result } => {
                self.handle_members_added(chat_id, result)
            }
            InternalEvent::InviteSent { chat_id, result } => {
                self.handle_invite_sent(chat_id, result)
            }
            InternalEvent::MemberRemoved {
                chat_id,
                user_id,
                result,
            } => self.handle_member_removed(chat_id, user_id, result),
            InternalEvent::ChatLeft { chat_id, result } => self.handle_chat_left(chat_id, result),
            InternalEvent::ChatDeleted { chat_id, result } => {
                self.handle_chat_deleted(chat_id, result)
            }
        }
    }

    // State plumbing

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.state.rev = self.rev;
        self.rev
    }

    fn commit_state_snapshot(&self, snapshot: &AppState) {
        match self.shared_state.write() {
            Ok(mut guard) => *guard = snapshot.clone(),
            Err(poison) => *poison.into_inner() = snapshot.clone(),
        }
    }

    fn emit_state(&mut self) {
        self.next_rev();
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(AppUpdate::FullState(snapshot));
    }

    fn toast(&mut self, msg: impl Into<String>) {
        // Kept in state until the UI explicitly clears it, so a snapshot
        // resync cannot lose an error the user has not seen yet.
        self.state.toast = Some(msg.into());
        self.emit_state();
    }

    fn set_busy(&mut self, f: impl FnOnce(&mut BusyState)) {
        let mut next = self.state.busy.clone();
        f(&mut next);
        if next != self.state.busy {
            self.state.busy = next;
            self.emit_state();
        }
    }

    fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    /// Outgoing timestamps are second-granularity; keep them monotonic so
    /// rapid sends don't share a timestamp and reorder under history paging.
    fn next_outgoing_ts(&mut self) -> i64 {
        let now = crate::state::now_seconds();
        if now <= self.last_outgoing_ts {
            self.last_outgoing_ts += 1;
        } else {
            self.last_outgoing_ts = now;
        }
        self.last_outgoing_ts
    }

    // Shared helpers

    fn transport(&self) -> Option<Arc<dyn Transport>> {
        match self.transport.read() {
            Ok(guard) => guard.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    fn join_room(&self, chat_id: &str) {
        if let Some(transport) = self.transport() {
            transport.join_room(chat_id);
        }
    }

    fn leave_room(&self, chat_id: &str) {
        if let Some(transport) = self.transport() {
            transport.leave_room(chat_id);
        }
    }

    fn emit_event(&self, event: crate::transport::ClientEvent) {
        match self.transport() {
            Some(transport) => transport.emit(event),
            None => tracing::debug!("no transport; outbound event dropped"),
        }
    }

    fn active_chat_id(&self) -> Option<String> {
        self.state
            .current_chat
            .as_ref()
            .map(|c| c.chat.id.clone())
    }

    fn is_active_chat(&self, chat_id: &str) -> bool {
        self.active_chat_id().as_deref() == Some(chat_id)
    }

    /// Failure path shared by every async HTTP result. 401 is the one error
    /// class with a global side effect: the session is gone.
    fn report_api_error(&mut self, what: &str, err: ApiError) {
        if matches!(err, ApiError::Unauthorized) {
            tracing::warn!(what, "authorization failure; expiring session");
            self.expire_session();
            return;
        }
        tracing::warn!(what, %err, "request failed");
        self.toast(format!("{what} failed: {err}"));
    }
}
