// Session lifecycle: authentication, durable restore, teardown.

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::state::{AuthState, BusyState, UserProfile};
use crate::transport::WsTransport;
use crate::updates::{CoreMsg, InternalEvent};

use super::api::{ApiClient, ApiError, AuthResponse};
use super::AppCore;

/// What survives a reload: the authenticated identity and the bearer token.
#[derive(Serialize, Deserialize)]
struct PersistedSession {
    user: UserProfile,
    token: String,
}

fn read_persisted_session(path: &PathBuf) -> anyhow::Result<PersistedSession> {
    let bytes = std::fs::read(path).context("read session file")?;
    serde_json::from_slice(&bytes).context("decode session file")
}

impl AppCore {
    fn session_path(&self) -> PathBuf {
        std::path::Path::new(&self.data_dir).join("session.json")
    }

    /// Called once at startup. A missing session file is the ordinary
    /// logged-out steady state; a corrupt one is discarded with a warning.
    pub(super) fn restore_persisted_session(&mut self) {
        let path = self.session_path();
        if !path.exists() {
            return;
        }
        match read_persisted_session(&path) {
            Ok(saved) => {
                tracing::info!(user_id = %saved.user.id, "session restored from disk");
                self.start_session(saved.user, saved.token);
            }
            Err(e) => {
                tracing::warn!(err = %format!("{e:#}"), "ignoring unreadable session file");
                let _ = std::fs::remove_file(&path);
            }
        }
    }

    pub(super) fn register(&mut self, name: String, email: String, password: String) {
        let name = name.trim().to_string();
        let email = email.trim().to_string();
        if name.is_empty() || email.is_empty() || password.is_empty() {
            self.toast("Name, email and password are required");
            return;
        }
        self.set_busy(|b| {
            b.registering = true;
            b.logging_in = false;
        });
        self.spawn_auth_request(true, move |api| async move {
            api.register(&name, &email, &password).await
        });
    }

    pub(super) fn login(&mut self, email: String, password: String) {
        let email = email.trim().to_string();
        if email.is_empty() || password.is_empty() {
            self.toast("Email and password are required");
            return;
        }
        self.set_busy(|b| {
            b.logging_in = true;
            b.registering = false;
        });
        self.spawn_auth_request(false, move |api| async move {
            api.login(&email, &password).await
        });
    }

    fn spawn_auth_request<F, Fut>(&mut self, registering: bool, call: F)
    where
        F: FnOnce(ApiClient) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<AuthResponse, ApiError>> + Send,
    {
        // No token yet: authentication itself is the only unauthenticated call.
        let api = ApiClient::new(self.api_url(), None);
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = call(api).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::AuthFinished {
                registering,
                result,
            })));
        });
    }

    pub(super) fn handle_auth_finished(
        &mut self,
        registering: bool,
        result: Result<AuthResponse, ApiError>,
    ) {
        self.set_busy(|b| {
            b.logging_in = false;
            b.registering = false;
        });
        match result {
            Ok(auth) => {
                self.persist_session(&auth.user, &auth.token);
                self.start_session(auth.user, auth.token);
            }
            Err(err) => {
                // A 401 here is just bad credentials; there is no session to drop.
                let what = if registering { "Registration" } else { "Login" };
                tracing::warn!(%err, "{what} failed");
                match err {
                    ApiError::Unauthorized => self.toast(format!("{what} failed: invalid credentials")),
                    other => self.toast(format!("{what} failed: {other}")),
                }
            }
        }
    }

    pub(super) fn start_session(&mut self, user: UserProfile, token: String) {
        let api = ApiClient::new(self.api_url(), Some(token.clone()));
        tracing::info!(user_id = %user.id, "start_session");
        self.session = Some(super::Session {
            user: user.clone(),
            token,
            api,
        });
        self.state.auth = AuthState::LoggedIn { user };
        self.ensure_transport();
        self.emit_state();
        self.refresh_chats();
    }

    /// Lazily install the process-wide socket transport. Tests pre-fill the
    /// slot with a fake; in that case (or with networking disabled) nothing
    /// is constructed here.
    pub(super) fn ensure_transport(&mut self) {
        let installed = match self.transport.read() {
            Ok(guard) => guard.is_some(),
            Err(poison) => poison.into_inner().is_some(),
        };
        if installed || !self.network_enabled() {
            return;
        }
        let transport = WsTransport::spawn(
            self.socket_url(),
            self.core_sender.clone(),
            self.runtime.handle(),
        );
        match self.transport.write() {
            Ok(mut guard) => *guard = Some(transport),
            Err(poison) => *poison.into_inner() = Some(transport),
        }
    }

    pub(super) fn logout(&mut self) {
        self.delete_persisted_session();
        self.teardown_session();
        self.emit_state();
    }

    /// Authorization failure path: same teardown as logout, plus a toast so
    /// the user knows why they are looking at the login screen again.
    pub(super) fn expire_session(&mut self) {
        self.delete_persisted_session();
        self.teardown_session();
        self.toast("Session expired, please log in again");
    }

    fn teardown_session(&mut self) {
        if let Some(chat_id) = self.active_chat_id() {
            self.leave_room(&chat_id);
        }
        self.session = None;
        self.state.auth = AuthState::LoggedOut;
        self.state.chat_list.clear();
        self.state.current_chat = None;
        self.state.busy = BusyState::idle();
        self.timelines.clear();
        self.last_outgoing_ts = 0;
    }

    pub(super) fn persist_session(&self, user: &UserProfile, token: &str) {
        let saved = PersistedSession {
            user: user.clone(),
            token: token.to_string(),
        };
        match serde_json::to_vec(&saved) {
            Ok(json) => {
                if let Err(e) = std::fs::write(self.session_path(), json) {
                    tracing::warn!(%e, "failed to persist session");
                }
            }
            Err(e) => tracing::warn!(%e, "failed to encode session"),
        }
    }

    fn delete_persisted_session(&self) {
        let path = self.session_path();
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(%e, path = %path.display(), "failed to delete session file");
            }
        }
    }
}
