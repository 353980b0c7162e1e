use crate::actions::AppAction;
use crate::core::api::{ApiError, AuthResponse, ChatDetail};
use crate::state::{AppState, Chat, Participant, UserProfile};
use crate::transport::{MessagePayload, ServerEvent};

#[derive(Clone, Debug)]
pub enum AppUpdate {
    FullState(AppState),
}

impl AppUpdate {
    pub fn rev(&self) -> u64 {
        match self {
            AppUpdate::FullState(state) => state.rev,
        }
    }
}

#[derive(Debug)]
pub(crate) enum CoreMsg {
    Action(AppAction),
    Internal(Box<InternalEvent>),
}

/// Everything that re-enters the actor asynchronously: decoded push events
/// and the results of awaited network calls. Processing order is arrival
/// order, which is what makes the timeline semantics deterministic.
#[derive(Debug)]
pub(crate) enum InternalEvent {
    // Real-time receive path
    ServerEvent(ServerEvent),

    // Async HTTP results
    AuthFinished {
        registering: bool,
        result: Result<AuthResponse, ApiError>,
    },
    ChatsFetched {
        result: Result<Vec<Chat>, ApiError>,
    },
    HistoryFetched {
        chat_id: String,
        result: Result<Vec<MessagePayload>, ApiError>,
    },
    RosterFetched {
        chat_id: String,
        result: Result<ChatDetail, ApiError>,
    },
    MessagePersisted {
        chat_id: String,
        message_id: String,
        result: Result<(), ApiError>,
    },
    EditPersisted {
        chat_id: String,
        message_id: String,
        result: Result<(), ApiError>,
    },
    DeletePersisted {
        chat_id: String,
        message_id: String,
        result: Result<(), ApiError>,
    },
    ChatCreated {
        result: Result<Chat, ApiError>,
    },
    ChatUpdated {
        chat_id: String,
        result: Result<Chat, ApiError>,
    },
    ChatAvatarUpdated {
        chat_id: String,
        removed: bool,
        result: Result<Chat, ApiError>,
    },
    MyAvatarUpdated {
        removed: bool,
        result: Result<UserProfile, ApiError>,
    },
    MembersAdded {
        chat_id: String,
        result: Result<Vec<Participant>, ApiError>,
    },
    InviteSent {
        chat_id: String,
        result: Result<String, ApiError>,
    },
    MemberRemoved {
        chat_id: String,
        user_id: String,
        result: Result<(), ApiError>,
    },
    ChatLeft {
        chat_id: String,
        result: Result<(), ApiError>,
    },
    ChatDeleted {
        chat_id: String,
        result: Result<(), ApiError>,
    },
}
