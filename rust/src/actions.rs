#[derive(Debug, Clone)]
pub enum AppAction {
    // Auth
    Register {
        name: String,
        email: String,
        password: String,
    },
    Login {
        email: String,
        password: String,
    },
    Logout,

    // Directory
    RefreshChats,
    CreateGroup {
        name: String,
        member_emails: Vec<String>,
    },
    UpdateChat {
        chat_id: String,
        name: Option<String>,
        description: Option<String>,
    },
    SetChatAvatar {
        chat_id: String,
        data_base64: String,
        mime_type: String,
    },
    RemoveChatAvatar {
        chat_id: String,
    },

    // Active chat
    OpenChat {
        chat_id: String,
    },
    CloseChat,
    SendMessage {
        chat_id: String,
        content: String,
    },
    EditMessage {
        chat_id: String,
        message_id: String,
        content: String,
    },
    DeleteMessage {
        chat_id: String,
        message_id: String,
    },
    SendMedia {
        chat_id: String,
        data_base64: String,
        mime_type: String,
        file_name: String,
    },

    // Membership
    AddMembers {
        chat_id: String,
        emails: Vec<String>,
    },
    InviteUser {
        chat_id: String,
        email: String,
    },
    RemoveMember {
        chat_id: String,
        user_id: String,
    },
    LeaveChat {
        chat_id: String,
    },
    DeleteChat {
        chat_id: String,
    },

    // Profile
    SetMyAvatar {
        data_base64: String,
        mime_type: String,
    },
    RemoveMyAvatar,

    // UI
    ClearToast,
}

impl AppAction {
    /// Log-safe action tag (never includes credentials or message payloads).
    pub fn tag(&self) -> &'static str {
        match self {
            // Auth
            AppAction::Register { .. } => "Register",
            AppAction::Login { .. } => "Login",
            AppAction::Logout => "Logout",

            // Directory
            AppAction::RefreshChats => "RefreshChats",
            AppAction::CreateGroup { .. } => "CreateGroup",
            AppAction::UpdateChat { .. } => "UpdateChat",
            AppAction::SetChatAvatar { .. } => "SetChatAvatar",
            AppAction::RemoveChatAvatar { .. } => "RemoveChatAvatar",

            // Active chat
            AppAction::OpenChat { .. } => "OpenChat",
            AppAction::CloseChat => "CloseChat",
            AppAction::SendMessage { .. } => "SendMessage",
            AppAction::EditMessage { .. } => "EditMessage",
            AppAction::DeleteMessage { .. } => "DeleteMessage",
            AppAction::SendMedia { .. } => "SendMedia",

            // Membership
            AppAction::AddMembers { .. } => "AddMembers",
            AppAction::InviteUser { .. } => "InviteUser",
            AppAction::RemoveMember { .. } => "RemoveMember",
            AppAction::LeaveChat { .. } => "LeaveChat",
            AppAction::DeleteChat { .. } => "DeleteChat",

            // Profile
            AppAction::SetMyAvatar { .. } => "SetMyAvatar",
            AppAction::RemoveMyAvatar => "RemoveMyAvatar",

            // UI
            AppAction::ClearToast => "ClearToast",
        }
    }
}
