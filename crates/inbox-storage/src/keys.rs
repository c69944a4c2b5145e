//! Storage key constants.

/// Storage keys used by the client
pub struct StorageKeys;

impl StorageKeys {
    /// Session token used to authorize API calls and the realtime connection
    pub const SESSION_TOKEN: &'static str = "session_token";

    /// Identifier of the principal the session token belongs to
    pub const SESSION_USER_ID: &'static str = "session_user_id";

    /// Optional email of the principal
    pub const SESSION_EMAIL: &'static str = "session_email";
}
