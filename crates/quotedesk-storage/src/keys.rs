//! Storage key constants.

/// Storage keys used by the client.
///
/// The names are part of the persistence contract with other quotedesk
/// front-ends reading the same store, so they stay camelCase.
pub struct StorageKeys;

impl StorageKeys {
    /// Access token for authorized API calls
    pub const ACCESS_TOKEN: &'static str = "accessToken";

    /// Refresh token used to mint a new access token
    pub const REFRESH_TOKEN: &'static str = "refreshToken";

    /// User profile snapshot (JSON)
    pub const USER: &'static str = "user";

    /// UI preference map (JSON); survives logout
    pub const PREFERENCES: &'static str = "preferences";
}
