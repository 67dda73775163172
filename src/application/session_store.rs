// Read-only view of the operator's session storage

pub const USER_ID_KEY: &str = "userId";
pub const DEFAULT_USER_ID: u64 = 1;

/// Key-value store holding the identity of the logged-in operator.
///
/// Owned by whoever authenticates the operator; control panels only read from it.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn user_id(&self) -> u64 {
        self.get(USER_ID_KEY)
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(DEFAULT_USER_ID)
    }
}
