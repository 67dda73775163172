// Session storage seeded from configuration
use crate::application::session_store::{SessionStore, USER_ID_KEY};
use crate::infrastructure::config::SessionSettings;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct SettingsSessionStore {
    values: HashMap<String, String>,
}

impl SettingsSessionStore {
    pub fn from_settings(settings: &SessionSettings) -> Self {
        let mut values = HashMap::new();
        values.insert(USER_ID_KEY.to_string(), settings.user_id.to_string());
        Self { values }
    }
}

impl SessionStore for SettingsSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}
