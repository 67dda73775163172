// Application state for HTTP handlers
use crate::application::panel_registry::PanelRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: PanelRegistry,
}
