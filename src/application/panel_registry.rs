// Panel registry - one control panel per speaker
use crate::application::control_gateway::ControlGateway;
use crate::application::control_panel::{ControlPanel, PanelError, PanelSettings};
use crate::application::session_store::SessionStore;
use crate::domain::session::parse_speaker_id;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct PanelRegistry {
    gateway: Arc<dyn ControlGateway>,
    store: Arc<dyn SessionStore>,
    settings: Arc<PanelSettings>,
    panels: Arc<Mutex<HashMap<u64, ControlPanel>>>,
}

impl PanelRegistry {
    pub fn new(
        gateway: Arc<dyn ControlGateway>,
        store: Arc<dyn SessionStore>,
        settings: PanelSettings,
    ) -> Self {
        Self {
            gateway,
            store,
            settings: Arc::new(settings),
            panels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn settings(&self) -> &PanelSettings {
        &self.settings
    }

    /// Panel for the speaker named by `raw_id`, created and status-checked on first open.
    pub async fn open(&self, raw_id: &str) -> Result<ControlPanel, PanelError> {
        let speaker_id = parse_speaker_id(raw_id)
            .ok_or_else(|| PanelError::InvalidSpeakerId(raw_id.to_string()))?;

        let (panel, created) = {
            let mut panels = self.panels.lock().await;
            match panels.get(&speaker_id) {
                Some(panel) => (panel.clone(), false),
                None => {
                    let panel = ControlPanel::new(
                        speaker_id,
                        self.gateway.clone(),
                        self.store.clone(),
                        self.settings.clone(),
                    );
                    panels.insert(speaker_id, panel.clone());
                    (panel, true)
                }
            }
        };

        if created {
            tracing::info!(speaker_id, "opened control panel");
            panel.check_initial_status().await;
        }
        Ok(panel)
    }

    /// Tear down and forget a panel. Returns whether one was open.
    pub async fn close(&self, raw_id: &str) -> Result<bool, PanelError> {
        let speaker_id = parse_speaker_id(raw_id)
            .ok_or_else(|| PanelError::InvalidSpeakerId(raw_id.to_string()))?;

        let removed = self.panels.lock().await.remove(&speaker_id);
        match removed {
            Some(panel) => {
                panel.teardown().await;
                tracing::info!(speaker_id, "closed control panel");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn shutdown(&self) {
        let panels: Vec<ControlPanel> = self.panels.lock().await.drain().map(|(_, p)| p).collect();
        for panel in panels {
            panel.teardown().await;
        }
    }
}
