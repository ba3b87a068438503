use std::{fmt, sync::Arc};

use kiosk_config::DisplaySettings;
use kiosk_core::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    /// Configured display defaults; requests override a copy.
    pub display: Arc<DisplaySettings>,
    /// Upper bound on history entries echoed back to clients.
    pub history_max: usize,
}

impl AppState {
    pub fn new(
        orchestrator: Orchestrator,
        display: DisplaySettings,
        history_max: usize,
    ) -> Self {
        Self {
            orchestrator,
            display: Arc::new(display),
            history_max,
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("history_max", &self.history_max)
            .finish_non_exhaustive()
    }
}
