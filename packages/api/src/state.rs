// ABOUTME: Shared handler state
// ABOUTME: Holds the staging store, the orchestrator and the public base URL workers fetch scripts from

use std::sync::Arc;
use url::Url;

use evald_sandbox::Orchestrator;
use evald_staging::{ScriptId, ScriptStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ScriptStore>,
    pub orchestrator: Arc<Orchestrator>,
    /// Base URL with a trailing slash so relative joins keep its path
    pub public_url: Url,
    pub max_code_bytes: usize,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ScriptStore>,
        orchestrator: Arc<Orchestrator>,
        mut public_url: Url,
        max_code_bytes: usize,
    ) -> Self {
        if !public_url.path().ends_with('/') {
            let path = format!("{}/", public_url.path());
            public_url.set_path(&path);
        }

        Self {
            store,
            orchestrator,
            public_url,
            max_code_bytes,
        }
    }

    /// Location a worker retrieves the staged script from
    pub fn script_url(&self, id: &ScriptId) -> Result<Url, url::ParseError> {
        self.public_url.join(&format!("scripts/{}", id))
    }
}
