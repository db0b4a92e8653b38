use crate::application::runs::RunManager;

pub struct ServerState {
    runs: RunManager,
}

impl ServerState {
    pub fn new(runs: RunManager) -> Self {
        Self { runs }
    }

    pub fn runs(&self) -> &RunManager {
        &self.runs
    }
}
