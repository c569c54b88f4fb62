use std::sync::Arc;

use shelfscan_core::Intake;

#[derive(Clone)]
pub struct AppState {
    intake: Arc<Intake>,
}

impl AppState {
    pub fn new(intake: Intake) -> Self {
        Self {
            intake: Arc::new(intake),
        }
    }

    pub fn intake(&self) -> &Intake {
        &self.intake
    }
}
