use std::sync::Arc;

use crate::application::ports::SpeechEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn SpeechEngine>,
}
