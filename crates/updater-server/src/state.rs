use std::sync::Arc;
use updater_core::Pipeline;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub hmac_secret: Arc<Vec<u8>>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, hmac_secret: Vec<u8>) -> Self {
        Self {
            pipeline,
            hmac_secret: Arc::new(hmac_secret),
        }
    }
}
