// Application state for HTTP handlers
use crate::application::scheduler::IngestionScheduler;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: IngestionScheduler,
}
