use fb_core::{ConfigProvider, ContentStore};
use fb_scheduler::{DigestPipeline, Scheduler};
use std::sync::Arc;

pub struct AppState {
    pub pipeline: Arc<DigestPipeline>,
    pub scheduler: Arc<Scheduler>,
    pub config: Arc<dyn ConfigProvider>,
    pub store: Arc<dyn ContentStore>,
}
