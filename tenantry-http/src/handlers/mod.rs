use std::sync::Arc;
use tenantry::{EngineHooks, EngineManager};

pub mod engine;
pub mod health;

pub struct AppState {
    pub engine: Arc<EngineManager<Arc<dyn EngineHooks>>>,
}

impl AppState {
    pub fn plugin_name(&self) -> &str {
        self.engine.plugin_name()
    }
}

pub use engine::{create_engine, delete_engine, engine_exists, list_engines, update_engine};
pub use health::health;
