mod engine_state;
mod health;
mod model_identity;

pub use engine_state::EngineState;
pub use health::{HealthMetrics, HealthSnapshot};
pub use model_identity::{AvailableModel, ModelFiles, ModelIdentity};
