mod health;
mod models;
mod transcriptions;

pub use health::health_handler;
pub use models::{models_handler, switch_model_handler};
pub use transcriptions::transcriptions_handler;
