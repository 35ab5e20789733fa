pub mod model_layout;
pub mod supervisor;
pub mod wire;

mod engine_factory;
mod managed_engine;
mod offline_cli_engine;

pub use engine_factory::{EngineAdapterKind, EngineFactory};
pub use managed_engine::{ManagedEngineConfig, ManagedSocketEngine};
pub use offline_cli_engine::{parse_cli_output, OfflineCliConfig, OfflineCliEngine};
