mod settings;

pub use settings::{EngineSettings, ServerSettings, Settings, SettingsError};
