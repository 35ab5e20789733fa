mod speech_engine;

pub use speech_engine::{EngineError, EngineStatus, SpeechEngine};
