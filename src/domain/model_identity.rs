use std::path::PathBuf;

/// Resolved component files for a transducer model directory.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub encoder: PathBuf,
    pub decoder: PathBuf,
    pub joiner: PathBuf,
    pub tokens: PathBuf,
}

/// Identity of the currently loaded model. Created on a successful
/// `load_model`, replaced wholesale on a model switch, cleared on unload.
#[derive(Debug, Clone)]
pub struct ModelIdentity {
    pub model_id: String,
    pub directory: PathBuf,
    pub files: ModelFiles,
}

/// A model that can be loaded, as reported by `list_available`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AvailableModel {
    pub id: String,
    pub directory: String,
}
