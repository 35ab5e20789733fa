use std::path::{Path, PathBuf};

use crate::application::ports::EngineError;
use crate::domain::{AvailableModel, ModelFiles, ModelIdentity};

/// Every valid model directory must carry a vocabulary file.
pub const TOKENS_FILE: &str = "tokens.txt";

/// Vendor prefixes stripped from directory names to produce clean model ids.
const DIR_PREFIXES: [&str; 2] = ["sherpa-onnx-nemo-", "sherpa-onnx-"];

/// Known model ids and the upstream directory name they ship under.
const KNOWN_MODEL_DIRS: [(&str, &str); 2] = [
    (
        "parakeet-tdt-0.6b-v2-int8",
        "sherpa-onnx-nemo-parakeet-tdt-0.6b-v2-int8",
    ),
    (
        "parakeet-tdt-0.6b-v3-int8",
        "sherpa-onnx-nemo-parakeet-tdt-0.6b-v3-int8",
    ),
];

/// Locate the directory holding a model's files.
///
/// Tries `{base}/{model_id}/`, `{base}/sherpa-onnx-nemo-{model_id}/`, then
/// the registered directory alias for known model ids. A candidate is valid
/// only if it contains the vocabulary file.
pub fn find_model_dir(base_dir: &Path, model_id: &str) -> Option<PathBuf> {
    let direct = base_dir.join(model_id);
    if direct.join(TOKENS_FILE).is_file() {
        return Some(direct);
    }

    let prefixed = base_dir.join(format!("sherpa-onnx-nemo-{model_id}"));
    if prefixed.join(TOKENS_FILE).is_file() {
        return Some(prefixed);
    }

    if let Some((_, dir_name)) = KNOWN_MODEL_DIRS.iter().find(|(id, _)| *id == model_id) {
        let aliased = base_dir.join(dir_name);
        if aliased.join(TOKENS_FILE).is_file() {
            return Some(aliased);
        }
    }

    None
}

/// Detect encoder, decoder, joiner and tokens files in a model directory,
/// preferring the int8-quantized variant of each component when present.
pub fn detect_model_files(model_dir: &Path) -> Result<ModelFiles, String> {
    let tokens = model_dir.join(TOKENS_FILE);
    if !tokens.is_file() {
        return Err(format!("{TOKENS_FILE} not found in {}", model_dir.display()));
    }

    let component = |name: &str| -> Result<PathBuf, String> {
        let int8 = model_dir.join(format!("{name}.int8.onnx"));
        if int8.is_file() {
            return Ok(int8);
        }
        let plain = model_dir.join(format!("{name}.onnx"));
        if plain.is_file() {
            Ok(plain)
        } else {
            Err(format!("{name}.onnx not found in {}", model_dir.display()))
        }
    };

    Ok(ModelFiles {
        encoder: component("encoder")?,
        decoder: component("decoder")?,
        joiner: component("joiner")?,
        tokens,
    })
}

/// Resolve a model id to its on-disk identity, or fail with the port-level
/// not-found / incomplete errors.
pub fn resolve(base_dir: &Path, model_id: &str) -> Result<ModelIdentity, EngineError> {
    let directory = find_model_dir(base_dir, model_id).ok_or_else(|| EngineError::ModelNotFound {
        model_id: model_id.to_string(),
        base_dir: base_dir.display().to_string(),
    })?;

    let files = detect_model_files(&directory).map_err(|detail| EngineError::ModelIncomplete {
        model_id: model_id.to_string(),
        detail,
    })?;

    Ok(ModelIdentity {
        model_id: model_id.to_string(),
        directory,
        files,
    })
}

/// Scan the base directory for loadable models. A subdirectory qualifies if
/// it contains the vocabulary file; vendor prefixes are stripped from the
/// reported id. Sorted by directory name.
pub fn list_models(base_dir: &Path) -> Vec<AvailableModel> {
    let mut available = Vec::new();

    let entries = match std::fs::read_dir(base_dir) {
        Ok(entries) => entries,
        Err(_) => return available,
    };

    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir() && p.join(TOKENS_FILE).is_file())
        .collect();
    dirs.sort();

    for dir in dirs {
        let Some(dir_name) = dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let id = DIR_PREFIXES
            .iter()
            .find_map(|prefix| dir_name.strip_prefix(prefix))
            .unwrap_or(dir_name);
        available.push(AvailableModel {
            id: id.to_string(),
            directory: dir.display().to_string(),
        });
    }

    available
}
