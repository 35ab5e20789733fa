mod helpers;

use voxbridge::infrastructure::engine::model_layout;

use voxbridge::application::ports::EngineError;

#[test]
fn given_direct_directory_when_resolving_then_identity_points_at_it() {
    let base = tempfile::tempdir().unwrap();
    let dir = helpers::write_model_dir(base.path(), "my-model");

    let identity = model_layout::resolve(base.path(), "my-model").unwrap();

    assert_eq!(identity.model_id, "my-model");
    assert_eq!(identity.directory, dir);
    assert_eq!(identity.files.tokens, dir.join("tokens.txt"));
}

#[test]
fn given_vendor_prefixed_directory_when_resolving_bare_id_then_it_is_found() {
    let base = tempfile::tempdir().unwrap();
    let dir = helpers::write_model_dir(base.path(), "sherpa-onnx-nemo-parakeet-tdt-0.6b-v2-int8");

    let identity = model_layout::resolve(base.path(), "parakeet-tdt-0.6b-v2-int8").unwrap();

    assert_eq!(identity.directory, dir);
}

#[test]
fn given_both_variants_when_detecting_files_then_int8_is_preferred() {
    let base = tempfile::tempdir().unwrap();
    let dir = helpers::write_model_dir(base.path(), "my-model");
    std::fs::write(dir.join("encoder.onnx"), b"fixture").unwrap();

    let files = model_layout::detect_model_files(&dir).unwrap();

    assert_eq!(files.encoder, dir.join("encoder.int8.onnx"));
}

#[test]
fn given_only_plain_variant_when_detecting_files_then_it_is_used() {
    let base = tempfile::tempdir().unwrap();
    let dir = helpers::write_model_dir(base.path(), "my-model");
    std::fs::remove_file(dir.join("decoder.int8.onnx")).unwrap();
    std::fs::write(dir.join("decoder.onnx"), b"fixture").unwrap();

    let files = model_layout::detect_model_files(&dir).unwrap();

    assert_eq!(files.decoder, dir.join("decoder.onnx"));
}

#[test]
fn given_missing_joiner_when_resolving_then_model_incomplete() {
    let base = tempfile::tempdir().unwrap();
    let dir = helpers::write_model_dir(base.path(), "my-model");
    std::fs::remove_file(dir.join("joiner.int8.onnx")).unwrap();

    let result = model_layout::resolve(base.path(), "my-model");

    assert!(matches!(
        result,
        Err(EngineError::ModelIncomplete { .. })
    ));
}

#[test]
fn given_directory_without_tokens_file_when_resolving_then_model_not_found() {
    let base = tempfile::tempdir().unwrap();
    let dir = helpers::write_model_dir(base.path(), "my-model");
    std::fs::remove_file(dir.join("tokens.txt")).unwrap();

    let result = model_layout::resolve(base.path(), "my-model");

    assert!(matches!(result, Err(EngineError::ModelNotFound { .. })));
}

#[test]
fn given_mixed_directories_when_listing_then_prefixes_are_stripped_and_sorted() {
    let base = tempfile::tempdir().unwrap();
    helpers::write_model_dir(base.path(), "sherpa-onnx-nemo-parakeet-tdt-0.6b-v2-int8");
    helpers::write_model_dir(base.path(), "sherpa-onnx-zipformer-en");
    helpers::write_model_dir(base.path(), "custom-model");
    // Not a model: no tokens file.
    std::fs::create_dir_all(base.path().join("checkpoints")).unwrap();

    let models = model_layout::list_models(base.path());

    let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["custom-model", "parakeet-tdt-0.6b-v2-int8", "zipformer-en"]
    );
}

#[test]
fn given_missing_base_directory_when_listing_then_empty() {
    let models = model_layout::list_models(std::path::Path::new("/nonexistent/models"));
    assert!(models.is_empty());
}
