//! Manifest materialization through the configured scratch directory.

use ringside::backup::INCREMENTAL_STEM;
use ringside::{ManifestError, ManifestMaterializer, YamlLoader};
use serde::Serialize;
use std::fs;

#[derive(Serialize)]
struct Entry {
    file: &'static str,
    size: u64,
}

fn materializer_from_config(dir: &std::path::Path) -> ManifestMaterializer {
    let yaml = format!(
        r#"
process_name: cassandra
ring_name: ring
racs: [us-east-1a]
acl_group_name: acl
dc: us-east-1
backup:
  tmp_dir: {}
"#,
        dir.display()
    );
    let config = YamlLoader::parse(&yaml).unwrap();
    ManifestMaterializer::new(config.backup.tmp_dir())
}

#[test]
fn test_snapshot_then_incremental_manifests() {
    let dir = tempfile::tempdir().unwrap();
    let materializer = materializer_from_config(dir.path());

    let snapshot = materializer.finalize(Some("201901011200")).unwrap();
    let incremental = materializer
        .finalize_with(
            None,
            &[Entry {
                file: "nb-1-big-Data.db",
                size: 1024,
            }],
        )
        .unwrap();

    assert_eq!(snapshot, dir.path().join("201901011200.json"));
    assert_eq!(
        incremental,
        dir.path().join(format!("{INCREMENTAL_STEM}.json"))
    );
    assert_eq!(fs::read_to_string(&snapshot).unwrap(), "[]");

    let body: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&incremental).unwrap()).unwrap();
    assert_eq!(body[0]["file"], "nb-1-big-Data.db");
    assert_eq!(body[0]["size"], 1024);
}

#[test]
fn test_repeated_incremental_replaces_previous() {
    let dir = tempfile::tempdir().unwrap();
    let materializer = materializer_from_config(dir.path());

    materializer
        .finalize_with(None, &[Entry { file: "a", size: 1 }])
        .unwrap();
    let path = materializer.finalize(None).unwrap();

    assert_eq!(fs::read_to_string(path).unwrap(), "[]");
    let names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec![format!("{INCREMENTAL_STEM}.json")]);
}

#[test]
fn test_path_like_identifier_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let materializer = materializer_from_config(dir.path());

    let err = materializer.finalize(Some("../escape")).unwrap_err();

    assert!(matches!(err, ManifestError::InvalidIdentifier(_)));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_missing_directory_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let materializer = ManifestMaterializer::new(dir.path().join("absent"));

    let err = materializer.finalize(None).unwrap_err();
    assert!(matches!(err, ManifestError::Io { .. }));
}
