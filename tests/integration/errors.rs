use crate::common::{TestPack, installed, manual};
use packwright::core::{ConfigError, ExtractionError};
use packwright::installer::Stage;

#[tokio::test]
async fn test_cycle_aborts_before_any_download() {
    let pack = TestPack::new().unwrap();
    let a = pack.upstream_zip("a.zip", &[("a.sh", b"a")]).unwrap();
    let b = pack.upstream_zip("b.zip", &[("b.sh", b"b")]).unwrap();
    pack.write_components(&format!(
        "utilities:\n{}{}",
        manual("A", "1", &a, "install_after: B"),
        manual("B", "1", &b, "install_after: A"),
    ))
    .unwrap();

    let err = pack.build().await.unwrap_err();

    match err.downcast_ref::<ConfigError>() {
        Some(ConfigError::Cycle {
            members,
        }) => {
            assert!(members.contains(&"A".to_string()));
            assert!(members.contains(&"B".to_string()));
        }
        other => panic!("expected a cycle error, got {other:?}"),
    }
    assert!(!pack.cache_dir().join("artifacts").exists());
    assert!(!pack.build_dir().exists());
}

#[tokio::test]
async fn test_dangling_install_after_suggests_a_name() {
    let pack = TestPack::new().unwrap();
    let a = pack.upstream_zip("a.zip", &[("a.sh", b"a")]).unwrap();
    let b = pack.upstream_zip("b.zip", &[("b.sh", b"b")]).unwrap();
    pack.write_components(&format!(
        "utilities:\n{}{}",
        manual("Therapist", "1", &a, ""),
        manual("Launcher", "1", &b, "install_after: Therapst"),
    ))
    .unwrap();

    let err = pack.build().await.unwrap_err();

    match err.downcast_ref::<ConfigError>() {
        Some(ConfigError::DanglingReference {
            component,
            missing,
            suggestion,
        }) => {
            assert_eq!(component, "Launcher");
            assert_eq!(missing, "Therapst");
            assert_eq!(suggestion.as_deref(), Some("Therapist"));
        }
        other => panic!("expected a dangling reference, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unsupported_archive_fails_only_that_component() {
    let pack = TestPack::new().unwrap();
    std::fs::create_dir_all(pack.path().join("upstream")).unwrap();
    let seven = pack.path().join("upstream/tool.7z");
    std::fs::write(&seven, b"7z\xbc\xaf\x27\x1c rest").unwrap();
    let good = pack.upstream_zip("good.zip", &[("good.sh", b"g"), ("good.txt", b"t")]).unwrap();
    pack.write_components(&format!(
        "utilities:\n{}{}",
        manual("Seven", "1", &format!("file://{}", seven.display()), ""),
        manual("Good", "1", &good, ""),
    ))
    .unwrap();

    let report = pack.build().await.unwrap();

    assert_eq!(report.exit_code(), 1);
    let failed = report.failure("Seven").unwrap();
    assert_eq!(failed.stage, Stage::Extract);
    assert!(failed.reason.contains("tool.7z"));
    assert_eq!(installed(&report), vec![("Good", "1")]);
    assert!(pack.lockfile().unwrap().get("Seven").is_none());
    assert!(!pack.build_dir().join("LNP/Utilities/Seven").exists());
}

#[tokio::test]
async fn test_missing_components_file() {
    let pack = TestPack::new().unwrap();

    let err = pack.build().await.unwrap_err();

    assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::NotFound { .. })));
}

#[test]
fn test_extraction_error_names_the_file() {
    let err = ExtractionError::UnsupportedFormat {
        file: "tool.7z".to_string(),
    };
    assert_eq!(err.to_string(), "Unsupported archive format: tool.7z");
}
