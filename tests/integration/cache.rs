use crate::common::{TestPack, manual};
use packwright::cache::ArtifactCache;
use packwright::cli::common::TargetArgs;
use packwright::utils::http::{HttpClient, RetryPolicy};

fn cache(pack: &TestPack) -> ArtifactCache {
    ArtifactCache::new(pack.cache_dir(), HttpClient::new(None, RetryPolicy::fast()).unwrap())
}

#[tokio::test]
async fn test_forced_rebuild_reuses_cached_artifacts() {
    let pack = TestPack::new().unwrap();
    let a = pack.upstream_zip("a.zip", &[("a.sh", b"a"), ("a.txt", b"t")]).unwrap();
    pack.write_components(&format!("utilities:\n{}", manual("A", "1", &a, ""))).unwrap();
    pack.build().await.unwrap();

    std::fs::remove_dir_all(pack.path().join("upstream")).unwrap();
    std::fs::remove_dir_all(pack.build_dir()).unwrap();
    let report = pack.build_with(&TargetArgs::default(), true).await.unwrap();

    assert!(!report.has_failures(), "{:?}", report.failed);
    assert_eq!(report.updated.len(), 1);
    assert_eq!(pack.read_built("LNP/Utilities/A/a.sh").unwrap(), "a");
    assert!(cache(&pack).artifact_path("A", "1", "a.zip").is_file());
}

#[tokio::test]
async fn test_clean_drops_unreferenced_versions() {
    let pack = TestPack::new().unwrap();
    let a = pack.upstream_zip("a.zip", &[("a.sh", b"a"), ("a.txt", b"t")]).unwrap();
    let old = pack.upstream_zip("b1.zip", &[("b.sh", b"1"), ("b.txt", b"t")]).unwrap();
    pack.write_components(&format!("utilities:\n{}{}", manual("A", "1", &a, ""), manual("B", "1", &old, "")))
        .unwrap();
    pack.build().await.unwrap();
    let new = pack.upstream_zip("b2.zip", &[("b.sh", b"2"), ("b.txt", b"t")]).unwrap();
    pack.write_components(&format!("utilities:\n{}{}", manual("A", "1", &a, ""), manual("B", "2", &new, "")))
        .unwrap();
    pack.build().await.unwrap();

    let cache = cache(&pack);
    assert!(cache.artifact_path("B", "1", "b1.zip").is_file());
    let before = cache.size().await.unwrap();

    let lockfile = pack.lockfile().unwrap();
    let removed = cache.clean(&lockfile.referenced_versions()).await.unwrap();

    assert_eq!(removed, 1);
    assert!(!cache.artifact_path("B", "1", "b1.zip").exists());
    assert!(cache.artifact_path("B", "2", "b2.zip").is_file());
    assert!(cache.artifact_path("A", "1", "a.zip").is_file());
    assert!(cache.size().await.unwrap() < before);
}
