use crate::common::{TestPack, manual};
use packwright::cli::common::TargetArgs;
use packwright::installer::UpdatedComponent;

fn write_pair(pack: &TestPack, b_version: &str, b_url: &str, a_url: &str) {
    pack.write_components(&format!(
        "utilities:\n{}{}",
        manual("A", "1", a_url, ""),
        manual("B", b_version, b_url, ""),
    ))
    .unwrap();
}

#[tokio::test]
async fn test_second_build_changes_nothing() {
    let pack = TestPack::new().unwrap();
    let a = pack.upstream_zip("a.zip", &[("a.sh", b"a"), ("a.txt", b"t")]).unwrap();
    let b = pack.upstream_zip("b.zip", &[("b.sh", b"b"), ("b.txt", b"t")]).unwrap();
    write_pair(&pack, "2", &b, &a);

    pack.build().await.unwrap();
    let first = pack.lockfile().unwrap();
    let report = pack.build().await.unwrap();

    assert_eq!(report.skipped, vec!["A", "B"]);
    assert!(report.installed.is_empty());
    assert!(report.updated.is_empty());
    assert_eq!(pack.lockfile().unwrap(), first);
}

#[tokio::test]
async fn test_version_bump_updates_only_that_component() {
    let pack = TestPack::new().unwrap();
    let a = pack.upstream_zip("a.zip", &[("a.sh", b"a"), ("a.txt", b"t")]).unwrap();
    let b2 = pack.upstream_zip("b2.zip", &[("b.sh", b"old"), ("b.txt", b"t")]).unwrap();
    write_pair(&pack, "2", &b2, &a);
    pack.build().await.unwrap();

    let b3 = pack.upstream_zip("b3.zip", &[("b.sh", b"new"), ("b.txt", b"t")]).unwrap();
    write_pair(&pack, "3", &b3, &a);
    let report = pack.build().await.unwrap();

    assert_eq!(report.skipped, vec!["A"]);
    assert_eq!(
        report.updated,
        vec![UpdatedComponent {
            name: "B".to_string(),
            from: "2".to_string(),
            to: "3".to_string(),
        }]
    );
    assert_eq!(pack.read_built("LNP/Utilities/B/b.sh").unwrap(), "new");
    let lockfile = pack.lockfile().unwrap();
    assert_eq!(lockfile.get("B").unwrap().version, "3");
    assert_eq!(lockfile.get("B").unwrap().filename, "b3.zip");
    assert_eq!(pack.manifest().unwrap()["B"]["content_version"], "3");
}

#[tokio::test]
async fn test_force_reinstalls_everything() {
    let pack = TestPack::new().unwrap();
    let a = pack.upstream_zip("a.zip", &[("a.sh", b"a"), ("a.txt", b"t")]).unwrap();
    let b = pack.upstream_zip("b.zip", &[("b.sh", b"b"), ("b.txt", b"t")]).unwrap();
    write_pair(&pack, "2", &b, &a);
    pack.build().await.unwrap();
    std::fs::remove_file(pack.build_dir().join("LNP/Utilities/A/a.sh")).unwrap();

    let report = pack.build_with(&TargetArgs::default(), true).await.unwrap();

    assert!(report.skipped.is_empty());
    let names: Vec<&str> = report.updated.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);
    assert!(report.updated.iter().all(|u| u.from == u.to));
    assert_eq!(pack.read_built("LNP/Utilities/A/a.sh").unwrap(), "a");
}
