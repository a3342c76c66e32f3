use crate::common::{TestPack, installed};
use mockito::{Matcher, Server};
use packwright::planner::Action;
use packwright::test_utils::write_zip;
use serde_json::json;

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("a.zip");
    write_zip(&path, entries).unwrap();
    std::fs::read(path).unwrap()
}

fn components() -> &'static str {
    r"
utilities:
  Tool:
    bay12: 10
    ident: owner/tool
  Lib:
    bay12: 11
    ident: 42
    extract_to: 'lib.so:hack/'
graphics:
  Tiles:
    bay12: 12
    ident: owner/tiles
"
}

#[tokio::test]
async fn test_build_through_host_apis() {
    let mut server = Server::new_async().await;
    let url = server.url();

    let release = server
        .mock("GET", "/repos/owner/tool/releases/latest")
        .with_body(
            json!({
                "tag_name": "v2.0",
                "published_at": "2021-03-28T12:00:00Z",
                "zipball_url": format!("{url}/zip/tool"),
                "assets": [
                    {"browser_download_url": format!("{url}/dl/tool-win64.zip")},
                    {"browser_download_url": format!("{url}/dl/tool-linux64.zip")},
                ],
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let asset = server
        .mock("GET", "/dl/tool-linux64.zip")
        .with_body(zip_bytes(&[("tool/tool.sh", b"t"), ("tool/tool.cfg", b"c")]))
        .expect(1)
        .create_async()
        .await;
    let file_data = server
        .mock("GET", "/file_data/42.json")
        .with_body(json!({"version": "2.1", "updated_timestamp": 1_600_000_000, "filename": "lib.zip"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let dffd_download = server
        .mock("GET", "/download.php")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("id".into(), "42".into()),
            Matcher::UrlEncoded("f".into(), "b".into()),
        ]))
        .with_body(zip_bytes(&[("lib.so", b"l")]))
        .expect(1)
        .create_async()
        .await;
    let tiles_release = server
        .mock("GET", "/repos/owner/tiles/releases/latest")
        .with_body(
            json!({
                "tag_name": "1.4",
                "published_at": "2020-12-01T00:00:00Z",
                "zipball_url": format!("{url}/zip/tiles"),
                "assets": [],
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let zipball = server
        .mock("GET", "/zip/tiles")
        .with_body(zip_bytes(&[("owner-tiles-abc123/raw/a.png", b"a"), ("owner-tiles-abc123/data/b.txt", b"b")]))
        .expect(1)
        .create_async()
        .await;

    let pack = TestPack::with_endpoints(&url).unwrap();
    pack.write_components(components()).unwrap();

    let report = pack.build().await.unwrap();
    assert!(!report.has_failures(), "{:?}", report.failed);
    assert_eq!(installed(&report), vec![("Tool", "v2.0"), ("Lib", "2.1"), ("Tiles", "1.4")]);
    assert_eq!(pack.read_built("LNP/Utilities/Tool/tool.sh").unwrap(), "t");
    assert_eq!(pack.read_built("hack/lib.so").unwrap(), "l");
    assert_eq!(pack.read_built("LNP/Graphics/Tiles/raw/a.png").unwrap(), "a");
    assert!(pack.cache_dir().join("metadata.json").is_file());
    assert_eq!(pack.lockfile().unwrap().get("Tiles").unwrap().filename, "owner_tiles_1.4.zip");

    // Fresh metadata and recorded versions: no API call, no download.
    let rebuilt = pack.build().await.unwrap();
    assert_eq!(rebuilt.skipped, vec!["Tool", "Lib", "Tiles"]);

    for mock in [release, asset, file_data, dffd_download, tiles_release, zipball] {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_host_outage_only_fails_its_components() {
    let mut server = Server::new_async().await;
    let url = server.url();
    let _missing = server
        .mock("GET", "/repos/owner/tool/releases/latest")
        .with_status(404)
        .create_async()
        .await;
    let _file_data = server
        .mock("GET", "/file_data/42.json")
        .with_body(json!({"version": "2.1", "updated_timestamp": 1_600_000_000}).to_string())
        .create_async()
        .await;
    let _download = server
        .mock("GET", "/download.php")
        .match_query(Matcher::Any)
        .with_body(zip_bytes(&[("lib.so", b"l")]))
        .create_async()
        .await;
    let _tiles = server
        .mock("GET", "/repos/owner/tiles/releases/latest")
        .with_body(
            json!({"tag_name": "1.4", "published_at": "2020-12-01T00:00:00Z", "zipball_url": format!("{url}/zip/tiles"), "assets": []})
                .to_string(),
        )
        .create_async()
        .await;
    let _zipball = server.mock("GET", "/zip/tiles").with_status(404).create_async().await;

    let pack = TestPack::with_endpoints(&url).unwrap();
    pack.write_components(components()).unwrap();

    let project = pack.project(&Default::default()).unwrap();
    let plan = project
        .pipeline(false, false)
        .unwrap()
        .plan(&project.registry, &packwright::lockfile::InMemoryState::new())
        .await
        .unwrap();
    assert_eq!(plan.get("Tool").unwrap().action, Action::Failed);
    assert_eq!(plan.get("Lib").unwrap().action, Action::Install);

    let report = pack.build().await.unwrap();
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.failure("Tool").unwrap().stage, packwright::installer::Stage::Resolve);
    assert_eq!(report.failure("Tiles").unwrap().stage, packwright::installer::Stage::Download);
    assert_eq!(installed(&report), vec![("Lib", "2.1")]);

    let leftovers: Vec<_> = walkdir::WalkDir::new(pack.cache_dir().join("artifacts"))
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(".partial-"))
        .collect();
    assert!(leftovers.is_empty());
    assert!(pack.lockfile().unwrap().get("Tiles").is_none());
}
