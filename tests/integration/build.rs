use crate::common::{TestPack, installed, manual};

#[tokio::test]
async fn test_order_and_os_filter() {
    let pack = TestPack::new().unwrap();
    let a = pack.upstream_zip("a.zip", &[("a-1.0/a.sh", b"a"), ("a-1.0/doc.txt", b"d")]).unwrap();
    let b = pack.upstream_zip("b.zip", &[("b.txt", b"b")]).unwrap();
    let c = pack.upstream_zip("c.zip", &[("c.app/Contents", b"c")]).unwrap();
    pack.write_components(&format!(
        "utilities:\n{}{}{}",
        manual("B", "2", &b, "install_after: A"),
        manual("A", "1", &a, ""),
        manual("C", "3", &c, "install_after: [B]\nrequires_os: mac"),
    ))
    .unwrap();

    let report = pack.build().await.unwrap();

    assert!(!report.has_failures(), "{:?}", report.failed);
    assert_eq!(installed(&report), vec![("A", "1"), ("B", "2")]);
    assert_eq!(report.excluded.len(), 1);
    assert_eq!(report.excluded[0].0, "C");
    assert_eq!(pack.read_built("LNP/Utilities/A/a.sh").unwrap(), "a");
    assert_eq!(pack.read_built("LNP/Utilities/B/b.txt").unwrap(), "b");
    assert!(!pack.build_dir().join("LNP/Utilities/C").exists());
}

#[tokio::test]
async fn test_state_and_manifest_are_written() {
    let pack = TestPack::new().unwrap();
    let therapist = pack
        .upstream_zip(
            "therapist.zip",
            &[("DwarfTherapist/DwarfTherapist.sh", b"#!/bin/sh"), ("DwarfTherapist/README.txt", b"r")],
        )
        .unwrap();
    let init = pack.upstream_zip("init.zip", &[("init.txt", b"[SOUND:NO]")]).unwrap();
    pack.write_components(&format!(
        "files:\n{}utilities:\n{}",
        manual("Init", "0.47", &init, "extract_to: 'init.txt:df/data/init/'"),
        manual(
            "Therapist",
            "41.2",
            &therapist,
            "manifest:\n  tooltip: '  Manage labours  '\n  readme: README.txt"
        ),
    ))
    .unwrap();

    pack.build().await.unwrap();

    let lockfile = pack.lockfile().unwrap();
    let record = lockfile.get("Therapist").unwrap();
    assert_eq!(record.version, "41.2");
    assert_eq!(record.filename, "therapist.zip");
    assert!(record.checksum.as_deref().unwrap().starts_with("sha256:"));
    assert_eq!(lockfile.get("Init").unwrap().version, "0.47");

    let manifest = pack.manifest().unwrap();
    assert_eq!(manifest["Therapist"]["tooltip"], "Manage labours");
    assert_eq!(manifest["Therapist"]["readme"], "README.txt");
    assert_eq!(manifest["Therapist"]["linux_exe"], "DwarfTherapist.sh");
    assert_eq!(manifest["Therapist"]["content_version"], "41.2");
    assert!(manifest["Therapist"].get("needs_dfhack").is_none());
    assert_eq!(pack.read_built("df/data/init/init.txt").unwrap(), "[SOUND:NO]");
}

#[tokio::test]
async fn test_os_keyed_rules() {
    let pack = TestPack::new().unwrap();
    let url = pack.upstream_zip("launcher.zip", &[("launch.exe", b"w"), ("launch.sh", b"l")]).unwrap();
    pack.write_components(&format!(
        "files:\n{}",
        manual(
            "Launcher",
            "1",
            &url,
            "extract_to:\n  os-win: 'launch.exe:bin/'\n  os-linux: 'launch.sh:bin/'"
        ),
    ))
    .unwrap();

    pack.build().await.unwrap();

    assert!(pack.build_dir().join("bin/launch.sh").is_file());
    assert!(!pack.build_dir().join("bin/launch.exe").exists());
}

#[tokio::test]
async fn test_bits_variant_block() {
    let pack = TestPack::new().unwrap();
    let v32 = pack.upstream_zip("t32.zip", &[("t32.sh", b"32")]).unwrap();
    let v64 = pack.upstream_zip("t64.zip", &[("t64.sh", b"64")]).unwrap();
    pack.write_components(&format!(
        "utilities:\n{}",
        manual("Tool", "1", &v32, &format!("64bit:\n  dl_link: '{v64}'\n  version: '1-x64'")),
    ))
    .unwrap();

    let report = pack.build().await.unwrap();

    assert_eq!(installed(&report), vec![("Tool", "1-x64")]);
    assert_eq!(pack.read_built("LNP/Utilities/Tool/t64.sh").unwrap(), "64");
}
