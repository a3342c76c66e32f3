use crate::common::{TestPack, installed, manual};
use packwright::cli::common::TargetArgs;

fn write_dfhack_pack(pack: &TestPack) {
    let dfhack = pack
        .upstream_zip("dfhack.zip", &[("hack/ruby.rb", b"r"), ("dfhack.init", b"i")])
        .unwrap();
    let stonesense = pack.upstream_zip("stonesense.zip", &[("stonesense.plug.so", b"s")]).unwrap();
    let twbt = pack
        .upstream_zip("twbt.zip", &[("twbt/twbt.plug.so", b"t"), ("twbt/readme.md", b"m")])
        .unwrap();
    pack.append_settings("\n[roots]\ndf = \"df\"\n").unwrap();
    pack.write_components(&format!(
        "files:\n{}utilities:\n{}{}",
        manual("DFHack", "0.47.05-r1", &dfhack, "extract_to: '{{ roots.df }}/'"),
        manual(
            "Stonesense",
            "5",
            &stonesense,
            "needs_dfhack: true\nextract_to: 'stonesense.plug.so:df/hack/plugins/{DFHACK_VER}/'"
        ),
        manual(
            "TWBT",
            "6.61",
            &twbt,
            "needs_dfhack: true\nextract_to: 'twbt.plug.so:df/hack/plugins/{{ versions[\"DFHack\"] }}/'"
        ),
    ))
    .unwrap();
}

#[tokio::test]
async fn test_plugins_land_under_dfhack_version() {
    let pack = TestPack::new().unwrap();
    write_dfhack_pack(&pack);

    let report = pack.build().await.unwrap();

    assert!(!report.has_failures(), "{:?}", report.failed);
    assert_eq!(
        installed(&report),
        vec![("DFHack", "0.47.05-r1"), ("Stonesense", "5"), ("TWBT", "6.61")]
    );
    assert_eq!(pack.read_built("df/dfhack.init").unwrap(), "i");
    assert_eq!(pack.read_built("df/hack/plugins/0.47.05-r1/stonesense.plug.so").unwrap(), "s");
    assert_eq!(pack.read_built("df/hack/plugins/0.47.05-r1/twbt.plug.so").unwrap(), "t");
}

#[tokio::test]
async fn test_no_dfhack_excludes_dependents() {
    let pack = TestPack::new().unwrap();
    write_dfhack_pack(&pack);
    let args = TargetArgs {
        no_dfhack: true,
        ..TargetArgs::default()
    };

    let report = pack.build_with(&args, false).await.unwrap();

    assert!(report.installed.is_empty());
    assert!(!report.has_failures());
    let excluded: Vec<&str> = report.excluded.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(excluded, vec!["DFHack", "Stonesense", "TWBT"]);
    assert!(report.excluded.iter().all(|(_, reason)| reason.contains("DFHack")));
    assert!(!pack.build_dir().join("df").exists());
}
