mod common;

use common::{len_at, temp_dir, Sidecar};
use serde_json::json;
use std::fs::File;
use std::io::Read;

#[test]
fn export_then_import_restores_the_workspace() {
    let workspace = temp_dir("classbook-backup-src");
    let restored = temp_dir("classbook-backup-dst");
    let bundle = temp_dir("classbook-backup-out").join("classbook.zip");

    let mut sc = Sidecar::spawn();
    sc.open_workspace(&workspace);
    let class_id = sc.seed_class();
    sc.create_student(&class_id, "Luis");

    let export = sc.request_ok("backup.export", json!({ "outPath": bundle.to_string_lossy() }));
    assert_eq!(export["bundleFormat"], "classbook-workspace-v1");
    assert_eq!(export["entryCount"], 3);

    let mut archive = zip::ZipArchive::new(File::open(&bundle).expect("open bundle")).expect("zip");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    let manifest: serde_json::Value = serde_json::from_str(&manifest).expect("manifest json");
    assert_eq!(manifest["dbSha256"], export["dbSha256"]);
    archive
        .by_name("db/classbook.sqlite3")
        .expect("database entry in bundle");

    // Change the source after the export; the restore must not see it.
    sc.create_student(&class_id, "Eva");

    let import = sc.request_ok(
        "backup.import",
        json!({ "inPath": bundle.to_string_lossy(), "workspacePath": restored.to_string_lossy() }),
    );
    assert_eq!(import["bundleFormatDetected"], "classbook-workspace-v1");

    let health = sc.request_ok("health", json!({}));
    assert_eq!(health["workspacePath"], restored.to_string_lossy().to_string());
    let students = sc.request_ok("students.list", json!({ "classId": class_id }));
    assert_eq!(len_at(&students, "students"), 1);
    assert_eq!(students["students"][0]["firstName"], "Luis");

    assert_eq!(
        sc.request_err(
            "backup.import",
            json!({ "inPath": restored.join("missing.zip").to_string_lossy() }),
        ),
        "not_found"
    );

    drop(sc);
    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(restored);
}
