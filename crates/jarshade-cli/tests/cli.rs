//! Integration tests driving the `jarshade` binary.

use jarshade_core::class::{ClassFile, Const, ConstantPool};
use std::io::Write;
use std::path::Path;
use std::process::Command;
use zip::write::SimpleFileOptions;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_jarshade"))
}

fn class_bytes(this: &str, refs: &[&str]) -> Vec<u8> {
    let mut pool = ConstantPool::new();
    let this_name = pool.push_utf8(this).unwrap();
    let this_class = pool.push(Const::Class { name: this_name }).unwrap();
    let super_name = pool.push_utf8("java/lang/Object").unwrap();
    let super_class = pool.push(Const::Class { name: super_name }).unwrap();
    for r in refs {
        let n = pool.push_utf8(r).unwrap();
        pool.push(Const::Class { name: n }).unwrap();
    }
    ClassFile {
        minor: 0,
        major: 55,
        pool,
        access_flags: 0x0021,
        this_class,
        super_class,
        interfaces: vec![],
        fields: vec![],
        methods: vec![],
        attributes: vec![],
    }
    .encode()
}

fn write_jar(path: &Path, entries: &[(&str, Vec<u8>)]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (name, bytes) in entries {
        writer
            .start_file(name.to_string(), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
}

const CONFIG: &str = r#"
[project]
name = "example"
version = "1.0.0"
core = "build/core.jar"

[[target]]
name = "fabric"
family = "fabric"
adapter = "build/fabric-adapter.jar"

[[target.dependency]]
archive = "lz4.jar"
scope = "bundle"

[[target.relocation]]
from = "pkg"
to = "shaded.pkg"
"#;

fn scaffold(dir: &Path) {
    std::fs::write(dir.join("jarshade.toml"), CONFIG).unwrap();
    write_jar(
        &dir.join("build/core.jar"),
        &[("app/Main.class", class_bytes("app/Main", &["pkg/Util"]))],
    );
    write_jar(
        &dir.join("build/fabric-adapter.jar"),
        &[(
            "app/fabric/Boot.class",
            class_bytes("app/fabric/Boot", &["app/Main"]),
        )],
    );
    write_jar(
        &dir.join("libs/lz4.jar"),
        &[("pkg/Util.class", class_bytes("pkg/Util", &[]))],
    );
}

#[test]
fn build_composes_the_declared_target() {
    let dir = tempfile::tempdir().unwrap();
    scaffold(dir.path());

    let output = bin()
        .args(["build", "--project"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("fabric"));
    assert!(stdout.contains("ok"));
    assert!(dir.path().join("dist/example-Fabric-1.0.0.jar").exists());
}

#[test]
fn build_json_reports_every_target() {
    let dir = tempfile::tempdir().unwrap();
    scaffold(dir.path());

    let output = bin()
        .args(["build", "--json", "--project"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["target"], "fabric");
    assert_eq!(reports[0]["status"], "ok");
    assert_eq!(reports[0]["classes_loaded"], 3);
}

#[test]
fn dry_run_plans_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    scaffold(dir.path());

    let output = bin()
        .args(["build", "--dry-run", "--project"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("target `fabric`"));
    assert!(stdout.contains("lz4 [bundle]"));
    assert!(!dir.path().join("dist").exists());
}

#[test]
fn build_fails_nonzero_on_missing_dependency() {
    let dir = tempfile::tempdir().unwrap();
    scaffold(dir.path());
    std::fs::remove_file(dir.path().join("libs/lz4.jar")).unwrap();

    let output = bin()
        .args(["build", "--project"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("resolving"));
}

#[test]
fn check_reports_targets_and_warns_on_empty_retention() {
    let dir = tempfile::tempdir().unwrap();
    scaffold(dir.path());

    let output = bin()
        .args(["check", "--project"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("target `fabric`"));
    assert!(stdout.contains("no retention spec"));
    assert!(stdout.contains("ok"));
}

#[test]
fn inspect_lists_classes_of_a_composed_archive() {
    let dir = tempfile::tempdir().unwrap();
    scaffold(dir.path());

    let status = bin()
        .args(["build", "--project"])
        .arg(dir.path())
        .status()
        .unwrap();
    assert!(status.success());

    let artifact = dir.path().join("dist/example-Fabric-1.0.0.jar");
    let output = bin()
        .arg("inspect")
        .arg(&artifact)
        .arg("--classes")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("shaded/pkg/Util"));
    assert!(stdout.contains("app/Main"));
}

#[test]
fn completions_emit_a_script() {
    let output = bin().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(!output.stdout.is_empty());
}
