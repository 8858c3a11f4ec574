use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn sovereign_bin() -> std::path::PathBuf {
    assert_cmd::cargo::cargo_bin!("sovereign")
}

#[test]
fn verify_audit_on_empty_root_prints_genesis_hash() {
    let root = TempDir::new().unwrap();

    Command::new(sovereign_bin())
        .args(["--root", root.path().to_str().unwrap(), "verify-audit"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("sha256:"));
}

#[test]
fn route_then_derive_round_trip() {
    let root = TempDir::new().unwrap();

    let schema = "outcome={outcome}/tool_family={tool_family}/decile(step)/{step}.json";
    let mut written_paths = Vec::new();

    // Two packets with steps in different deciles, so `derive` sees a
    // varying decile folder across the corpus instead of a single literal.
    for (i, step) in [5, 12].into_iter().enumerate() {
        let packet_path = root.path().join(format!("packet{i}.json"));
        fs::write(
            &packet_path,
            format!(r#"{{"outcome":"success","tool_family":"search","step":{step}}}"#),
        )
        .unwrap();

        let route_out = Command::new(sovereign_bin())
            .args([
                "--root",
                root.path().to_str().unwrap(),
                "route",
                "--packet-json",
                packet_path.to_str().unwrap(),
                "--schema",
                schema,
            ])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let written_path = String::from_utf8(route_out).unwrap().trim().to_string();
        assert!(written_path.ends_with(&format!("{step}.json")));
        assert!(std::path::Path::new(&written_path).exists());
        written_paths.push(written_path);
    }

    let mut args = vec![
        "--root".to_string(),
        root.path().to_str().unwrap().to_string(),
        "derive".to_string(),
    ];
    for path in &written_paths {
        args.push("--path".to_string());
        args.push(path.clone());
    }

    Command::new(sovereign_bin())
        .args(&args)
        .assert()
        .success()
        .stdout(predicate::str::contains("decile(step)"));
}

#[test]
fn govern_then_tampered_chain_blocks_further_governance() {
    let root = TempDir::new().unwrap();
    let target = root.path().join("watched");
    fs::create_dir_all(&target).unwrap();

    Command::new(sovereign_bin())
        .args([
            "--root",
            root.path().to_str().unwrap(),
            "govern",
            "--target",
            target.to_str().unwrap(),
            "--vote",
            "proceed",
            "--actor",
            "operator",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"outcome\""));

    let audit_path = root.path().join("governance").join("audit.jsonl");
    let contents = fs::read_to_string(&audit_path).unwrap();
    fs::write(&audit_path, contents.replace("operator", "TAMPERED")).unwrap();

    Command::new(sovereign_bin())
        .args([
            "--root",
            root.path().to_str().unwrap(),
            "govern",
            "--target",
            target.to_str().unwrap(),
            "--vote",
            "proceed",
            "--actor",
            "operator",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("audit chain broken"));
}
