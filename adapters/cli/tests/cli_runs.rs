use std::{fs, process::Command};

#[test]
fn run_exports_a_package_that_replays() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("arena.toml");
    let package = dir.path().join("last.pkg");
    let store = dir.path().join("best.json");
    fs::write(
        &config,
        "sim_count_normal = 4\nsim_count_boss = 4\nadapt_budget_per_room = 1\n",
    )
    .expect("write config");

    let run = Command::new(env!("CARGO_BIN_EXE_adaptive-arena"))
        .args(["run", "--encounters", "2", "--seed", "7"])
        .arg("--config")
        .arg(&config)
        .arg("--store")
        .arg(&store)
        .arg("--export")
        .arg(&package)
        .output()
        .expect("failed to invoke the adaptive-arena binary");
    assert!(run.status.success(), "run failed: {run:?}");
    let stdout = String::from_utf8_lossy(&run.stdout);
    assert!(stdout.contains("room  1"), "unexpected output: {stdout}");
    assert!(fs::read_to_string(&package)
        .expect("package written")
        .starts_with("arena:v1:"));
    assert!(store.exists());

    let replay = Command::new(env!("CARGO_BIN_EXE_adaptive-arena"))
        .arg("replay")
        .arg(&package)
        .output()
        .expect("failed to invoke the adaptive-arena binary");
    assert!(replay.status.success(), "replay failed: {replay:?}");
    assert!(String::from_utf8_lossy(&replay.stdout).contains("fitness "));
}

#[test]
fn replay_rejects_garbage_packages() {
    let dir = tempfile::tempdir().expect("tempdir");
    let package = dir.path().join("bad.pkg");
    fs::write(&package, "maze:v1:abc").expect("write package");

    let replay = Command::new(env!("CARGO_BIN_EXE_adaptive-arena"))
        .arg("replay")
        .arg(&package)
        .output()
        .expect("failed to invoke the adaptive-arena binary");
    assert!(!replay.status.success());
}
