//! Command-line behaviour of the `edumesh` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::tempdir;

fn edumesh(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("edumesh").unwrap();
    cmd.arg("--data-dir").arg(data_dir);
    cmd
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("edumesh")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("transfer-demo"))
        .stdout(predicate::str::contains("sync"));
}

#[test]
fn lesson_add_then_list() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("water-cycle.txt");
    std::fs::write(&file, "evaporation, condensation").unwrap();

    edumesh(dir.path())
        .args(["lesson", "add", "--title", "Water cycle", "--topic", "Science"])
        .arg("--file")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Added lesson"));

    edumesh(dir.path())
        .args(["lesson", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Water cycle [Science]"));
}

#[test]
fn progress_and_quiz_fill_the_queue() {
    let dir = tempdir().unwrap();

    edumesh(dir.path())
        .args(["progress", "L1", "--percent", "40"])
        .assert()
        .success()
        .stdout(predicate::str::contains("40%"));

    edumesh(dir.path())
        .args(["quiz", "L1", "--score", "90", "--time-spent", "60"])
        .assert()
        .success()
        .stdout(predicate::str::contains("passed"));

    edumesh(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sync queue: 3 pending"));
}

#[test]
fn progress_without_values_fails() {
    let dir = tempdir().unwrap();
    edumesh(dir.path())
        .args(["progress", "L1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to record"));
}

#[test]
fn sync_requires_an_actor() {
    let dir = tempdir().unwrap();
    let remote = tempdir().unwrap();

    edumesh(dir.path())
        .arg("sync")
        .arg("--remote")
        .arg(remote.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not authorized"));
}

#[test]
fn sync_pushes_to_remote_directory() {
    let dir = tempdir().unwrap();
    let remote = tempdir().unwrap();
    std::fs::write(
        remote.path().join("lessons.json"),
        r#"[{"id": "R1", "title": "Shared", "topic": "Math", "createdAt": 1}]"#,
    )
    .unwrap();

    edumesh(dir.path())
        .args(["progress", "R1", "--completed"])
        .assert()
        .success();

    edumesh(dir.path())
        .args(["sync", "--actor", "student-1", "--remote"])
        .arg(remote.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Pulled 1 new lessons"))
        .stdout(predicate::str::contains("Pushed 1 queued items"));

    let pushed = std::fs::read_to_string(remote.path().join("progress.json")).unwrap();
    assert!(pushed.contains("student-1"));

    edumesh(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sync queue: 0 pending"));
}

#[test]
fn transfer_demo_saves_lesson() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("edumesh.toml"), "[transfer]\nsend_interval_ms = 0\n").unwrap();
    let file = dir.path().join("slides.pdf");
    std::fs::write(&file, vec![7u8; 40_000]).unwrap();

    edumesh(dir.path())
        .args(["transfer-demo", "--room", "R1", "--title", "Slides"])
        .arg("--file")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Received slides.pdf (40000 bytes)"))
        .stdout(predicate::str::contains("Saved as lesson"));

    edumesh(dir.path())
        .args(["lesson", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Slides"));
}

#[test]
fn published_lesson_reaches_another_device() {
    let author = tempdir().unwrap();
    let learner = tempdir().unwrap();
    let remote = tempdir().unwrap();
    let file = author.path().join("volcanoes.txt");
    std::fs::write(&file, "magma, lava, ash").unwrap();

    let output = edumesh(author.path())
        .args(["lesson", "add", "--title", "Volcanoes", "--topic", "Geography"])
        .arg("--file")
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lesson_id = stdout
        .lines()
        .find_map(|line| line.strip_prefix("Added lesson "))
        .unwrap()
        .trim()
        .to_string();

    edumesh(author.path())
        .args(["lesson", "publish", &lesson_id, "--actor", "instructor-1", "--remote"])
        .arg(remote.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Published lesson"));

    edumesh(learner.path())
        .args(["sync", "--pull-only", "--actor", "student-1", "--remote"])
        .arg(remote.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Pulled 1 new lessons"));

    edumesh(learner.path())
        .args(["lesson", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Volcanoes [Geography]"));
}
