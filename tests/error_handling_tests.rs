use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn station_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("prostation").unwrap();
    cmd.env("HOME", home.path());
    cmd
}

#[test]
fn test_user_errors_exit_one_with_prefix() {
    let home = TempDir::new().unwrap();

    station_cmd(&home)
        .args(["stage", "use", "99"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("Error:"))
        .stderr(predicate::str::contains("not found"));

    station_cmd(&home)
        .args(["model", "use", "GHOST"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not in the list"));
}

#[test]
fn test_bad_field_argument() {
    let home = TempDir::new().unwrap();

    station_cmd(&home)
        .args(["scan", "A1", "--field", "battery"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("SLOT=VALUE"));

    station_cmd(&home)
        .args(["scan", "A1", "--field", "9=battery"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("between 1 and 8"));
}

#[test]
fn test_empty_code_is_a_user_error() {
    let home = TempDir::new().unwrap();
    station_cmd(&home)
        .args(["scan", "   "])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("cannot be empty"));
}

#[test]
fn test_rejections_are_not_command_failures() {
    let home = TempDir::new().unwrap();

    // No model selected: the attempt is rejected and recorded, the
    // command itself succeeds
    station_cmd(&home)
        .args(["scan", "A1", "--field", "1=broken"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no_model"));

    station_cmd(&home)
        .args(["model", "add", "MODEL-X"])
        .assert()
        .success();
    station_cmd(&home)
        .args(["model", "use", "MODEL-X"])
        .assert()
        .success();

    // Model bound but no employee yet
    station_cmd(&home)
        .args(["scan", "A1", "--field", "1=broken"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no_employee"));

    // Both rejections were recorded
    station_cmd(&home)
        .args(["history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PROCESS ERROR"));
}

#[test]
fn test_employee_binding_is_per_stage() {
    let home = TempDir::new().unwrap();
    station_cmd(&home)
        .args(["employee", "EMP-01"])
        .assert()
        .success();

    station_cmd(&home)
        .args(["employee"])
        .assert()
        .success()
        .stdout(predicate::str::contains("EMP-01"));

    // Stage 2 has no binding of its own yet
    station_cmd(&home)
        .args(["stage", "use", "2"])
        .assert()
        .success();
    station_cmd(&home)
        .args(["employee"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No employee bound"));

    // Switching back, stage 1 still remembers its operator
    station_cmd(&home)
        .args(["stage", "use", "1"])
        .assert()
        .success();
    station_cmd(&home)
        .args(["employee"])
        .assert()
        .success()
        .stdout(predicate::str::contains("EMP-01"));
}
