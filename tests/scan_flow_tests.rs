use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn station_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("prostation").unwrap();
    cmd.env("HOME", home.path());
    cmd
}

/// Bind a model and an employee so scans pass the identity checks.
fn setup_station(home: &TempDir) {
    station_cmd(home)
        .args(["model", "add", "MODEL-X"])
        .assert()
        .success();
    station_cmd(home)
        .args(["model", "use", "MODEL-X"])
        .assert()
        .success();
    station_cmd(home)
        .args(["employee", "EMP-01"])
        .assert()
        .success();
}

#[test]
fn test_two_stage_flow() {
    let home = TempDir::new().unwrap();
    setup_station(&home);

    // Stage 1 (Intake): first field slot is mandatory
    station_cmd(&home)
        .args(["scan", "A1", "--field", "1=cracked screen"])
        .assert()
        .success()
        .stdout(predicate::str::contains("REPAIRED"));

    station_cmd(&home)
        .args(["progress", "A1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("completed stage 1"));

    // Switch to stage 2, bind its own operator
    station_cmd(&home)
        .args(["stage", "use", "2"])
        .assert()
        .success();
    station_cmd(&home)
        .args(["employee", "EMP-02"])
        .assert()
        .success();

    // Accepted at stage 2 with measurement and cause
    station_cmd(&home)
        .args(["scan", "A1", "--measure", "OK", "--field", "1=solder joint"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS"));

    station_cmd(&home)
        .args(["progress", "A1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("completed stage 2"));

    // Immediate re-scan of the same (code, stage) is a duplicate
    station_cmd(&home)
        .args(["scan", "A1", "--measure", "OK", "--field", "1=solder joint"])
        .assert()
        .success()
        .stdout(predicate::str::contains("duplicate"));

    // A unit that never passed stage 1 violates sequencing
    station_cmd(&home)
        .args(["scan", "B1", "--measure", "OK", "--field", "1=solder joint"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sequence_violation"))
        .stdout(predicate::str::contains("Intake"));
}

#[test]
fn test_numeric_standard_boundary() {
    let home = TempDir::new().unwrap();
    setup_station(&home);

    station_cmd(&home)
        .args(["scan", "A1", "--field", "1=noisy fan"])
        .assert()
        .success();

    // Reconfigure stage 2: numeric standard, no mandatory fields
    station_cmd(&home)
        .args(["stage", "set", "2", "--standard", "5.0"])
        .assert()
        .success();
    for slot in ["1", "2", "3", "4"] {
        station_cmd(&home)
            .args(["stage", "field", "2", slot, "--clear"])
            .assert()
            .success();
    }
    station_cmd(&home)
        .args(["stage", "use", "2"])
        .assert()
        .success();
    station_cmd(&home)
        .args(["employee", "EMP-02"])
        .assert()
        .success();

    // Comma decimal parses below the standard
    station_cmd(&home)
        .args(["scan", "A1", "--measure", "4,9"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS"));

    // Equality with the standard is a defect, not an acceptance
    let home2 = TempDir::new().unwrap();
    setup_station(&home2);
    station_cmd(&home2)
        .args(["scan", "A1", "--field", "1=noisy fan"])
        .assert()
        .success();
    station_cmd(&home2)
        .args(["stage", "set", "2", "--standard", "5.0"])
        .assert()
        .success();
    for slot in ["1", "2", "3", "4"] {
        station_cmd(&home2)
            .args(["stage", "field", "2", slot, "--clear"])
            .assert()
            .success();
    }
    station_cmd(&home2)
        .args(["stage", "use", "2"])
        .assert()
        .success();
    station_cmd(&home2)
        .args(["employee", "EMP-02"])
        .assert()
        .success();
    station_cmd(&home2)
        .args(["scan", "A1", "--measure", "5,0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("measurement_out_of_standard"))
        .stdout(predicate::str::contains("FAILED AGAIN"));
}

#[test]
fn test_rejections_are_recorded_in_history() {
    let home = TempDir::new().unwrap();
    setup_station(&home);

    // Missing mandatory first field
    station_cmd(&home)
        .args(["scan", "A1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("field_missing"));

    station_cmd(&home)
        .args(["history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("A1"))
        .stdout(predicate::str::contains("required"));

    // The rejected attempt consumed seq 1; the next scan gets seq 2
    station_cmd(&home)
        .args(["scan", "A1", "--field", "1=dead battery"])
        .assert()
        .success()
        .stdout(predicate::str::contains("seq 2"));
}

#[test]
fn test_stats_show_waiting_queue() {
    let home = TempDir::new().unwrap();
    setup_station(&home);

    station_cmd(&home)
        .args(["scan", "A1", "--field", "1=wet"])
        .assert()
        .success();
    station_cmd(&home)
        .args(["scan", "A2", "--field", "1=dropped"])
        .assert()
        .success();

    station_cmd(&home)
        .args(["stats", "--stage", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("REPAIRED"))
        .stdout(predicate::str::contains("2"));

    // Two units wait at stage 2's door
    station_cmd(&home)
        .args(["stats", "--stage", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Waiting"));
}

#[test]
fn test_history_json_output() {
    let home = TempDir::new().unwrap();
    setup_station(&home);
    station_cmd(&home)
        .args(["scan", "A1", "--field", "1=scratched"])
        .assert()
        .success();

    station_cmd(&home)
        .args(["history", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"code\": \"A1\""))
        .stdout(predicate::str::contains("\"status\": \"valid\""));
}
