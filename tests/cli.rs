use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn meter_balance(data: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("meter-balance").unwrap();
    cmd.env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(data.path().join("store"));
    cmd
}

#[test]
fn sample_data_balance_breakdown() {
    let data = tempfile::tempdir().unwrap();
    meter_balance(&data)
        .args(["init", "--sample-data"])
        .assert()
        .success();

    meter_balance(&data)
        .args(["balance", "--start", "2024-01-01", "--end", "2024-02-26"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1. Days in period: 57"))
        .stdout(predicate::str::contains("2. Consumption: 300 kWh"))
        .stdout(predicate::str::contains("3. Consumption cost: 30.00"))
        .stdout(predicate::str::contains("4. Base fee total: 19.00"))
        .stdout(predicate::str::contains("5. Total cost: 49.00"))
        .stdout(predicate::str::contains("6. Total paid: 60.00"))
        .stdout(predicate::str::contains("7. Balance: 11.00"));
}

#[test]
fn balance_without_tariff_fails() {
    let data = tempfile::tempdir().unwrap();
    meter_balance(&data).arg("init").assert().success();

    meter_balance(&data)
        .args(["balance", "--start", "2024-01-01", "--end", "2024-02-26"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no tariff period covers 2024-02-26"));
}

#[test]
fn reading_add_list_delete() {
    let data = tempfile::tempdir().unwrap();
    meter_balance(&data).arg("init").assert().success();

    meter_balance(&data)
        .args(["reading", "add", "2024-03-01", "1234,5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved as #1"));

    meter_balance(&data)
        .args(["reading", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1\t2024-03-01\t1234.5"));

    meter_balance(&data)
        .args(["reading", "delete", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted #1"));

    meter_balance(&data)
        .args(["reading", "list"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn invalid_date_is_a_usage_error() {
    let data = tempfile::tempdir().unwrap();
    meter_balance(&data).arg("init").assert().success();

    meter_balance(&data)
        .args(["payment", "add", "03/01/2024", "30"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected YYYY-MM-DD"));
}

#[test]
fn commands_need_an_initialised_store() {
    let data = tempfile::tempdir().unwrap();
    meter_balance(&data)
        .args(["payment", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialised"));
}
