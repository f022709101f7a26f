use std::{error::Error, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;

#[test]
fn test_file_missing() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzroifinder")?;

    cmd.arg("not_real.mzML").arg("-o").arg("-");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("not_real.mzML"));
    Ok(())
}

#[test]
fn test_malformed_time_range() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzroifinder")?;

    cmd.arg("not_real.mzML").args(["-o", "-", "-r", "a-5"]);
    cmd.assert().failure().stderr(predicate::str::contains(
        "Failed to parse time range start invalid float literal",
    ));

    let mut cmd = Command::cargo_bin("mzroifinder")?;

    cmd.arg("not_real.mzML").args(["-o", "-", "-r", "1:b"]);
    cmd.assert().failure().stderr(predicate::str::contains(
        "Failed to parse time range end invalid float literal",
    ));
    Ok(())
}

#[test]
fn test_negative_noise_threshold() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzroifinder")?;

    cmd.arg("not_real.mzML").arg("--noise-threshold=-1");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("is less than zero"));
    Ok(())
}

#[test]
fn test_run_coeluting_pair() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzroifinder")?;
    cmd.env("RUST_LOG", "info");
    cmd.arg("./tests/data/coeluting_pair.mzML").args(["-o", "-"]);
    let result = cmd.assert().success();
    result
        .stderr(predicate::str::contains("MS1 Spectra: 6"))
        .stderr(predicate::str::contains("MSn Spectra: 2"))
        .stdout(predicate::str::starts_with("id,mz,rt,apex_scan"));
    Ok(())
}

#[test]
fn test_run_without_cutting() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzroifinder")?;
    cmd.env("RUST_LOG", "info");
    cmd.arg("./tests/data/coeluting_pair.mzML")
        .args(["-o", "-", "--no-cut", "-f", "json"]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let rows: serde_json::Value = serde_json::from_slice(&output)?;
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["ms2_count"], 2);
    Ok(())
}
