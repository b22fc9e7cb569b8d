use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::TempDir;

fn log_likelihoods(stdout: &str) -> Vec<(String, f64)> {
    stdout
        .lines()
        .filter_map(|l| l.strip_prefix("Log-L ("))
        .map(|l| {
            let (model, value) = l.split_once("): ").unwrap();
            (model.to_string(), value.parse().unwrap())
        })
        .collect()
}

#[test]
fn command_calibrate() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("plk")?;
    let output = cmd.arg("calibrate").output()?;
    let stdout = String::from_utf8(output.stdout)?;

    let results = log_likelihoods(&stdout);
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].0, "Dayhoff");
    assert_eq!(results[3].0, "WAG");
    for (model, lnl) in &results {
        assert!(lnl.is_finite() && *lnl < 0.0, "{}: {}", model, lnl);
    }
    assert!((results[3].1 - -782.428990591).abs() < 1e-6);

    Ok(())
}

#[test]
fn command_calibrate_order() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("plk")?;
    let output = cmd
        .arg("calibrate")
        .arg("-m")
        .arg("wag")
        .arg("-m")
        .arg("jtt")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    let results = log_likelihoods(&stdout);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "WAG");
    assert_eq!(results[1].0, "JTT");

    Ok(())
}

#[test]
fn command_calibrate_scaling() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("plk")?;
    let scaled = cmd.arg("calibrate").arg("-m").arg("lg").output()?;

    let mut cmd = Command::cargo_bin("plk")?;
    let plain = cmd
        .arg("calibrate")
        .arg("-m")
        .arg("lg")
        .arg("--no-scaling")
        .output()?;

    let a = log_likelihoods(&String::from_utf8(scaled.stdout)?);
    let b = log_likelihoods(&String::from_utf8(plain.stdout)?);
    assert!((a[0].1 - b[0].1).abs() < 1e-9);

    Ok(())
}

#[test]
fn command_calibrate_verbose() -> anyhow::Result<()> {
    let tempdir = TempDir::new()?;
    let outfile = tempdir.path().join("wag.txt");

    let mut cmd = Command::cargo_bin("plk")?;
    cmd.arg("calibrate")
        .arg("-m")
        .arg("wag")
        .arg("--verbose")
        .arg("-p")
        .arg("3")
        .arg("-o")
        .arg(&outfile)
        .assert()
        .success();

    let contents = std::fs::read_to_string(&outfile)?;
    assert!(contents.starts_with("Model WAG\n"));
    assert!(contents.contains(" WARNING: model 0: frequency sum diff"));
    assert!(contents.contains("P-matrix for branch length 0.100000"));
    assert!(contents.contains("P-matrix for branch length 1.000000"));
    assert!(contents.contains("Tip 0: [ (("));
    assert!(contents.contains("CLV 7: [ (("));
    assert_eq!(log_likelihoods(&contents).len(), 1);

    Ok(())
}

#[test]
fn command_calibrate_dat() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("plk")?;
    let output = cmd
        .arg("calibrate")
        .arg("-m")
        .arg("wag")
        .arg("--dat")
        .arg("tests/plk/wag.dat")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    let results = log_likelihoods(&stdout);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "WAG");
    assert_eq!(results[1].0, "wag");
    assert!((results[0].1 - results[1].1).abs() < 1e-12);

    Ok(())
}

#[test]
fn command_calibrate_bad_dat() -> anyhow::Result<()> {
    let tempdir = TempDir::new()?;
    let infile = tempdir.path().join("short.dat");
    std::fs::write(&infile, "0.5 0.6\n0.7 x\n")?;

    let mut cmd = Command::cargo_bin("plk")?;
    cmd.arg("calibrate")
        .arg("--dat")
        .arg(&infile)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a number"));

    Ok(())
}
