use assert_cmd::prelude::*;
use std::process::Command;

// ================================================================================================
// plk models
// ================================================================================================

#[test]
fn command_models() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("plk")?;
    let output = cmd.arg("models").output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert_eq!(stdout.lines().count(), 4);
    for name in ["Dayhoff\t", "LG\t", "JTT\t", "WAG\t"] {
        assert!(stdout.contains(name), "missing {}", name);
    }
    assert!(stdout.contains("Whelan & Goldman"));

    Ok(())
}

// ================================================================================================
// plk pmatrix
// ================================================================================================

#[test]
fn command_pmatrix_dat() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("plk")?;
    let builtin = cmd
        .arg("pmatrix")
        .arg("-m")
        .arg("wag")
        .arg("-t")
        .arg("0.3")
        .output()?;

    let mut cmd = Command::cargo_bin("plk")?;
    let from_file = cmd
        .arg("pmatrix")
        .arg("--dat")
        .arg("tests/plk/wag.dat")
        .arg("-t")
        .arg("0.3")
        .output()?;

    let builtin = String::from_utf8(builtin.stdout)?;
    let from_file = String::from_utf8(from_file.stdout)?;
    assert!(from_file.starts_with("# wag t=0.3 category 0"));
    assert_eq!(
        builtin.lines().skip(1).collect::<Vec<_>>(),
        from_file.lines().skip(1).collect::<Vec<_>>()
    );

    Ok(())
}

#[test]
fn command_pmatrix_identity() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("plk")?;
    let output = cmd
        .arg("pmatrix")
        .arg("-m")
        .arg("wag")
        .arg("-t")
        .arg("0")
        .arg("-p")
        .arg("2")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;
    let lines: Vec<&str> = stdout.lines().collect();

    assert_eq!(lines.len(), 21);
    assert!(lines[0].starts_with("# WAG t=0 category 0"));
    assert!(lines[1].starts_with("+1.00 +0.00 +0.00"));
    assert!(lines[20].ends_with("+0.00 +1.00"));

    Ok(())
}

#[test]
fn command_pmatrix_rows() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("plk")?;
    let output = cmd
        .arg("pmatrix")
        .arg("-m")
        .arg("LG")
        .arg("-t")
        .arg("0.5")
        .arg("-a")
        .arg("0.8")
        .arg("-c")
        .arg("4")
        .arg("-p")
        .arg("10")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert_eq!(stdout.lines().filter(|l| l.starts_with('#')).count(), 4);
    for line in stdout.lines().filter(|l| !l.starts_with('#')) {
        let sum: f64 = line
            .split_whitespace()
            .map(|v| v.parse::<f64>().unwrap())
            .sum();
        assert!((sum - 1.0).abs() < 1e-8, "{}", line);
    }

    Ok(())
}

#[test]
fn command_pmatrix_invalid() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("plk")?;
    cmd.arg("pmatrix")
        .arg("--length=-1")
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid branch length"));

    let mut cmd = Command::cargo_bin("plk")?;
    cmd.arg("pmatrix")
        .arg("-m")
        .arg("GTR")
        .arg("-t")
        .arg("0.1")
        .assert()
        .failure()
        .stderr(predicates::str::contains("unknown protein model"));

    Ok(())
}
