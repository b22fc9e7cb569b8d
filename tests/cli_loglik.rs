use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn value(stdout: &str) -> f64 {
    stdout
        .trim_end()
        .rsplit('\t')
        .next()
        .unwrap()
        .parse()
        .unwrap()
}

#[test]
fn command_loglik_pair() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("plk")?;
    let output = cmd
        .arg("loglik")
        .arg("tests/plk/pair.nwk")
        .arg("tests/plk/pair.fa")
        .arg("--dna")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(stdout.starts_with("JC69\t2\t"));

    // Jukes-Cantor over a path of length 0.3
    let e = (-4.0_f64 / 3.0 * 0.3).exp();
    let same = 0.25 * (0.25 + 0.75 * e);
    let diff = 0.25 * (0.25 - 0.25 * e);
    let expected = 2.0 * same.ln() + diff.ln();
    assert!((value(&stdout) - expected).abs() < 1e-6);

    Ok(())
}

#[test]
fn command_loglik_rooting() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("plk")?;
    let unrooted = cmd
        .arg("loglik")
        .arg("tests/plk/dna.nwk")
        .arg("tests/plk/dna.fa")
        .arg("--dna")
        .arg("-a")
        .arg("0.5")
        .output()?;

    let mut cmd = Command::cargo_bin("plk")?;
    let rooted = cmd
        .arg("loglik")
        .arg("tests/plk/dna_rooted.nwk")
        .arg("tests/plk/dna.fa")
        .arg("--dna")
        .arg("-a")
        .arg("0.5")
        .output()?;

    let a = value(&String::from_utf8(unrooted.stdout)?);
    let b = value(&String::from_utf8(rooted.stdout)?);
    assert!(a < 0.0);
    assert!((a - b).abs() < 1e-6, "{} {}", a, b);

    Ok(())
}

#[test]
fn command_loglik_calibration() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("plk")?;
    let output = cmd
        .arg("loglik")
        .arg("tests/plk/calibration.nwk")
        .arg("tests/plk/calibration.fa")
        .arg("-m")
        .arg("wag")
        .arg("-a")
        .arg("1")
        .arg("-c")
        .arg("4")
        .output()?;
    let loglik = value(&String::from_utf8(output.stdout)?);

    let mut cmd = Command::cargo_bin("plk")?;
    let output = cmd.arg("calibrate").arg("-m").arg("wag").output()?;
    let calibrate = value(&String::from_utf8(output.stdout)?.replace(": ", "\t"));

    assert!((loglik - calibrate).abs() < 1e-6, "{} {}", loglik, calibrate);

    Ok(())
}

#[test]
fn command_loglik_missing_sequence() -> anyhow::Result<()> {
    let mut cmd = assert_cmd::Command::cargo_bin("plk")?;
    cmd.arg("loglik")
        .arg("stdin")
        .arg("tests/plk/pair.fa")
        .arg("--dna")
        .write_stdin("(A:0.1,B:0.2,C:0.3);")
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no sequence"));

    Ok(())
}

#[test]
fn command_loglik_bad_tree() -> anyhow::Result<()> {
    let mut cmd = assert_cmd::Command::cargo_bin("plk")?;
    cmd.arg("loglik")
        .arg("stdin")
        .arg("tests/plk/pair.fa")
        .arg("--dna")
        .write_stdin("(A:0.1,B:x);")
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 1, column"));

    Ok(())
}
