use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*; // Used for writing assertions
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

#[test]
fn create_and_check() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg = dir.path().join("disk.cckd");
    Command::cargo_bin("cckdkit")?
        .arg("mkdsk")
        .arg("-k").arg("3390")
        .arg("-c").arg("2")
        .arg("-d").arg(&dimg)
        .assert()
        .success();
    Command::cargo_bin("cckdkit")?
        .arg("chk")
        .arg("-l").arg("3")
        .arg("-d").arg(&dimg)
        .assert()
        .success()
        .stdout(predicate::str::contains("status 0"));
    Command::cargo_bin("cckdkit")?
        .arg("chk")
        .arg("-l").arg("-1")
        .arg("--json")
        .arg("-d").arg(&dimg)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":0"));
    Ok(())
}

#[test]
fn refuse_overwrite() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg = dir.path().join("disk.cckd");
    std::fs::write(&dimg,b"keep me")?;
    Command::cargo_bin("cckdkit")?
        .arg("mkdsk")
        .arg("-k").arg("3390")
        .arg("-d").arg(&dimg)
        .assert()
        .failure();
    assert_eq!(std::fs::read(&dimg)?,b"keep me");
    Ok(())
}

#[test]
fn formatted_image() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg = dir.path().join("disk.cfba");
    Command::cargo_bin("cckdkit")?
        .arg("mkdsk")
        .arg("-k").arg("3370")
        .arg("-c").arg("2400")
        .arg("--format").arg("zlib")
        .arg("-d").arg(&dimg)
        .assert()
        .success();
    Command::cargo_bin("cckdkit")?
        .arg("stat")
        .arg("--indent").arg("2")
        .arg("-d").arg(&dimg)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"tracks\": 20"))
        .stdout(predicate::str::contains("\"stored_tracks\": 20"))
        .stdout(predicate::str::contains("FBA_C370"));
    Command::cargo_bin("cckdkit")?
        .arg("chk")
        .arg("-l").arg("3")
        .arg("-d").arg(&dimg)
        .assert()
        .success();
    Command::cargo_bin("cckdkit")?
        .arg("comp")
        .arg("-d").arg(&dimg)
        .assert()
        .success()
        .stdout(predicate::str::contains("already compact"));
    Ok(())
}

#[test]
fn dump_track() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg = dir.path().join("disk.cckd");
    Command::cargo_bin("cckdkit")?
        .arg("mkdsk")
        .arg("-k").arg("3390")
        .arg("-c").arg("1")
        .arg("--nullfmt").arg("1")
        .arg("-d").arg(&dimg)
        .assert()
        .success();
    // track 14 is cylinder 0 head 14, record zero carries the same address
    Command::cargo_bin("cckdkit")?
        .arg("get")
        .arg("-t").arg("14")
        .arg("-d").arg(&dimg)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("00000000 : 00 00 00 00 0E 00 00 00 0E 00 00 00 08"));
    let raw = Command::cargo_bin("cckdkit")?
        .arg("get")
        .arg("-t").arg("3")
        .arg("--raw")
        .arg("-d").arg(&dimg)
        .output()?;
    assert!(raw.status.success());
    assert_eq!(raw.stdout.len(),29);
    Command::cargo_bin("cckdkit")?
        .arg("get")
        .arg("-t").arg("15")
        .arg("-d").arg(&dimg)
        .assert()
        .failure();
    Ok(())
}

#[test]
fn swap_and_back() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg = dir.path().join("disk.cckd");
    Command::cargo_bin("cckdkit")?
        .arg("mkdsk")
        .arg("-k").arg("3380")
        .arg("-c").arg("1")
        .arg("--big")
        .arg("--format").arg("none")
        .arg("-d").arg(&dimg)
        .assert()
        .success();
    let before = std::fs::read(&dimg)?;
    Command::cargo_bin("cckdkit")?
        .arg("swap")
        .arg("-d").arg(&dimg)
        .assert()
        .success();
    Command::cargo_bin("cckdkit")?
        .arg("swap")
        .arg("-d").arg(&dimg)
        .assert()
        .success();
    assert_eq!(std::fs::read(&dimg)?,before);
    Ok(())
}

#[test]
fn missing_image_is_fatal() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    Command::cargo_bin("cckdkit")?
        .arg("chk")
        .arg("-d").arg(dir.path().join("nothing.cckd"))
        .assert()
        .code(255);
    Ok(())
}

#[test]
fn completions() -> STDRESULT {
    Command::cargo_bin("cckdkit")?
        .arg("completions")
        .arg("-s").arg("bash")
        .assert()
        .success()
        .stdout(predicate::str::contains("cckdkit"));
    Ok(())
}
